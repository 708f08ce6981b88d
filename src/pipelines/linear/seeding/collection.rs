//! Per-read seed collection over successive skip intervals.

use crate::pipelines::linear::index::{SeedIndex, WindowHit};

use super::types::{SeedMatch, SeedsByReference, MAX_SEEDS_PER_READ};

/// What one pass added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub windows_queried: usize,
    pub new_seeds: usize,
}

/// Accumulates the seeds of one read (one strand) across passes.
///
/// A window start queried in a coarser pass is not queried again, so the
/// seeds of a finer pass are always new. The collector is reused between
/// reads through [`SeedCollector::reset`].
#[derive(Debug, Default)]
pub struct SeedCollector {
    window_len: usize,
    visited: Vec<bool>,
    seeds: SeedsByReference,
    total: usize,
    hits: Vec<WindowHit>,
}

impl SeedCollector {
    pub fn new(window_len: usize) -> Self {
        Self {
            window_len,
            ..Default::default()
        }
    }

    /// Forget everything about the previous read.
    pub fn reset(&mut self, read_len: usize) {
        self.visited.clear();
        if self.window_len > 0 && read_len >= self.window_len {
            self.visited.resize(read_len - self.window_len + 1, false);
        }
        self.seeds.clear();
        self.total = 0;
    }

    /// Query every unvisited window start `0, skip, 2*skip, ...` of `read`.
    ///
    /// `read` must be the sequence the collector was reset for. A read
    /// shorter than the window length has no windows.
    pub fn collect_pass(&mut self, index: &dyn SeedIndex, read: &[u8], skip: usize) -> PassSummary {
        let mut summary = PassSummary::default();
        let l = self.window_len;
        if skip == 0 || self.visited.is_empty() || read.len() < l {
            return summary;
        }

        for start in (0..self.visited.len()).step_by(skip) {
            if self.visited[start] {
                continue;
            }
            self.visited[start] = true;
            summary.windows_queried += 1;

            if self.total >= MAX_SEEDS_PER_READ {
                continue;
            }

            self.hits.clear();
            index.find_within_one_edit(&read[start..start + l], &mut self.hits);
            for hit in &self.hits {
                self.seeds
                    .entry(hit.reference_id)
                    .or_default()
                    .push(SeedMatch::new(
                        start as u32,
                        hit.reference_id,
                        hit.reference_offset,
                    ));
            }
            summary.new_seeds += self.hits.len();
            self.total += self.hits.len();
        }
        summary
    }

    pub fn seeds(&self) -> &SeedsByReference {
        &self.seeds
    }

    /// Seeds collected for the read so far
    pub fn total_seeds(&self) -> usize {
        self.total
    }

    /// References holding at least `min_seed_hits` seeds, in id order.
    pub fn chainable(&self, min_seed_hits: usize) -> impl Iterator<Item = (u32, &[SeedMatch])> {
        self.seeds
            .iter()
            .filter(move |(_, s)| s.len() >= min_seed_hits.max(1))
            .map(|(&id, s)| (id, s.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::encoding::encode_reference;
    use crate::pipelines::linear::index::{KmerIndex, ReferenceSet};

    const REFERENCE: &[u8] = b"TTGACCGTAGGCTAACGTTAGCCAGTACGATCGGATCCATGCAGT";

    fn index(l: usize) -> KmerIndex {
        let mut refs = ReferenceSet::new();
        refs.push("r0", REFERENCE);
        KmerIndex::build(refs, l).unwrap()
    }

    #[test]
    fn test_windows_per_interval() {
        let idx = index(6);
        let read = encode_reference(&REFERENCE[0..24]);
        let mut collector = SeedCollector::new(6);
        collector.reset(read.len());

        // 19 window starts: 0, 9, 18
        let first = collector.collect_pass(&idx, &read, 9);
        assert_eq!(first.windows_queried, 3);

        // 0, 3, ..., 18 minus the three already visited
        let second = collector.collect_pass(&idx, &read, 3);
        assert_eq!(second.windows_queried, 4);

        // Nothing left at the same interval
        let third = collector.collect_pass(&idx, &read, 3);
        assert_eq!(third.windows_queried, 0);
        assert_eq!(third.new_seeds, 0);
    }

    #[test]
    fn test_exact_windows_seed_on_their_diagonal() {
        let idx = index(6);
        let read = encode_reference(&REFERENCE[10..34]);
        let mut collector = SeedCollector::new(6);
        collector.reset(read.len());
        let summary = collector.collect_pass(&idx, &read, 6);

        assert!(summary.new_seeds >= summary.windows_queried);
        let seeds = &collector.seeds()[&0];
        for start in [0u32, 6, 12, 18] {
            assert!(seeds.contains(&SeedMatch::new(start, 0, start + 10)));
        }
        assert_eq!(collector.total_seeds(), summary.new_seeds);
    }

    #[test]
    fn test_short_read_has_no_windows() {
        let idx = index(8);
        let read = encode_reference(b"ACGTA");
        let mut collector = SeedCollector::new(8);
        collector.reset(read.len());
        assert_eq!(collector.collect_pass(&idx, &read, 1), PassSummary::default());
        assert!(collector.seeds().is_empty());
    }

    #[test]
    fn test_chainable_threshold() {
        let idx = index(6);
        let read = encode_reference(&REFERENCE[0..18]);
        let mut collector = SeedCollector::new(6);
        collector.reset(read.len());
        collector.collect_pass(&idx, &read, 12);

        let n = collector.seeds()[&0].len();
        assert_eq!(collector.chainable(n).count(), 1);
        assert_eq!(collector.chainable(n + 1).count(), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let idx = index(6);
        let read = encode_reference(&REFERENCE[0..18]);
        let mut collector = SeedCollector::new(6);
        collector.reset(read.len());
        collector.collect_pass(&idx, &read, 6);
        collector.reset(read.len());
        assert_eq!(collector.total_seeds(), 0);
        assert_eq!(collector.collect_pass(&idx, &read, 6).windows_queried, 3);
    }
}
