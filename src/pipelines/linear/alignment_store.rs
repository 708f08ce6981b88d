//! Per-read container of accepted alignments.
//!
//! The store has an explicit logical capacity. When an insert finds it full
//! and no reporting cap applies, it moves to a fresh buffer of `capacity +
//! growth` entries, keeping insertion order. The lowest and highest scoring
//! entries are tracked by index; on ties the earliest entry wins.
//!
//! With a top-N cap the store never holds more than N entries: once full, a
//! new alignment replaces the current minimum only when it scores strictly
//! higher.

use crate::defaults;
use crate::pipelines::linear::error::{PipelineError, Result};
use crate::pipelines::linear::extension::{AlignmentResult, Strand};

/// What [`AlignmentStore::add`] did with the alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// Took the slot of the previous minimum
    Replaced,
    /// Cap reached and the alignment did not beat the minimum
    Discarded,
}

#[derive(Debug)]
pub struct AlignmentStore {
    entries: Vec<AlignmentResult>,
    capacity: usize,
    growth: usize,
    cap: Option<usize>,
    min_index: Option<usize>,
    max_index: Option<usize>,
    reallocations: usize,
}

impl Default for AlignmentStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AlignmentStore {
    /// Store with the default initial capacity and growth increment.
    pub fn new(cap: Option<usize>) -> Self {
        Self::with_capacity(
            defaults::STORE_INITIAL_CAPACITY,
            defaults::STORE_GROWTH_INCREMENT,
            cap,
        )
    }

    pub fn with_capacity(initial: usize, growth: usize, cap: Option<usize>) -> Self {
        let initial = initial.max(1);
        Self {
            entries: Vec::with_capacity(initial),
            capacity: initial,
            growth: growth.max(1),
            cap,
            min_index: None,
            max_index: None,
            reallocations: 0,
        }
    }

    /// Insert an accepted alignment.
    ///
    /// Fails only when growing the buffer cannot allocate, which is fatal for
    /// the whole run.
    pub fn add(&mut self, result: AlignmentResult) -> Result<AddOutcome> {
        if let Some(cap) = self.cap {
            if self.entries.len() >= cap {
                return Ok(self.replace_min(result));
            }
        }

        if self.entries.len() >= self.capacity {
            self.grow()?;
        }

        let idx = self.entries.len();
        let score = result.score;
        self.entries.push(result);

        match self.min_index {
            Some(m) if self.entries[m].score <= score => {}
            _ => self.min_index = Some(idx),
        }
        match self.max_index {
            Some(m) if self.entries[m].score >= score => {}
            _ => self.max_index = Some(idx),
        }
        Ok(AddOutcome::Inserted)
    }

    fn replace_min(&mut self, result: AlignmentResult) -> AddOutcome {
        let Some(m) = self.min_index else {
            return AddOutcome::Discarded;
        };
        if result.score <= self.entries[m].score {
            return AddOutcome::Discarded;
        }
        self.entries[m] = result;
        self.recompute_extremes();
        AddOutcome::Replaced
    }

    fn grow(&mut self) -> Result<()> {
        let requested = self.capacity.saturating_add(self.growth);
        let mut grown: Vec<AlignmentResult> = Vec::new();
        grown
            .try_reserve_exact(requested)
            .map_err(|_| PipelineError::Allocation { requested })?;
        grown.append(&mut self.entries);

        self.entries = grown;
        self.capacity = requested;
        self.reallocations += 1;
        self.recompute_extremes();
        log::trace!("alignment store grown to {}", requested);
        Ok(())
    }

    fn recompute_extremes(&mut self) {
        self.min_index = None;
        self.max_index = None;
        for (i, r) in self.entries.iter().enumerate() {
            if self.min_index.map_or(true, |m| r.score < self.entries[m].score) {
                self.min_index = Some(i);
            }
            if self.max_index.map_or(true, |m| r.score > self.entries[m].score) {
                self.max_index = Some(i);
            }
        }
    }

    pub fn min(&self) -> Option<&AlignmentResult> {
        self.min_index.map(|i| &self.entries[i])
    }

    pub fn max(&self) -> Option<&AlignmentResult> {
        self.max_index.map(|i| &self.entries[i])
    }

    pub fn min_index(&self) -> Option<usize> {
        self.min_index
    }

    pub fn max_index(&self) -> Option<usize> {
        self.max_index
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Times the buffer was grown
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// True once a top-N cap is set and reached.
    pub fn is_full(&self) -> bool {
        self.cap.is_some_and(|cap| self.entries.len() >= cap)
    }

    /// Does any stored alignment cover part of `[begin, end)`?
    pub fn overlaps(&self, reference_id: u32, strand: Strand, begin: usize, end: usize) -> bool {
        self.entries
            .iter()
            .any(|r| r.overlaps(reference_id, strand, begin, end))
    }

    /// True when one stored alignment covers all of `[begin, end)` on the
    /// same reference and strand.
    pub fn contains_span(&self, reference_id: u32, strand: Strand, begin: usize, end: usize) -> bool {
        self.entries.iter().any(|r| {
            r.reference_id == reference_id
                && r.strand == strand
                && r.reference_begin <= begin
                && end <= r.reference_end
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AlignmentResult> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<AlignmentResult> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alignment::edit_distance::EditSummary;

    fn result(score: i32, begin: usize) -> AlignmentResult {
        AlignmentResult {
            reference_id: 0,
            strand: Strand::Forward,
            score,
            read_begin: 0,
            read_end: 10,
            read_len: 10,
            reference_begin: begin,
            reference_end: begin + 10,
            cigar: vec![(b'M', 10)],
            edits: EditSummary::default(),
        }
    }

    #[test]
    fn test_growth_preserves_order() {
        let mut store = AlignmentStore::new(None);
        assert_eq!(store.capacity(), 1);

        store.add(result(10, 0)).unwrap();
        assert_eq!(store.reallocations(), 0);

        store.add(result(30, 100)).unwrap();
        assert_eq!(store.capacity(), 101);
        assert_eq!(store.reallocations(), 1);

        for i in 0..99 {
            store.add(result(20, 200 + i * 20)).unwrap();
        }
        assert_eq!(store.size(), 101);
        assert_eq!(store.capacity(), 101);

        store.add(result(5, 5000)).unwrap();
        assert_eq!(store.capacity(), 201);
        assert_eq!(store.reallocations(), 2);

        let begins: Vec<usize> = store.iter().take(2).map(|r| r.reference_begin).collect();
        assert_eq!(begins, vec![0, 100]);
        assert_eq!(store.max_index(), Some(1));
        assert_eq!(store.min_index(), Some(101));
        assert!(store.size() <= store.capacity());
    }

    #[test]
    fn test_extremes_prefer_earliest() {
        let mut store = AlignmentStore::with_capacity(4, 100, None);
        store.add(result(10, 0)).unwrap();
        store.add(result(10, 50)).unwrap();
        store.add(result(12, 100)).unwrap();
        store.add(result(12, 150)).unwrap();
        assert_eq!(store.min_index(), Some(0));
        assert_eq!(store.max_index(), Some(2));
    }

    #[test]
    fn test_top_n_replacement() {
        let mut store = AlignmentStore::new(Some(2));
        assert_eq!(store.add(result(10, 0)).unwrap(), AddOutcome::Inserted);
        assert_eq!(store.add(result(20, 100)).unwrap(), AddOutcome::Inserted);
        assert!(store.is_full());

        assert_eq!(store.add(result(15, 200)).unwrap(), AddOutcome::Replaced);
        assert_eq!(store.min().map(|r| r.score), Some(15));
        assert_eq!(store.max().map(|r| r.score), Some(20));

        // Ties with the minimum are not enough
        assert_eq!(store.add(result(15, 300)).unwrap(), AddOutcome::Discarded);
        assert_eq!(store.add(result(3, 400)).unwrap(), AddOutcome::Discarded);
        assert_eq!(store.size(), 2);

        assert_eq!(store.add(result(40, 500)).unwrap(), AddOutcome::Replaced);
        let scores: Vec<i32> = store.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![40, 20]);
        assert_eq!(store.max_index(), Some(0));
        assert_eq!(store.min_index(), Some(1));
    }

    #[test]
    fn test_overlap_query() {
        let mut store = AlignmentStore::new(None);
        assert!(!store.overlaps(0, Strand::Forward, 0, 100));
        store.add(result(10, 50)).unwrap();
        assert!(store.overlaps(0, Strand::Forward, 55, 56));
        assert!(!store.overlaps(0, Strand::Forward, 60, 70));
        assert!(!store.overlaps(0, Strand::Reverse, 50, 60));
    }

    #[test]
    fn test_contains_span() {
        let mut store = AlignmentStore::new(None);
        store.add(result(10, 50)).unwrap();
        assert!(store.contains_span(0, Strand::Forward, 50, 60));
        assert!(store.contains_span(0, Strand::Forward, 52, 58));
        assert!(!store.contains_span(0, Strand::Forward, 55, 61));
        assert!(!store.contains_span(0, Strand::Reverse, 52, 58));
        assert!(!store.contains_span(1, Strand::Forward, 52, 58));
    }

    #[test]
    fn test_empty_store() {
        let store = AlignmentStore::default();
        assert!(store.is_empty());
        assert!(store.min().is_none());
        assert!(store.max().is_none());
        assert!(store.into_vec().is_empty());
    }
}
