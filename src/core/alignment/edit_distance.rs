//! Edit summary of an alignment: matches, mismatches, gaps and identity.
//!
//! Computed in one pass over the CIGAR so the tabular report and the
//! alignment result always agree on the numbers.

/// Counts derived from an alignment trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditSummary {
    pub matches: u32,
    pub mismatches: u32,
    pub gap_opens: u32,
    pub gap_bases: u32,
}

impl EditSummary {
    /// Alignment columns, soft clips excluded
    pub fn aligned_length(&self) -> u32 {
        self.matches + self.mismatches + self.gap_bases
    }

    /// Edit distance (NM)
    pub fn edit_distance(&self) -> u32 {
        self.mismatches + self.gap_bases
    }

    /// Percent identity over aligned columns
    pub fn identity(&self) -> f64 {
        let len = self.aligned_length();
        if len == 0 {
            return 0.0;
        }
        100.0 * self.matches as f64 / len as f64
    }
}

/// Compute the edit summary of an alignment.
///
/// # Arguments
/// * `query` - Full encoded query
/// * `target` - Encoded target segment the alignment coordinates refer to
/// * `query_begin`, `target_begin` - 0-based alignment start positions
/// * `cigar` - Alignment trace; soft clips are skipped
pub fn compute_edit_summary(
    query: &[u8],
    target: &[u8],
    query_begin: usize,
    target_begin: usize,
    cigar: &[(u8, i32)],
) -> EditSummary {
    let mut summary = EditSummary::default();
    let mut qi = query_begin;
    let mut ti = target_begin;

    for &(op, len) in cigar {
        let len_usize = len as usize;
        match op {
            b'M' | b'=' | b'X' => {
                for _ in 0..len_usize {
                    if qi >= query.len() || ti >= target.len() {
                        break;
                    }
                    // N never counts as a match
                    if query[qi] == target[ti] && query[qi] < 4 {
                        summary.matches += 1;
                    } else {
                        summary.mismatches += 1;
                    }
                    qi += 1;
                    ti += 1;
                }
            }
            b'I' => {
                summary.gap_opens += 1;
                summary.gap_bases += len as u32;
                qi += len_usize;
            }
            b'D' => {
                summary.gap_opens += 1;
                summary.gap_bases += len as u32;
                ti += len_usize;
            }
            _ => {}
        }
    }

    summary
}

/// Render a CIGAR as text, e.g. `3S10M1D5M`.
pub fn cigar_to_string(cigar: &[(u8, i32)]) -> String {
    if cigar.is_empty() {
        return "*".to_string();
    }
    cigar
        .iter()
        .map(|&(op, len)| format!("{}{}", len, op as char))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_match() {
        let seq = vec![0u8, 1, 2, 3, 0];
        let s = compute_edit_summary(&seq, &seq, 0, 0, &[(b'M', 5)]);
        assert_eq!(s.matches, 5);
        assert_eq!(s.edit_distance(), 0);
        assert!((s.identity() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_mismatch_and_gaps() {
        // query: A C G T T A ; target: A C C T A A (mismatch at 2, then ins T, del A)
        let query = vec![0u8, 1, 2, 3, 3, 0];
        let target = vec![0u8, 1, 1, 3, 0, 0];
        let cigar = [(b'M', 4), (b'I', 1), (b'D', 1), (b'M', 1)];
        let s = compute_edit_summary(&query, &target, 0, 0, &cigar);
        assert_eq!(s.matches, 4);
        assert_eq!(s.mismatches, 1);
        assert_eq!(s.gap_opens, 2);
        assert_eq!(s.gap_bases, 2);
        assert_eq!(s.aligned_length(), 7);
    }

    #[test]
    fn test_soft_clips_skipped() {
        let query = vec![3u8, 0, 1, 2];
        let target = vec![0u8, 1, 2];
        let s = compute_edit_summary(&query, &target, 1, 0, &[(b'S', 1), (b'M', 3)]);
        assert_eq!(s.matches, 3);
        assert_eq!(s.mismatches, 0);
    }

    #[test]
    fn test_cigar_to_string() {
        assert_eq!(cigar_to_string(&[(b'S', 2), (b'M', 10), (b'D', 1)]), "2S10M1D");
        assert_eq!(cigar_to_string(&[]), "*");
    }
}
