//! Chain extension: banded Smith-Waterman around a chain and the acceptance
//! threshold.

use crate::core::alignment::banded_swa::{banded_local_align, SwParams};
use crate::core::alignment::edit_distance::{cigar_to_string, compute_edit_summary, EditSummary};
use crate::pipelines::linear::chaining::Chain;
use crate::pipelines::linear::error::{PipelineError, Result};
use crate::pipelines::linear::filter_opt::ExtensionParams;

/// Read orientation an alignment was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    /// Reverse complement of the read
    Reverse,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// One accepted alignment of a read against a reference.
///
/// Read coordinates refer to the read in the alignment's strand orientation.
/// All coordinates are 0-based with exclusive ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentResult {
    pub reference_id: u32,
    pub strand: Strand,
    pub score: i32,
    pub read_begin: usize,
    pub read_end: usize,
    pub read_len: usize,
    pub reference_begin: usize,
    pub reference_end: usize,
    pub cigar: Vec<(u8, i32)>,
    pub edits: EditSummary,
}

impl AlignmentResult {
    /// True if this alignment covers any of `[begin, end)` on the same
    /// reference and strand.
    pub fn overlaps(&self, reference_id: u32, strand: Strand, begin: usize, end: usize) -> bool {
        self.reference_id == reference_id
            && self.strand == strand
            && begin < self.reference_end
            && self.reference_begin < end
    }

    pub fn cigar_string(&self) -> String {
        cigar_to_string(&self.cigar)
    }
}

/// Extends chains into scored alignments. Holds no per-read state.
#[derive(Debug, Clone)]
pub struct AlignmentExtender {
    sw: SwParams,
    band_margin: usize,
}

impl AlignmentExtender {
    pub fn new(params: &ExtensionParams) -> Self {
        Self {
            sw: params.scoring.sw_params(),
            band_margin: params.band_margin,
        }
    }

    /// Reference interval `[begin, end)` the chain's alignment may occupy,
    /// clamped to the reference.
    pub fn candidate_region(&self, chain: &Chain, read_len: usize, reference_len: usize) -> Result<Option<(usize, usize)>> {
        let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
            return Ok(None);
        };
        for seed in [first, last] {
            if seed.reference_offset as usize >= reference_len {
                return Err(PipelineError::SegmentOutOfBounds {
                    reference_id: chain.reference_id,
                    begin: first.reference_offset as usize,
                    end: last.reference_offset as usize + 1,
                    len: reference_len,
                });
            }
        }

        let margin = self.band_margin as i64;
        let begin = first.reference_offset as i64 - first.read_offset as i64 - margin;
        let tail = read_len.saturating_sub(last.read_offset as usize) as i64;
        let end = last.reference_offset as i64 + tail + margin;

        let begin = begin.max(0) as usize;
        let end = (end.max(0) as usize).min(reference_len);
        if begin >= end {
            return Ok(None);
        }
        Ok(Some((begin, end)))
    }

    /// Align `read` around `chain` and accept the result iff its score is at
    /// least `min_score`.
    ///
    /// `read` is the encoded read in `strand` orientation and `reference` the
    /// encoded reference the chain's seeds point into. A seed beyond the end
    /// of the reference is reported as [`PipelineError::SegmentOutOfBounds`].
    pub fn extend(
        &self,
        read: &[u8],
        strand: Strand,
        reference: &[u8],
        chain: &Chain,
        min_score: i32,
    ) -> Result<Option<AlignmentResult>> {
        let Some((begin, end)) = self.candidate_region(chain, read.len(), reference.len())? else {
            return Ok(None);
        };
        let Some((lo, hi)) = chain.diagonal_range() else {
            return Ok(None);
        };
        let segment = reference.get(begin..end).ok_or(PipelineError::SegmentOutOfBounds {
            reference_id: chain.reference_id,
            begin,
            end,
            len: reference.len(),
        })?;

        // Band centred on the chain diagonal, relative to the segment
        let centre = lo + (hi - lo) / 2 - begin as i64;
        let width = self.band_margin as i64 + (hi - lo);
        let centre = centre.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        let width = width.min(i32::MAX as i64) as i32;

        let aln = banded_local_align(&self.sw, read, segment, centre, width);
        if aln.score <= 0 || aln.score < min_score {
            return Ok(None);
        }

        let edits = compute_edit_summary(
            read,
            segment,
            aln.query_begin,
            aln.target_begin,
            &aln.cigar,
        );

        Ok(Some(AlignmentResult {
            reference_id: chain.reference_id,
            strand,
            score: aln.score,
            read_begin: aln.query_begin,
            read_end: aln.query_end,
            read_len: read.len(),
            reference_begin: begin + aln.target_begin,
            reference_end: begin + aln.target_end,
            cigar: aln.cigar,
            edits,
        }))
    }
}
