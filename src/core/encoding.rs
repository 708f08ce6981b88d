//! Nucleotide encoding shared by the index, the seeder and the DP kernel.
//!
//! Encoding: A=0, C=1, G=2, T/U=3, any IUPAC ambiguity code=4 (N).
//! Bytes that are not nucleotide codes are rejected so malformed reads are
//! caught before they reach the pipeline stages.

use crate::pipelines::linear::error::{PipelineError, Result};

pub const AMBIGUOUS_CODE: u8 = 4;

/// Map an ASCII base to its code, or `None` if the byte is not a nucleotide.
#[inline(always)]
pub fn base_to_code(base: u8) -> Option<u8> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' | b'U' | b'u' => Some(3),
        b'N' | b'n' | b'R' | b'r' | b'Y' | b'y' | b'K' | b'k' | b'M' | b'm' | b'S' | b's'
        | b'W' | b'w' | b'B' | b'b' | b'D' | b'd' | b'H' | b'h' | b'V' | b'v' => {
            Some(AMBIGUOUS_CODE)
        }
        _ => None,
    }
}

#[inline(always)]
pub const fn code_to_base(code: u8) -> u8 {
    match code {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => b'N',
    }
}

#[inline(always)]
pub const fn complement_code(code: u8) -> u8 {
    match code {
        0 => 3,
        1 => 2,
        2 => 1,
        3 => 0,
        _ => AMBIGUOUS_CODE,
    }
}

/// Encode a read sequence, validating every byte.
pub fn encode_read(id: &str, seq: &[u8]) -> Result<Vec<u8>> {
    if seq.is_empty() {
        return Err(PipelineError::EmptyRead { id: id.to_string() });
    }
    seq.iter()
        .enumerate()
        .map(|(pos, &b)| {
            base_to_code(b).ok_or_else(|| PipelineError::MalformedRead {
                id: id.to_string(),
                pos,
                byte: b as char,
            })
        })
        .collect()
}

/// Encode a reference sequence. Unknown bytes become N rather than errors;
/// reference databases routinely carry odd characters.
pub fn encode_reference(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|&b| base_to_code(b).unwrap_or(AMBIGUOUS_CODE))
        .collect()
}

pub fn reverse_complement(codes: &[u8]) -> Vec<u8> {
    codes.iter().rev().map(|&c| complement_code(c)).collect()
}
