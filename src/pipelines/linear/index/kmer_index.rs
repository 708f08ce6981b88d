//! In-memory L-mer index with one-edit window lookup.
//!
//! Every L-mer of every reference (L <= 32) is packed 2 bits per base and
//! mapped to its postings. L-mers containing an ambiguous base are not
//! indexed. A lookup enumerates the one-edit neighbourhood of the window:
//!
//! - the window itself and every single substitution,
//! - a base inserted at each position (read skipped a reference base), the
//!   result truncated back to L,
//! - a base removed at each position (read carries an extra base), the result
//!   extended by each possible next reference base.
//!
//! Distinct neighbours are looked up once each.

use std::collections::HashMap;

use rayon::prelude::*;

use super::reference::ReferenceSet;
use super::{SeedIndex, WindowHit};
use crate::pipelines::linear::error::{PipelineError, Result};

pub const MAX_WINDOW_LEN: usize = 32;

pub struct KmerIndex {
    refs: ReferenceSet,
    window_len: usize,
    postings: HashMap<u64, Vec<WindowHit>>,
}

#[inline(always)]
fn kmer_mask(window_len: usize) -> u64 {
    if window_len >= MAX_WINDOW_LEN {
        u64::MAX
    } else {
        (1u64 << (2 * window_len)) - 1
    }
}

/// Pack an L-mer, or `None` if it contains an ambiguous base.
#[inline(always)]
fn pack(codes: &[u8]) -> Option<u64> {
    let mut key = 0u64;
    for &c in codes {
        if c > 3 {
            return None;
        }
        key = (key << 2) | c as u64;
    }
    Some(key)
}

/// Every valid L-mer of one reference with its offset.
fn reference_kmers(reference_id: u32, seq: &[u8], window_len: usize) -> Vec<(u64, WindowHit)> {
    let mask = kmer_mask(window_len);
    let mut out = Vec::with_capacity(seq.len().saturating_sub(window_len) + 1);
    let mut key = 0u64;
    let mut valid = 0usize; // bases since the last ambiguous one

    for (pos, &c) in seq.iter().enumerate() {
        if c > 3 {
            valid = 0;
            key = 0;
            continue;
        }
        key = ((key << 2) | c as u64) & mask;
        valid += 1;
        if valid >= window_len {
            let start = pos + 1 - window_len;
            out.push((
                key,
                WindowHit {
                    reference_id,
                    reference_offset: start as u32,
                },
            ));
        }
    }
    out
}

impl KmerIndex {
    /// Index all references. References are scanned in parallel.
    pub fn build(refs: ReferenceSet, window_len: usize) -> Result<Self> {
        if window_len == 0 || window_len > MAX_WINDOW_LEN {
            return Err(PipelineError::Index(format!(
                "window length {} outside 1..={}",
                window_len, MAX_WINDOW_LEN
            )));
        }
        if refs.iter().any(|(_, s)| s.len() > u32::MAX as usize) {
            return Err(PipelineError::Index(
                "reference longer than 4 Gbp is not supported".into(),
            ));
        }

        let per_reference: Vec<Vec<(u64, WindowHit)>> = refs
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(id, seq)| reference_kmers(id, seq, window_len))
            .collect();

        let mut postings: HashMap<u64, Vec<WindowHit>> = HashMap::new();
        let mut total = 0usize;
        for kmers in per_reference {
            total += kmers.len();
            for (key, hit) in kmers {
                postings.entry(key).or_default().push(hit);
            }
        }

        log::info!(
            "Indexed {} references: {} L-mers ({} distinct), L={}",
            refs.len(),
            total,
            postings.len(),
            window_len
        );

        Ok(Self {
            refs,
            window_len,
            postings,
        })
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.refs
    }

    /// Distinct L-mers in the index
    pub fn num_distinct(&self) -> usize {
        self.postings.len()
    }

    fn neighbourhood(&self, window: &[u8], keys: &mut Vec<u64>) {
        let l = self.window_len;
        let mut buf = [0u8; MAX_WINDOW_LEN];

        let push = |candidate: &[u8], keys: &mut Vec<u64>| {
            if let Some(key) = pack(candidate) {
                keys.push(key);
            }
        };

        // Exact and substitutions
        push(window, keys);
        buf[..l].copy_from_slice(window);
        for i in 0..l {
            let original = buf[i];
            for b in 0..4u8 {
                if b != original {
                    buf[i] = b;
                    push(&buf[..l], keys);
                }
            }
            buf[i] = original;
        }

        // Base inserted at position i, last window base dropped
        for i in 0..l {
            buf[..i].copy_from_slice(&window[..i]);
            buf[i + 1..l].copy_from_slice(&window[i..l - 1]);
            for b in 0..4u8 {
                buf[i] = b;
                push(&buf[..l], keys);
            }
        }

        // Base removed at position i, any base appended
        for i in 0..l {
            buf[..i].copy_from_slice(&window[..i]);
            buf[i..l - 1].copy_from_slice(&window[i + 1..l]);
            for b in 0..4u8 {
                buf[l - 1] = b;
                push(&buf[..l], keys);
            }
        }

        keys.sort_unstable();
        keys.dedup();
    }
}

impl SeedIndex for KmerIndex {
    fn window_len(&self) -> usize {
        self.window_len
    }

    fn num_references(&self) -> usize {
        self.refs.len()
    }

    fn reference(&self, id: u32) -> Option<&[u8]> {
        self.refs.seq(id)
    }

    fn reference_name(&self, id: u32) -> Option<&str> {
        self.refs.name(id)
    }

    fn total_length(&self) -> u64 {
        self.refs.total_length()
    }

    fn find_within_one_edit(&self, window: &[u8], hits: &mut Vec<WindowHit>) {
        if window.len() != self.window_len {
            return;
        }
        let mut keys = Vec::with_capacity(11 * self.window_len + 1);
        self.neighbourhood(window, &mut keys);
        for key in keys {
            if let Some(postings) = self.postings.get(&key) {
                hits.extend_from_slice(postings);
            }
        }
    }
}
