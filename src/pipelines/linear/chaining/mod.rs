//! Seed chaining.
//!
//! # Module Organization
//!
//! - `types` - `Chain` and its signature
//! - `lis` - longest colinear chain (patience sorting)
//!
//! # Algorithm Overview
//!
//! 1. Sort the seeds of one reference by reference offset
//! 2. Cut them into non-overlapping windows one read length wide, each
//!    starting at the first seed not yet assigned
//! 3. Take the longest colinear chain of every window holding enough seeds
//! 4. Drop chains below the minimum length, longest first

mod lis;
mod types;

pub use lis::{longest_chain, longest_chain_sorted, sort_for_chaining};
pub use types::{Chain, ChainSignature};

use crate::pipelines::linear::filter_opt::ChainingParams;
use crate::pipelines::linear::seeding::SeedMatch;

/// Chains worth extending for the seeds of one reference.
pub fn candidate_chains(
    reference_id: u32,
    seeds: &[SeedMatch],
    read_len: usize,
    params: &ChainingParams,
) -> Vec<Chain> {
    let min_hits = params.min_seed_hits.max(1);
    let mut chains = Vec::new();
    if seeds.len() < min_hits {
        return chains;
    }

    let mut by_ref = seeds.to_vec();
    by_ref.sort_unstable_by_key(|s| (s.reference_offset, s.read_offset));

    let span = read_len.max(1) as u64;
    let mut window = Vec::new();
    let mut i = 0;
    while i < by_ref.len() {
        let end_offset = by_ref[i].reference_offset as u64 + span;
        let j = i + by_ref[i..].partition_point(|s| (s.reference_offset as u64) < end_offset);

        if j - i >= min_hits {
            window.clear();
            window.extend_from_slice(&by_ref[i..j]);
            sort_for_chaining(&mut window);
            let chain = longest_chain_sorted(&window);
            if chain.len() >= params.min_chain_len.max(1) {
                chains.push(Chain::new(reference_id, chain));
            }
        }
        i = j;
    }

    chains.sort_by_key(|c| {
        (
            std::cmp::Reverse(c.len()),
            c.first().map_or(0, |s| s.reference_offset),
        )
    });
    chains
}
