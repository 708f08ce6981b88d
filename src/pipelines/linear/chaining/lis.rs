//! Longest colinear chain in O(n log n).
//!
//! Seeds are ordered by read offset ascending and, for equal read offsets, by
//! reference offset descending, so two seeds sharing a read offset can never
//! both be taken. Scanning that order backwards, a chain starting at seed `i`
//! is a strictly increasing run of `-reference_offset`, which patience sorting
//! measures for every `i` in one pass. The chain is then rebuilt forwards from
//! the earliest seed that starts a maximal chain, each step taking the
//! earliest compatible seed that still leaves a maximal continuation.

use crate::pipelines::linear::seeding::SeedMatch;

/// Sort seeds into chaining order.
pub fn sort_for_chaining(seeds: &mut [SeedMatch]) {
    seeds.sort_unstable_by(|a, b| {
        a.read_offset
            .cmp(&b.read_offset)
            .then(b.reference_offset.cmp(&a.reference_offset))
    });
}

/// Length of the longest chain starting at each seed of a sorted slice.
fn chain_lengths_from(sorted: &[SeedMatch]) -> Vec<usize> {
    let mut lengths = vec![0usize; sorted.len()];
    // tails[k]: smallest key ending an increasing run of length k + 1
    let mut tails: Vec<i64> = Vec::with_capacity(sorted.len());

    for (i, seed) in sorted.iter().enumerate().rev() {
        let key = -(seed.reference_offset as i64);
        let pos = tails.partition_point(|&t| t < key);
        if pos == tails.len() {
            tails.push(key);
        } else {
            tails[pos] = key;
        }
        lengths[i] = pos + 1;
    }
    lengths
}

/// Longest chain strictly increasing in both offsets.
///
/// Among chains of maximal length the one anchored at the earliest read
/// offset wins, then the one taking the earliest seeds. Input order does not
/// matter. Returns an empty vector for no seeds.
pub fn longest_chain(seeds: &[SeedMatch]) -> Vec<SeedMatch> {
    let mut sorted = seeds.to_vec();
    sort_for_chaining(&mut sorted);
    longest_chain_sorted(&sorted)
}

/// [`longest_chain`] for seeds already in [`sort_for_chaining`] order.
pub fn longest_chain_sorted(sorted: &[SeedMatch]) -> Vec<SeedMatch> {
    let lengths = chain_lengths_from(sorted);
    let Some(&best) = lengths.iter().max() else {
        return Vec::new();
    };
    let Some(start) = lengths.iter().position(|&l| l == best) else {
        return Vec::new();
    };

    let mut chain = Vec::with_capacity(best);
    chain.push(sorted[start]);
    let mut cur = sorted[start];
    let mut need = best - 1;

    for (j, seed) in sorted.iter().enumerate().skip(start + 1) {
        if need == 0 {
            break;
        }
        if lengths[j] == need
            && seed.read_offset > cur.read_offset
            && seed.reference_offset > cur.reference_offset
        {
            chain.push(*seed);
            cur = *seed;
            need -= 1;
        }
    }
    chain
}
