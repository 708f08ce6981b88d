//! Core data types for seed chaining.

use crate::pipelines::linear::seeding::SeedMatch;

/// Colinear seeds on one reference, strictly increasing in both read and
/// reference offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub reference_id: u32,
    pub seeds: Vec<SeedMatch>,
}

/// Identity of a chain for the "already extended" check.
pub type ChainSignature = (u32, u32, u32, u32, u32);

impl Chain {
    pub fn new(reference_id: u32, seeds: Vec<SeedMatch>) -> Self {
        Self {
            reference_id,
            seeds,
        }
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn first(&self) -> Option<&SeedMatch> {
        self.seeds.first()
    }

    pub fn last(&self) -> Option<&SeedMatch> {
        self.seeds.last()
    }

    /// Smallest and largest seed diagonal (reference minus read offset)
    pub fn diagonal_range(&self) -> Option<(i64, i64)> {
        let mut it = self.seeds.iter().map(SeedMatch::diagonal);
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    pub fn signature(&self) -> Option<ChainSignature> {
        let (f, l) = (self.first()?, self.last()?);
        Some((
            self.reference_id,
            f.read_offset,
            f.reference_offset,
            l.read_offset,
            l.reference_offset,
        ))
    }
}
