//! Core data types for seeding.

use std::collections::BTreeMap;

// Stop querying windows once a read has this many seeds
pub const MAX_SEEDS_PER_READ: usize = 100_000;

/// Approximate match of one read window against one reference position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeedMatch {
    /// Start of the window on the read
    pub read_offset: u32,
    pub reference_id: u32,
    /// Start of the matching L-mer on the reference
    pub reference_offset: u32,
}

impl SeedMatch {
    pub fn new(read_offset: u32, reference_id: u32, reference_offset: u32) -> Self {
        Self {
            read_offset,
            reference_id,
            reference_offset,
        }
    }

    /// Reference offset minus read offset
    #[inline]
    pub fn diagonal(&self) -> i64 {
        self.reference_offset as i64 - self.read_offset as i64
    }
}

/// Seeds of one read grouped by reference id, iterated in id order.
pub type SeedsByReference = BTreeMap<u32, Vec<SeedMatch>>;
