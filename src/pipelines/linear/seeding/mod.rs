//! Seed collection for one read.
//!
//! # Module Organization
//!
//! - `types` - `SeedMatch` and the per-reference grouping
//! - `collection` - `SeedCollector`, one pass per skip interval
//!
//! # Algorithm Overview
//!
//! Passes run from the coarsest skip interval to the finest. Each pass looks
//! up the read windows starting at multiples of its interval that no earlier
//! pass visited, asking the index for every L-mer within one edit of the
//! window. Seeds accumulate across passes so a finer pass only adds to what
//! the coarser ones found.

mod collection;
mod types;

pub use collection::{PassSummary, SeedCollector};
pub use types::{SeedMatch, SeedsByReference, MAX_SEEDS_PER_READ};
