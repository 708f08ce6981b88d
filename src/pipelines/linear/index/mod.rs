//! Reference collection and the window lookup used by seeding.
//!
//! The pipeline only sees the [`SeedIndex`] trait. [`KmerIndex`] is the
//! in-memory implementation built from a [`ReferenceSet`].

pub mod kmer_index;
pub mod reference;

pub use kmer_index::KmerIndex;
pub use reference::ReferenceSet;

/// One indexed occurrence of an L-mer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHit {
    pub reference_id: u32,
    /// 0-based start of the L-mer on the reference
    pub reference_offset: u32,
}

/// Read-only reference index shared by every processor thread.
pub trait SeedIndex: Send + Sync {
    /// L, the window length the index was built for
    fn window_len(&self) -> usize;

    fn num_references(&self) -> usize;

    /// Encoded reference sequence (codes 0-4)
    fn reference(&self, id: u32) -> Option<&[u8]>;

    fn reference_name(&self, id: u32) -> Option<&str>;

    /// Database size in bases, used by the acceptance statistics
    fn total_length(&self) -> u64;

    /// Append every L-mer occurrence within one edit of `window` to `hits`.
    ///
    /// Each occurrence is reported at most once per call. A window whose
    /// length differs from `window_len()` yields nothing.
    fn find_within_one_edit(&self, window: &[u8], hits: &mut Vec<WindowHit>);
}
