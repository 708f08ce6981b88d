//! Seed-and-extend read filter against linear reference sequences.
//!
//! Reads flow from a producer through a bounded queue to processor threads.
//! Each processor seeds the read against a k-mer index over progressively
//! finer skip intervals, chains colinear seeds, extends the best chains with a
//! banded Smith-Waterman and accepts alignments by E-value. Results go to a
//! single writer thread.
//!
//! - `read_queue` - bounded queue, blocking and lock-free backends
//! - `index` - reference set and L-mer index with one-edit lookup
//! - `seeding` - per-read seed collection
//! - `chaining` - LIS chains over seeds of one reference
//! - `extension` - banded extension of a chain
//! - `alignment_store` - bounded top-N alignment store
//! - `orchestrator` - per-read search and the threaded driver
//!
//! The entry point is `filter::main_filter()`.

pub mod alignment_store;
pub mod chaining;
pub mod error;
pub mod extension;
pub mod filter;
pub mod filter_opt;
pub mod index;
pub mod orchestrator;
pub mod read_queue;
pub mod seeding;
pub mod statistics;
