//! Pipeline orchestration layer
//!
//! - `search` - per-read state machine over the seeding intervals
//!   (`ReadSearcher`), with its counters and the finished `ReadOutcome`
//! - `driver` - `FilterPipeline`: producer, processor and writer threads
//!   around the read queue

pub mod driver;
pub mod search;

pub use driver::{FilterPipeline, PipelineStatistics};
pub use search::{ReadOutcome, ReadSearchStats, ReadSearcher, SearchOutcome, SearchState};
