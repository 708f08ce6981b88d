// src/defaults.rs

// Seeding Constants
pub const WINDOW_LEN: usize = 18;
pub const SKIP_INTERVALS: [usize; 3] = [18, 9, 3];
pub const MIN_SEED_HITS: usize = 2;
pub const MIN_CHAIN_LEN: usize = 2;
pub const BAND_MARGIN: usize = 16;

// Scoring Constants
pub const MATCH_SCORE: i32 = 2;
pub const MISMATCH_PENALTY: i32 = 3;
pub const GAP_OPEN: i32 = 5;
pub const GAP_EXTEND: i32 = 2;
pub const AMBIGUOUS_PENALTY: i32 = 3;

// Statistics Constants (Gumbel parameters for 2/-3 scoring with 5/2 gaps)
pub const EVALUE: f64 = 1.0;
pub const GUMBEL_LAMBDA: f64 = 0.625;
pub const GUMBEL_K: f64 = 0.41;

// Store Constants
pub const STORE_INITIAL_CAPACITY: usize = 1;
pub const STORE_GROWTH_INCREMENT: usize = 100;

// Queue Constants
pub const QUEUE_CAPACITY: usize = 100;
pub const PROGRESS_INTERVAL: u64 = 100_000;
pub const WRITER_CHANNEL_CAPACITY: usize = 1024;

// Other Constants
pub const VERBOSITY: i32 = 3;
