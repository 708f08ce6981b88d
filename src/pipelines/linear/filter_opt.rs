use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::core::alignment::banded_swa::{fill_scoring_matrix, SwParams};
use crate::core::io::report::{PairedLayout, PairedPolicy};
use crate::defaults;
use crate::pipelines::linear::error::{PipelineError, Result};

// src/pipelines/linear/filter_opt.rs
//
// Filter options. `FilterOpt` is the validated run configuration handed to the
// orchestrator; `FilterCliOptions` is its command-line surface.

/// Scoring parameters for extension. All values are magnitudes: penalties are
/// subtracted by the DP kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringParams {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    /// Cost of the first base of a gap
    pub gap_open: i32,
    /// Cost of every further base of a gap
    pub gap_extend: i32,
    /// Cost of any pairing that involves an ambiguous base
    pub ambiguous_penalty: i32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            match_score: defaults::MATCH_SCORE,
            mismatch_penalty: defaults::MISMATCH_PENALTY,
            gap_open: defaults::GAP_OPEN,
            gap_extend: defaults::GAP_EXTEND,
            ambiguous_penalty: defaults::AMBIGUOUS_PENALTY,
        }
    }
}

impl ScoringParams {
    pub fn sw_params(&self) -> SwParams {
        let mat = fill_scoring_matrix(self.match_score, self.mismatch_penalty, self.ambiguous_penalty);
        SwParams::new(mat, self.gap_open, self.gap_extend)
    }

    /// Highest score a read of `read_len` bases can reach.
    pub fn max_score(&self, read_len: usize) -> i32 {
        self.match_score * read_len as i32
    }
}

/// Largest accepted magnitude of any scoring value. Keeps DP cells of reads
/// up to tens of kilobases inside `i32`.
pub const MAX_SCORE_MAGNITUDE: i32 = i16::MAX as i32;

/// Whether the search stops at the first accepted alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchMode {
    /// Stop at the first accepted alignment
    BestHit,
    /// Search every interval, reference and strand
    AllHits,
}

/// Read queue implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueueBackend {
    /// Mutex and condition variables; exact capacity, FIFO
    Blocking,
    /// Bounded lock-free ring; callers poll
    LockFree,
}

/// Filter options
#[derive(Debug, Clone)]
pub struct FilterOpt {
    pub scoring: ScoringParams,

    // Statistics
    pub evalue: f64,
    pub gumbel_lambda: f64,
    pub gumbel_k: f64,

    // Seeding
    pub window_len: usize,
    pub skip_intervals: Vec<usize>, // coarse to fine
    pub min_seed_hits: usize,

    // Chaining
    pub min_chain_len: usize,

    // Extension
    pub band_margin: usize,

    // Processing
    pub queue_capacity: usize,
    pub queue_backend: QueueBackend,
    pub n_threads: usize,
    pub mode: SearchMode,
    pub num_alignments: Option<usize>, // keep top-N in all-hits mode
    pub forward_only: bool,
}

impl Default for FilterOpt {
    fn default() -> Self {
        Self {
            scoring: ScoringParams::default(),
            evalue: defaults::EVALUE,
            gumbel_lambda: defaults::GUMBEL_LAMBDA,
            gumbel_k: defaults::GUMBEL_K,
            window_len: defaults::WINDOW_LEN,
            skip_intervals: defaults::SKIP_INTERVALS.to_vec(),
            min_seed_hits: defaults::MIN_SEED_HITS,
            min_chain_len: defaults::MIN_CHAIN_LEN,
            band_margin: defaults::BAND_MARGIN,
            queue_capacity: defaults::QUEUE_CAPACITY,
            queue_backend: QueueBackend::Blocking,
            n_threads: 1,
            mode: SearchMode::BestHit,
            num_alignments: None,
            forward_only: false,
        }
    }
}

impl FilterOpt {
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        if s.match_score <= 0 {
            return Err(PipelineError::Config("match score must be positive".into()));
        }
        if s.mismatch_penalty < 0 || s.gap_open < 0 || s.gap_extend < 0 || s.ambiguous_penalty < 0 {
            return Err(PipelineError::Config(
                "penalties are magnitudes and must not be negative".into(),
            ));
        }
        let magnitudes = [
            s.match_score,
            s.mismatch_penalty,
            s.gap_open,
            s.gap_extend,
            s.ambiguous_penalty,
        ];
        if magnitudes.iter().any(|&v| v > MAX_SCORE_MAGNITUDE) {
            return Err(PipelineError::Config(format!(
                "scoring values must not exceed {}",
                MAX_SCORE_MAGNITUDE
            )));
        }
        if self.window_len == 0 || self.window_len > 32 {
            return Err(PipelineError::Config(format!(
                "window length {} outside 1..=32",
                self.window_len
            )));
        }
        if self.skip_intervals.is_empty() || self.skip_intervals.contains(&0) {
            return Err(PipelineError::Config(
                "skip intervals must be non-empty and positive".into(),
            ));
        }
        if self.skip_intervals.windows(2).any(|w| w[0] <= w[1]) {
            return Err(PipelineError::Config(format!(
                "skip intervals must go from coarse to fine, got {:?}",
                self.skip_intervals
            )));
        }
        if self.min_seed_hits == 0 || self.min_chain_len == 0 {
            return Err(PipelineError::Config(
                "minimum seed hits and chain length must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 || self.n_threads == 0 {
            return Err(PipelineError::Config(
                "queue capacity and thread count must be at least 1".into(),
            ));
        }
        if !(self.evalue > 0.0 && self.gumbel_lambda > 0.0 && self.gumbel_k > 0.0) {
            return Err(PipelineError::Config(
                "E-value and Gumbel parameters must be positive".into(),
            ));
        }
        if self.num_alignments == Some(0) {
            return Err(PipelineError::Config("num_alignments must be at least 1".into()));
        }
        Ok(())
    }

    pub fn seeding_params(&self) -> SeedingParams {
        SeedingParams {
            skip_intervals: self.skip_intervals.clone(),
        }
    }

    pub fn chaining_params(&self) -> ChainingParams {
        ChainingParams {
            min_seed_hits: self.min_seed_hits,
            min_chain_len: self.min_chain_len,
        }
    }

    pub fn extension_params(&self) -> ExtensionParams {
        ExtensionParams {
            scoring: self.scoring,
            band_margin: self.band_margin,
        }
    }
}

// ============================================================================
// STAGE-SPECIFIC PARAMETER BUNDLES
// ============================================================================

/// Parameters for the seeding stage. The window length comes from the index.
#[derive(Debug, Clone)]
pub struct SeedingParams {
    pub skip_intervals: Vec<usize>, // coarse to fine
}

/// Parameters for the chaining stage
#[derive(Debug, Clone, Copy)]
pub struct ChainingParams {
    pub min_seed_hits: usize,
    pub min_chain_len: usize,
}

/// Parameters for the extension stage
#[derive(Debug, Clone, Copy)]
pub struct ExtensionParams {
    pub scoring: ScoringParams,
    pub band_margin: usize,
}

#[derive(Debug, Clone, Args)]
pub struct FilterCliOptions {
    /// Reference FASTA file(s)
    #[arg(short = 'r', long = "ref", value_name = "REF.FA", required = true)]
    pub references: Vec<PathBuf>,

    /// Read file(s): one for single-end, two for paired-end (FASTA or FASTQ, optionally gzipped)
    #[arg(short = 'q', long = "reads", value_name = "READS", required = true)]
    pub reads: Vec<PathBuf>,

    /// Output file for aligned reads
    #[arg(short = 'o', long, value_name = "FILE")]
    pub aligned: PathBuf,

    /// Output file for reads that did not align
    #[arg(long, value_name = "FILE")]
    pub other: Option<PathBuf>,

    /// Tabular (BLAST m8-like) alignment report
    #[arg(long, value_name = "FILE")]
    pub blast: Option<PathBuf>,

    /// How mates are routed to the aligned/other outputs
    #[arg(long, value_enum, default_value_t = PairedPolicy::Default)]
    pub paired: PairedPolicy,

    /// Paired input: write first and second mates to separate `_fwd`/`_rev` files
    #[arg(long)]
    pub out2: bool,

    /// Paired input: write pairs routed alike to `_paired` files, the rest to `_singleton` files
    #[arg(long)]
    pub sout: bool,

    /// SAM alignment report
    #[arg(long, value_name = "FILE")]
    pub sam: Option<PathBuf>,

    /// Add @SQ lines for every reference to the SAM header
    #[arg(long, requires = "sam")]
    pub sam_sq: bool,

    /// Also write reads without alignments to the SAM report
    #[arg(long, requires = "sam")]
    pub sam_unaligned: bool,

    // ===== Search Options =====
    /// Window (L-mer) length used for seeding
    #[arg(short = 'L', long, value_name = "INT", default_value_t = defaults::WINDOW_LEN)]
    pub window_len: usize,

    /// Skip intervals between windows, coarse to fine
    #[arg(long, value_name = "INT,INT,INT", value_delimiter = ',', default_values_t = defaults::SKIP_INTERVALS)]
    pub passes: Vec<usize>,

    /// Minimum seeds on a reference before chaining
    #[arg(long, value_name = "INT", default_value_t = defaults::MIN_SEED_HITS)]
    pub min_seed_hits: usize,

    /// Minimum colinear chain length before extension
    #[arg(long, value_name = "INT", default_value_t = defaults::MIN_CHAIN_LEN)]
    pub min_chain_len: usize,

    /// Extra reference bases taken on each side of a candidate region
    #[arg(long, value_name = "INT", default_value_t = defaults::BAND_MARGIN)]
    pub band_margin: usize,

    /// Report every acceptable alignment instead of the first one
    #[arg(short = 'a', long)]
    pub all_hits: bool,

    /// Keep at most INT best alignments per read (with --all-hits)
    #[arg(short = 'n', long, value_name = "INT")]
    pub num_alignments: Option<usize>,

    /// Search only the forward strand
    #[arg(long)]
    pub forward_only: bool,

    // ===== Scoring Options =====
    /// Score for a match
    #[arg(short = 'A', long, value_name = "INT", default_value_t = defaults::MATCH_SCORE)]
    pub match_score: i32,

    /// Penalty for a mismatch
    #[arg(short = 'B', long, value_name = "INT", default_value_t = defaults::MISMATCH_PENALTY)]
    pub mismatch_penalty: i32,

    /// Penalty for the first base of a gap
    #[arg(short = 'O', long, value_name = "INT", default_value_t = defaults::GAP_OPEN)]
    pub gap_open: i32,

    /// Penalty for each further base of a gap
    #[arg(short = 'E', long, value_name = "INT", default_value_t = defaults::GAP_EXTEND)]
    pub gap_extend: i32,

    /// Penalty for pairing with an ambiguous base
    #[arg(short = 'N', long, value_name = "INT", default_value_t = defaults::AMBIGUOUS_PENALTY)]
    pub ambiguous_penalty: i32,

    /// E-value threshold
    #[arg(short = 'e', long, value_name = "FLOAT", default_value_t = defaults::EVALUE)]
    pub evalue: f64,

    /// Gumbel lambda for the scoring scheme
    #[arg(long, value_name = "FLOAT", default_value_t = defaults::GUMBEL_LAMBDA)]
    pub lambda: f64,

    /// Gumbel K for the scoring scheme
    #[arg(long, value_name = "FLOAT", default_value_t = defaults::GUMBEL_K)]
    pub gumbel_k: f64,

    // ===== Processing Options =====
    /// Number of processor threads (default: all available cores)
    #[arg(short = 't', long, value_name = "INT")]
    pub threads: Option<usize>,

    /// Read queue capacity
    #[arg(long, value_name = "INT", default_value_t = defaults::QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Read queue implementation
    #[arg(long, value_enum, default_value_t = QueueBackend::Blocking)]
    pub queue: QueueBackend,

    /// Verbose level: 1=error, 2=warning, 3=message, 4=debug, 5+=trace
    #[arg(short = 'v', long, value_name = "INT", default_value_t = defaults::VERBOSITY)]
    pub verbosity: i32,
}

impl FilterCliOptions {
    pub fn paired_layout(&self) -> PairedLayout {
        PairedLayout {
            out2: self.out2,
            sout: self.sout,
        }
    }

    pub fn to_filter_opt(&self, available_threads: usize) -> Result<FilterOpt> {
        let opt = FilterOpt {
            scoring: ScoringParams {
                match_score: self.match_score,
                mismatch_penalty: self.mismatch_penalty,
                gap_open: self.gap_open,
                gap_extend: self.gap_extend,
                ambiguous_penalty: self.ambiguous_penalty,
            },
            evalue: self.evalue,
            gumbel_lambda: self.lambda,
            gumbel_k: self.gumbel_k,
            window_len: self.window_len,
            skip_intervals: self.passes.clone(),
            min_seed_hits: self.min_seed_hits,
            min_chain_len: self.min_chain_len,
            band_margin: self.band_margin,
            queue_capacity: self.queue_capacity,
            queue_backend: self.queue,
            n_threads: self.threads.unwrap_or(available_threads).max(1),
            mode: if self.all_hits {
                SearchMode::AllHits
            } else {
                SearchMode::BestHit
            },
            num_alignments: self.num_alignments,
            forward_only: self.forward_only,
        };
        opt.validate()?;
        Ok(opt)
    }
}
