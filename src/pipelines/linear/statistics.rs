//! Karlin-Altschul acceptance statistics.
//!
//! For a read of length `m` against a database of `n` bases the expected
//! number of chance hits scoring at least `S` is `E = K * m * n * exp(-lambda * S)`.
//! The acceptance threshold of a read is the smallest integer score whose
//! E-value does not exceed the configured cutoff.

use crate::pipelines::linear::filter_opt::FilterOpt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceModel {
    lambda: f64,
    k: f64,
    evalue_cutoff: f64,
    database_len: u64,
}

impl AcceptanceModel {
    pub fn new(lambda: f64, k: f64, evalue_cutoff: f64, database_len: u64) -> Self {
        Self {
            lambda,
            k,
            evalue_cutoff,
            database_len,
        }
    }

    pub fn from_opt(opt: &FilterOpt, database_len: u64) -> Self {
        Self::new(opt.gumbel_lambda, opt.gumbel_k, opt.evalue, database_len)
    }

    /// Search space `m * n` in bases squared
    fn search_space(&self, read_len: usize) -> f64 {
        read_len as f64 * self.database_len as f64
    }

    /// Minimum score an alignment of a `read_len` read needs to be accepted.
    /// Never below 1.
    pub fn min_score(&self, read_len: usize) -> i32 {
        let space = self.k * self.search_space(read_len);
        if space <= 0.0 {
            return 1;
        }
        let s = (space / self.evalue_cutoff).ln() / self.lambda;
        if !s.is_finite() {
            return 1;
        }
        (s.ceil() as i32).max(1)
    }

    pub fn evalue(&self, score: i32, read_len: usize) -> f64 {
        self.k * self.search_space(read_len) * (-self.lambda * score as f64).exp()
    }

    pub fn bit_score(&self, score: i32) -> f64 {
        (self.lambda * score as f64 - self.k.ln()) / std::f64::consts::LN_2
    }

    pub fn database_len(&self) -> u64 {
        self.database_len
    }
}
