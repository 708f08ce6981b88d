//! Error types for the filter pipeline.
//!
//! Errors fall into two scopes. Read-scoped errors abort the pipeline for a
//! single read only: the read is reported and skipped. Run-scoped errors mean
//! further results cannot be trusted and terminate the whole run.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Read has no sequence
    #[error("read '{id}' has an empty sequence")]
    EmptyRead { id: String },

    /// Read contains a byte that is not a nucleotide code
    #[error("read '{id}' contains invalid base {byte:?} at position {pos}")]
    MalformedRead { id: String, pos: usize, byte: char },

    /// Seed coordinates point outside the reference (corrupted index)
    #[error(
        "reference segment [{begin}, {end}) out of bounds for reference {reference_id} of length {len}"
    )]
    SegmentOutOfBounds {
        reference_id: u32,
        begin: usize,
        end: usize,
        len: usize,
    },

    /// Alignment store growth failed
    #[error("failed to grow alignment store to {requested} entries")]
    Allocation { requested: usize },

    #[error("index error: {0}")]
    Index(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("writer error: {0}")]
    Writer(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// True when the error invalidates the run rather than a single read.
    pub fn is_run_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::EmptyRead { .. }
                | PipelineError::MalformedRead { .. }
                | PipelineError::SegmentOutOfBounds { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_scoped_errors_are_not_fatal() {
        let empty = PipelineError::EmptyRead { id: "r1".into() };
        let malformed = PipelineError::MalformedRead {
            id: "r1".into(),
            pos: 3,
            byte: '#',
        };
        let segment = PipelineError::SegmentOutOfBounds {
            reference_id: 0,
            begin: 10,
            end: 20,
            len: 5,
        };
        assert!(!empty.is_run_fatal());
        assert!(!malformed.is_run_fatal());
        assert!(!segment.is_run_fatal());
    }

    #[test]
    fn test_run_scoped_errors_are_fatal() {
        assert!(PipelineError::Allocation { requested: 10 }.is_run_fatal());
        assert!(PipelineError::Index("bad".into()).is_run_fatal());
        assert!(PipelineError::Writer("closed".into()).is_run_fatal());
        assert!(PipelineError::from(io::Error::other("disk")).is_run_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::MalformedRead {
            id: "read7".into(),
            pos: 2,
            byte: '!',
        };
        assert_eq!(
            err.to_string(),
            "read 'read7' contains invalid base '!' at position 2"
        );
    }
}
