//! Reference sequence collection loaded from FASTA.

use std::path::Path;

use bio::io::fasta;

use crate::core::encoding::encode_reference;
use crate::core::io::read_source::open_input;
use crate::pipelines::linear::error::{PipelineError, Result};

/// Encoded reference sequences and their names, indexed by reference id.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    names: Vec<String>,
    seqs: Vec<Vec<u8>>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference given as ASCII bases. Returns its id.
    pub fn push(&mut self, name: impl Into<String>, seq: &[u8]) -> u32 {
        self.names.push(name.into());
        self.seqs.push(encode_reference(seq));
        (self.seqs.len() - 1) as u32
    }

    /// Load every record of one or more FASTA files (optionally gzipped).
    pub fn from_fasta_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut set = Self::new();
        for path in paths {
            let path = path.as_ref();
            let reader = fasta::Reader::new(open_input(path)?);
            for record in reader.records() {
                let record = record.map_err(|e| {
                    PipelineError::Index(format!("{}: {}", path.display(), e))
                })?;
                set.push(record.id(), record.seq());
            }
            log::debug!(
                "Loaded references from {} ({} total)",
                path.display(),
                set.len()
            );
        }
        if set.is_empty() {
            return Err(PipelineError::Index("no reference sequences loaded".into()));
        }
        if set.len() > u32::MAX as usize {
            return Err(PipelineError::Index("too many reference sequences".into()));
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn seq(&self, id: u32) -> Option<&[u8]> {
        self.seqs.get(id as usize).map(|s| s.as_slice())
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(|s| s.as_str())
    }

    /// Database size in bases
    pub fn total_length(&self) -> u64 {
        self.seqs.iter().map(|s| s.len() as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.seqs
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s.as_slice()))
    }
}
