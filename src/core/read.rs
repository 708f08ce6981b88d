//! Read record handed from the producer to the processors.

/// One sequencing read.
///
/// For paired data the second mate travels inside the first one, so a single
/// queue pop always delivers a complete fragment and both mates can be
/// reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub id: String,
    /// Raw sequence bytes as read from the input
    pub seq: Vec<u8>,
    /// Quality string for FASTQ input
    pub qual: Option<Vec<u8>>,
    /// 0-based position of the read (or pair) in the input
    pub read_num: u64,
    pub mate: Option<Box<Read>>,
}

impl Read {
    pub fn new(id: impl Into<String>, seq: impl Into<Vec<u8>>, read_num: u64) -> Self {
        Self {
            id: id.into(),
            seq: seq.into(),
            qual: None,
            read_num,
            mate: None,
        }
    }

    pub fn with_qual(mut self, qual: impl Into<Vec<u8>>) -> Self {
        self.qual = Some(qual.into());
        self
    }

    pub fn with_mate(mut self, mate: Read) -> Self {
        self.mate = Some(Box::new(mate));
        self
    }

    pub fn is_paired(&self) -> bool {
        self.mate.is_some()
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}
