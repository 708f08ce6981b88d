// Read input: FASTA/FASTQ files, plain, gzip or bgzip compressed.
//
// The format of each file is taken from its first record marker ('>' or '@'),
// compression from the gzip magic bytes. Two files give paired input: record i
// of the second file becomes the mate of record i of the first.

use bio::io::{fasta, fastq};
use flate2::read::MultiGzDecoder;
use noodles_bgzf as bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::core::read::Read as SeqRead;
use crate::pipelines::linear::error::{PipelineError, Result};

const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

/// Anything that yields reads for the producer thread.
pub trait ReadSource: Iterator<Item = Result<SeqRead>> + Send {}

impl<I> ReadSource for I where I: Iterator<Item = Result<SeqRead>> + Send {}

/// Compression of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Bgzip,
}

fn detect_compression(path: &Path) -> io::Result<Compression> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 18]; // BGZIP header is at least 18 bytes
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled < 2 || header[0] != 0x1f || header[1] != 0x8b {
        return Ok(Compression::None);
    }
    // BGZIP: FEXTRA flag plus a 'BC' subfield
    if filled >= 14 && header[3] & 0x04 != 0 && header[12] == b'B' && header[13] == b'C' {
        return Ok(Compression::Bgzip);
    }
    Ok(Compression::Gzip)
}

/// Open a possibly compressed file for reading.
pub fn open_input(path: &Path) -> Result<Box<dyn Read + Send>> {
    let compression = detect_compression(path)?;
    let file = File::open(path)?;
    let reader: Box<dyn Read + Send> = match compression {
        Compression::Bgzip => {
            log::debug!("{}: BGZIP input, parallel decompression", path.display());
            Box::new(bgzf::MultithreadedReader::new(file))
        }
        Compression::Gzip => {
            log::debug!("{}: gzip input", path.display());
            Box::new(MultiGzDecoder::new(file))
        }
        Compression::None => Box::new(file),
    };
    Ok(reader)
}

/// Record format of a reads file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastxFormat {
    Fasta,
    Fastq,
}

enum Records {
    Fasta(fasta::Records<BufReader<Box<dyn Read + Send>>>),
    Fastq(fastq::Records<BufReader<Box<dyn Read + Send>>>),
}

/// Records of one FASTA or FASTQ file as [`SeqRead`]s.
pub struct FastxReader {
    path: PathBuf,
    format: FastxFormat,
    records: Records,
    next_num: u64,
}

impl FastxReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut buffered = BufReader::with_capacity(BUFFER_SIZE, open_input(&path)?);

        let first = buffered
            .fill_buf()?
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace());
        let format = match first {
            Some(b'@') => FastxFormat::Fastq,
            Some(b'>') | None => FastxFormat::Fasta,
            Some(other) => {
                return Err(PipelineError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "{}: not FASTA or FASTQ (starts with {:?})",
                        path.display(),
                        other as char
                    ),
                )))
            }
        };

        let inner: Box<dyn Read + Send> = Box::new(buffered);
        let records = match format {
            FastxFormat::Fasta => Records::Fasta(fasta::Reader::new(inner).records()),
            FastxFormat::Fastq => Records::Fastq(fastq::Reader::new(inner).records()),
        };
        log::debug!("{}: reading {:?} records", path.display(), format);

        Ok(Self {
            path,
            format,
            records,
            next_num: 0,
        })
    }

    pub fn format(&self) -> FastxFormat {
        self.format
    }

    fn invalid(&self, message: impl std::fmt::Display) -> PipelineError {
        PipelineError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: {}", self.path.display(), message),
        ))
    }
}

impl Iterator for FastxReader {
    type Item = Result<SeqRead>;

    fn next(&mut self) -> Option<Self::Item> {
        let num = self.next_num;
        let parsed = match &mut self.records {
            Records::Fasta(records) => records
                .next()?
                .map(|rec| SeqRead::new(rec.id(), rec.seq().to_vec(), num))
                .map_err(|e| e.to_string()),
            Records::Fastq(records) => records
                .next()?
                .map(|rec| {
                    SeqRead::new(rec.id(), rec.seq().to_vec(), num).with_qual(rec.qual().to_vec())
                })
                .map_err(|e| e.to_string()),
        };
        match parsed {
            Ok(read) => {
                self.next_num += 1;
                Some(Ok(read))
            }
            Err(message) => Some(Err(self.invalid(message))),
        }
    }
}

/// Single or paired reads from one or two files.
pub struct FastxSource {
    first: FastxReader,
    second: Option<FastxReader>,
}

impl FastxSource {
    /// One path gives single reads, two give pairs.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        match paths {
            [single] => Ok(Self {
                first: FastxReader::open(single)?,
                second: None,
            }),
            [first, second] => Ok(Self {
                first: FastxReader::open(first)?,
                second: Some(FastxReader::open(second)?),
            }),
            _ => Err(PipelineError::Config(format!(
                "expected one or two read files, got {}",
                paths.len()
            ))),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.second.is_some()
    }

    pub fn format(&self) -> FastxFormat {
        self.first.format()
    }
}

impl Iterator for FastxSource {
    type Item = Result<SeqRead>;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(second) = self.second.as_mut() else {
            return self.first.next();
        };
        match (self.first.next(), second.next()) {
            (None, None) => None,
            (Some(Ok(r1)), Some(Ok(r2))) => Some(Ok(r1.with_mate(r2))),
            (Some(Err(e)), _) | (_, Some(Err(e))) => Some(Err(e)),
            (Some(Ok(r)), None) | (None, Some(Ok(r))) => Some(Err(PipelineError::Io(
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("paired inputs differ in length: '{}' has no mate", r.id),
                ),
            ))),
        }
    }
}
