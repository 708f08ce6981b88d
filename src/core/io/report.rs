//! Result writers run on the writer thread.
//!
//! - [`FastxReportWriter`]: aligned reads to one file, the rest optionally to
//!   another, in the input's format (FASTQ when the read has qualities).
//!   Paired output can be split further by mate and by pair agreement.
//! - [`TabularWriter`]: one BLAST-like line per alignment.
//! - [`SamWriter`]: SAM records, optionally with `@SQ` header lines.
//! - [`CollectingWriter`]: keeps outcomes in memory.
//! - [`MultiWriter`]: fans each outcome out to several writers.
//!
//! Paths ending in `.gz` are gzip compressed.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::core::read::Read;
use crate::pipelines::linear::error::{PipelineError, Result};
use crate::pipelines::linear::extension::{AlignmentResult, Strand};
use crate::pipelines::linear::orchestrator::ReadOutcome;
use crate::pipelines::linear::statistics::AcceptanceModel;

/// Consumer of finished reads. Called from the writer thread only.
pub trait ResultWriter: Send {
    fn write(&mut self, outcome: &ReadOutcome) -> Result<()>;

    /// Flush and close outputs after the last outcome.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// How the mates of a pair are routed between the aligned and other outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PairedPolicy {
    /// Each mate goes where its own result says
    #[default]
    Default,
    /// Both mates count as aligned if either one aligned
    PairedIn,
    /// Both mates count as aligned only if both aligned
    PairedOut,
}

impl PairedPolicy {
    /// Aligned flags for (read, mate) of a pair.
    pub fn route(self, read_aligned: bool, mate_aligned: bool) -> (bool, bool) {
        match self {
            PairedPolicy::Default => (read_aligned, mate_aligned),
            PairedPolicy::PairedIn => {
                let any = read_aligned || mate_aligned;
                (any, any)
            }
            PairedPolicy::PairedOut => {
                let both = read_aligned && mate_aligned;
                (both, both)
            }
        }
    }
}

fn writer_error(path: &Path, e: io::Error) -> PipelineError {
    PipelineError::Writer(format!("{}: {}", path.display(), e))
}

enum OutputSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

/// Output file, gzip compressed when the name ends in `.gz`.
pub struct OutputFile {
    path: PathBuf,
    sink: OutputSink,
}

impl OutputFile {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| writer_error(&path, e))?;
        let buffered = BufWriter::with_capacity(1 << 20, file);
        let sink = if path.extension().is_some_and(|ext| ext == "gz") {
            OutputSink::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            OutputSink::Plain(buffered)
        };
        Ok(Self { path, sink })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let res = match &mut self.sink {
            OutputSink::Plain(w) => w.write_all(buf),
            OutputSink::Gzip(w) => w.write_all(buf),
        };
        res.map_err(|e| writer_error(&self.path, e))
    }

    fn finish(&mut self) -> Result<()> {
        let res = match &mut self.sink {
            OutputSink::Plain(w) => w.flush(),
            OutputSink::Gzip(w) => w.try_finish().and_then(|_| w.get_mut().flush()),
        };
        res.map_err(|e| writer_error(&self.path, e))
    }
}

/// FASTA or FASTQ text of one read.
pub fn format_fastx(read: &Read, buf: &mut Vec<u8>) {
    match &read.qual {
        Some(qual) => {
            buf.push(b'@');
            buf.extend_from_slice(read.id.as_bytes());
            buf.push(b'\n');
            buf.extend_from_slice(&read.seq);
            buf.extend_from_slice(b"\n+\n");
            buf.extend_from_slice(qual);
            buf.push(b'\n');
        }
        None => {
            buf.push(b'>');
            buf.extend_from_slice(read.id.as_bytes());
            buf.push(b'\n');
            buf.extend_from_slice(&read.seq);
            buf.push(b'\n');
        }
    }
}

/// Extra splits of the FASTA/FASTQ outputs for paired input.
///
/// Each enabled split multiplies the files behind the aligned (and other)
/// output. Names get a suffix before the first extension, e.g.
/// `aligned.fq.gz` becomes `aligned_paired_fwd.fq.gz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairedLayout {
    /// First and second mates go to separate `_fwd` and `_rev` files
    pub out2: bool,
    /// Pairs whose mates are routed the same way go to `_paired` files,
    /// the others to `_singleton` files
    pub sout: bool,
}

impl PairedLayout {
    pub fn num_files(self) -> usize {
        (1 + self.sout as usize) * (1 + self.out2 as usize)
    }

    /// File slot of mate `mate` (0 or 1) given whether both mates of the
    /// pair were routed alike. Slots run paired-fwd, paired-rev,
    /// singleton-fwd, singleton-rev with absent splits collapsed.
    pub fn slot(self, mate: usize, mates_agree: bool) -> usize {
        let group = usize::from(self.sout && !mates_agree);
        let strand = if self.out2 { mate } else { 0 };
        group * (1 + self.out2 as usize) + strand
    }

    fn suffixes(self) -> &'static [&'static str] {
        match (self.sout, self.out2) {
            (false, false) => &[""],
            (false, true) => &["_fwd", "_rev"],
            (true, false) => &["_paired", "_singleton"],
            (true, true) => &["_paired_fwd", "_paired_rev", "_singleton_fwd", "_singleton_rev"],
        }
    }
}

/// `dir/name.ext` with `suffix` inserted before the first extension.
pub fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        return path.to_path_buf();
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match name.split_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}{suffix}.{ext}"),
        _ => format!("{name}{suffix}"),
    };
    path.with_file_name(renamed)
}

/// The files behind one logical output.
struct OutputGroup {
    files: Vec<OutputFile>,
}

impl OutputGroup {
    fn create(path: &Path, layout: PairedLayout) -> Result<Self> {
        let files = layout
            .suffixes()
            .iter()
            .map(|sfx| OutputFile::create(path_with_suffix(path, sfx)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { files })
    }

    fn finish(&mut self) -> Result<()> {
        self.files.iter_mut().try_for_each(OutputFile::finish)
    }

    fn describe(&self) -> String {
        self.files
            .iter()
            .map(|f| f.path().display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Aligned and non-aligned reads in FASTA/FASTQ.
pub struct FastxReportWriter {
    aligned: OutputGroup,
    other: Option<OutputGroup>,
    policy: PairedPolicy,
    layout: PairedLayout,
    buf: Vec<u8>,
    aligned_written: u64,
    other_written: u64,
}

impl FastxReportWriter {
    pub fn create(aligned: impl AsRef<Path>, other: Option<&Path>, policy: PairedPolicy) -> Result<Self> {
        Self::with_layout(aligned, other, policy, PairedLayout::default())
    }

    /// Like [`create`](Self::create), splitting paired output per `layout`.
    pub fn with_layout(
        aligned: impl AsRef<Path>,
        other: Option<&Path>,
        policy: PairedPolicy,
        layout: PairedLayout,
    ) -> Result<Self> {
        Ok(Self {
            aligned: OutputGroup::create(aligned.as_ref(), layout)?,
            other: other.map(|p| OutputGroup::create(p, layout)).transpose()?,
            policy,
            layout,
            buf: Vec::with_capacity(4096),
            aligned_written: 0,
            other_written: 0,
        })
    }

    /// Reads written to the aligned and other files so far
    pub fn counts(&self) -> (u64, u64) {
        (self.aligned_written, self.other_written)
    }

    fn emit(&mut self, read: &Read, aligned: bool, slot: usize) -> Result<()> {
        self.buf.clear();
        format_fastx(read, &mut self.buf);
        if aligned {
            self.aligned_written += 1;
            self.aligned.files[slot].write_all(&self.buf)
        } else if let Some(other) = self.other.as_mut() {
            self.other_written += 1;
            other.files[slot].write_all(&self.buf)
        } else {
            Ok(())
        }
    }
}

impl ResultWriter for FastxReportWriter {
    fn write(&mut self, outcome: &ReadOutcome) -> Result<()> {
        let read_aligned = outcome.is_aligned();
        match (outcome.read.mate.as_deref(), outcome.mate_aligned()) {
            (Some(mate), Some(mate_aligned)) => {
                if mate.read_num != outcome.read.read_num {
                    return Err(PipelineError::Writer(format!(
                        "mates out of step: '{}' is read {} but its mate '{}' is read {}",
                        outcome.read.id, outcome.read.read_num, mate.id, mate.read_num
                    )));
                }
                let (r, m) = self.policy.route(read_aligned, mate_aligned);
                self.emit(&outcome.read, r, self.layout.slot(0, r == m))?;
                self.emit(mate, m, self.layout.slot(1, r == m))
            }
            _ => self.emit(&outcome.read, read_aligned, 0),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.aligned.finish()?;
        if let Some(other) = self.other.as_mut() {
            other.finish()?;
        }
        log::info!(
            "Wrote {} aligned reads to {}{}",
            self.aligned_written,
            self.aligned.describe(),
            match &self.other {
                Some(o) => format!(", {} other reads to {}", self.other_written, o.describe()),
                None => String::new(),
            }
        );
        Ok(())
    }
}

/// BLAST-like tabular report.
///
/// Columns: query, subject, % identity, alignment length, mismatches, gap
/// opens, query start, query end, subject start, subject end, E-value, bit
/// score, strand. Positions are 1-based and inclusive; query positions refer
/// to the read in the aligned orientation.
pub struct TabularWriter {
    out: OutputFile,
    reference_names: Vec<String>,
    model: AcceptanceModel,
    line: String,
}

impl TabularWriter {
    pub fn create(path: impl AsRef<Path>, reference_names: Vec<String>, model: AcceptanceModel) -> Result<Self> {
        Ok(Self {
            out: OutputFile::create(path)?,
            reference_names,
            model,
            line: String::with_capacity(256),
        })
    }

    fn emit(&mut self, query: &str, aln: &AlignmentResult) -> Result<()> {
        use std::fmt::Write as _;

        let subject = self
            .reference_names
            .get(aln.reference_id as usize)
            .map(String::as_str)
            .unwrap_or("*");
        self.line.clear();
        let _ = writeln!(
            self.line,
            "{}\t{}\t{:.2}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2e}\t{:.1}\t{}",
            query,
            subject,
            aln.edits.identity(),
            aln.edits.aligned_length(),
            aln.edits.mismatches,
            aln.edits.gap_opens,
            aln.read_begin + 1,
            aln.read_end,
            aln.reference_begin + 1,
            aln.reference_end,
            self.model.evalue(aln.score, aln.read_len),
            self.model.bit_score(aln.score),
            aln.strand.as_char(),
        );
        let line = std::mem::take(&mut self.line);
        let res = self.out.write_all(line.as_bytes());
        self.line = line;
        res
    }
}

impl ResultWriter for TabularWriter {
    fn write(&mut self, outcome: &ReadOutcome) -> Result<()> {
        for aln in &outcome.alignments {
            self.emit(&outcome.read.id, aln)?;
        }
        if let (Some(mate), Some(alignments)) = (outcome.read.mate.as_deref(), &outcome.mate_alignments) {
            for aln in alignments {
                self.emit(&mate.id, aln)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.finish()
    }
}

/// SAM flag bits used by [`SamWriter`].
pub mod sam_flags {
    pub const PAIRED: u16 = 0x1;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
}

fn complement_base(b: u8) -> u8 {
    match b {
        b'A' | b'a' => b'T',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        b'T' | b't' | b'U' | b'u' => b'A',
        _ => b'N',
    }
}

/// SAM report.
///
/// One record per alignment; the first alignment of a read is primary, later
/// ones carry the secondary flag. Reverse-strand records hold the reverse
/// complement of the read. Reads without alignments are written as unmapped
/// records only when asked for.
pub struct SamWriter {
    out: OutputFile,
    reference_names: Vec<String>,
    write_unaligned: bool,
    line: Vec<u8>,
}

impl SamWriter {
    /// Open `path` and write the header. `references` are (name, length)
    /// pairs in reference id order; with `with_sq` each becomes an `@SQ`
    /// line.
    pub fn create(
        path: impl AsRef<Path>,
        references: &[(String, usize)],
        with_sq: bool,
        write_unaligned: bool,
    ) -> Result<Self> {
        use std::fmt::Write as _;

        let mut out = OutputFile::create(path)?;
        let mut header = String::from("@HD\tVN:1.0\tSO:unsorted\n");
        if with_sq {
            for (name, len) in references {
                let _ = writeln!(header, "@SQ\tSN:{}\tLN:{}", name, len);
            }
        }
        let _ = writeln!(
            header,
            "@PG\tID:{pkg}\tPN:{pkg}\tVN:{ver}",
            pkg = env!("CARGO_PKG_NAME"),
            ver = env!("CARGO_PKG_VERSION")
        );
        out.write_all(header.as_bytes())?;

        Ok(Self {
            out,
            reference_names: references.iter().map(|(name, _)| name.clone()).collect(),
            write_unaligned,
            line: Vec::with_capacity(1024),
        })
    }

    fn push_field(&mut self, field: &[u8]) {
        self.line.extend_from_slice(field);
        self.line.push(b'\t');
    }

    fn push_seq_qual(&mut self, read: &Read, reverse: bool) {
        if reverse {
            self.line.extend(read.seq.iter().rev().map(|&b| complement_base(b)));
        } else {
            self.line.extend_from_slice(&read.seq);
        }
        self.line.push(b'\t');
        match &read.qual {
            Some(q) if reverse => self.line.extend(q.iter().rev()),
            Some(q) => self.line.extend_from_slice(q),
            None => self.line.push(b'*'),
        }
    }

    fn emit_alignment(&mut self, read: &Read, aln: &AlignmentResult, flag: u16) -> Result<()> {
        let reverse = aln.strand == Strand::Reverse;
        let flag = if reverse { flag | sam_flags::REVERSE } else { flag };
        let rname = self
            .reference_names
            .get(aln.reference_id as usize)
            .map(String::as_str)
            .unwrap_or("*")
            .to_string();

        let mut cigar = String::new();
        if aln.read_begin > 0 {
            cigar.push_str(&format!("{}S", aln.read_begin));
        }
        cigar.push_str(&aln.cigar_string());
        if aln.read_end < aln.read_len {
            cigar.push_str(&format!("{}S", aln.read_len - aln.read_end));
        }

        self.line.clear();
        self.push_field(read.id.as_bytes());
        self.push_field(flag.to_string().as_bytes());
        self.push_field(rname.as_bytes());
        self.push_field((aln.reference_begin + 1).to_string().as_bytes());
        self.push_field(b"255");
        self.push_field(cigar.as_bytes());
        self.push_field(b"*\t0\t0");
        self.push_seq_qual(read, reverse);
        self.line.extend_from_slice(
            format!("\tAS:i:{}\tNM:i:{}\n", aln.score, aln.edits.edit_distance()).as_bytes(),
        );
        let line = std::mem::take(&mut self.line);
        let res = self.out.write_all(&line);
        self.line = line;
        res
    }

    fn emit_unmapped(&mut self, read: &Read, flag: u16) -> Result<()> {
        self.line.clear();
        self.push_field(read.id.as_bytes());
        self.push_field((flag | sam_flags::UNMAPPED).to_string().as_bytes());
        self.push_field(b"*\t0\t0\t*\t*\t0\t0");
        self.push_seq_qual(read, false);
        self.line.push(b'\n');
        let line = std::mem::take(&mut self.line);
        let res = self.out.write_all(&line);
        self.line = line;
        res
    }

    fn emit_read(&mut self, read: &Read, alignments: &[AlignmentResult], flag: u16) -> Result<()> {
        if alignments.is_empty() {
            return if self.write_unaligned {
                self.emit_unmapped(read, flag)
            } else {
                Ok(())
            };
        }
        for (i, aln) in alignments.iter().enumerate() {
            let flag = if i > 0 { flag | sam_flags::SECONDARY } else { flag };
            self.emit_alignment(read, aln, flag)?;
        }
        Ok(())
    }
}

impl ResultWriter for SamWriter {
    fn write(&mut self, outcome: &ReadOutcome) -> Result<()> {
        match (outcome.read.mate.as_deref(), outcome.mate_alignments.as_deref()) {
            (Some(mate), Some(mate_alignments)) => {
                let mut read_flag = sam_flags::PAIRED | sam_flags::FIRST_IN_PAIR;
                let mut mate_flag = sam_flags::PAIRED | sam_flags::SECOND_IN_PAIR;
                if mate_alignments.is_empty() {
                    read_flag |= sam_flags::MATE_UNMAPPED;
                }
                if outcome.alignments.is_empty() {
                    mate_flag |= sam_flags::MATE_UNMAPPED;
                }
                self.emit_read(&outcome.read, &outcome.alignments, read_flag)?;
                self.emit_read(mate, mate_alignments, mate_flag)
            }
            _ => self.emit_read(&outcome.read, &outcome.alignments, 0),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.out.finish()
    }
}

/// Keeps every outcome in memory.
#[derive(Debug, Default)]
pub struct CollectingWriter {
    pub outcomes: Vec<ReadOutcome>,
    pub finished: bool,
}

impl CollectingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes sorted back into input order
    pub fn sorted(&self) -> Vec<&ReadOutcome> {
        let mut sorted: Vec<&ReadOutcome> = self.outcomes.iter().collect();
        sorted.sort_by_key(|o| o.read.read_num);
        sorted
    }
}

impl ResultWriter for CollectingWriter {
    fn write(&mut self, outcome: &ReadOutcome) -> Result<()> {
        self.outcomes.push(outcome.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Sends every outcome to each inner writer in turn.
#[derive(Default)]
pub struct MultiWriter {
    writers: Vec<Box<dyn ResultWriter>>,
}

impl MultiWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, writer: Box<dyn ResultWriter>) {
        self.writers.push(writer);
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl ResultWriter for MultiWriter {
    fn write(&mut self, outcome: &ReadOutcome) -> Result<()> {
        for w in &mut self.writers {
            w.write(outcome)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for w in &mut self.writers {
            w.finish()?;
        }
        Ok(())
    }
}
