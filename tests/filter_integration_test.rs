// tests/filter_integration_test.rs
//
// End-to-end runs of the filter command through its command-line options:
// FASTA/FASTQ inputs on disk, aligned/other outputs and the tabular and SAM
// reports.

use std::collections::BTreeSet;
use std::fs;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};

use clap::Parser;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::{Rng, SeedableRng};

use ferrous_sieve::pipelines::linear::filter::main_filter;
use ferrous_sieve::pipelines::linear::filter_opt::FilterCliOptions;
use ferrous_sieve::pipelines::linear::orchestrator::PipelineStatistics;

#[derive(Parser)]
struct TestCli {
    #[command(flatten)]
    opts: FilterCliOptions,
}

fn run(args: &[&str]) -> anyhow::Result<PipelineStatistics> {
    let cli = TestCli::try_parse_from(std::iter::once("ferrous-sieve").chain(args.iter().copied()))?;
    let opt = cli.opts.to_filter_opt(2)?;
    main_filter(&cli.opts, opt)
}

fn random_seq(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            _ => b'A',
        })
        .collect()
}

fn fasta(records: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (id, seq) in records {
        out.extend_from_slice(format!(">{id}\n").as_bytes());
        out.extend_from_slice(seq);
        out.push(b'\n');
    }
    out
}

fn fastq(records: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (id, seq) in records {
        out.extend_from_slice(format!("@{id}\n").as_bytes());
        out.extend_from_slice(seq);
        out.extend_from_slice(b"\n+\n");
        out.extend(std::iter::repeat(b'I').take(seq.len()));
        out.push(b'\n');
    }
    out
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn read_text(path: &Path) -> String {
    let raw = fs::read(path).unwrap();
    if raw.starts_with(&[0x1f, 0x8b]) {
        let mut text = String::new();
        MultiGzDecoder::new(&raw[..]).read_to_string(&mut text).unwrap();
        text
    } else {
        String::from_utf8(raw).unwrap()
    }
}

/// Record ids of a FASTA or FASTQ output file.
fn ids(path: &Path) -> BTreeSet<String> {
    let text = read_text(path);
    let lines: Vec<&str> = text.lines().collect();
    match lines.first().and_then(|l| l.chars().next()) {
        Some('@') => lines.iter().step_by(4).map(|l| l[1..].to_string()).collect(),
        Some('>') => lines
            .iter()
            .filter(|l| l.starts_with('>'))
            .map(|l| l[1..].to_string())
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

struct Fixture {
    dir: tempfile::TempDir,
    chr1: Vec<u8>,
    chr2: Vec<u8>,
    reference: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let chr1 = random_seq(3000, 101);
    let chr2 = random_seq(2000, 102);
    let reference = write_file(
        dir.path(),
        "ref.fa",
        &fasta(&[("chr1", &chr1[..]), ("chr2", &chr2[..])]),
    );
    Fixture {
        dir,
        chr1,
        chr2,
        reference,
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_single_end_split_and_report() {
    let fx = fixture();
    let mut mutated = fx.chr1[1000..1100].to_vec();
    for pos in [20, 50, 80] {
        mutated[pos] = if mutated[pos] == b'A' { b'C' } else { b'A' };
    }
    let rc = revcomp(&fx.chr2[500..620]);
    let unrelated1 = random_seq(100, 201);
    let unrelated2 = random_seq(100, 202);
    let reads = write_file(
        fx.dir.path(),
        "reads.fq",
        &fastq(&[
            ("r0", &fx.chr1[100..200]),
            ("r1", &rc[..]),
            ("r2", &mutated[..]),
            ("u0", &unrelated1[..]),
            ("u1", &unrelated2[..]),
        ]),
    );
    let aligned = fx.dir.path().join("aligned.fq");
    let other = fx.dir.path().join("other.fq");
    let blast = fx.dir.path().join("hits.tsv");

    let stats = run(&[
        "-r",
        path_str(&fx.reference),
        "-q",
        path_str(&reads),
        "-o",
        path_str(&aligned),
        "--other",
        path_str(&other),
        "--blast",
        path_str(&blast),
        "-t",
        "2",
    ])
    .unwrap();

    assert_eq!(stats.reads_processed, 5);
    assert_eq!(stats.sequences_aligned, 3);
    assert_eq!(stats.sequences_unaligned, 2);
    assert_eq!(ids(&aligned), set(&["r0", "r1", "r2"]));
    assert_eq!(ids(&other), set(&["u0", "u1"]));

    let report = read_text(&blast);
    let rows: Vec<Vec<&str>> = report.lines().map(|l| l.split('\t').collect()).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.len() == 13));

    let r0 = rows.iter().find(|r| r[0] == "r0").unwrap();
    assert_eq!(r0[1], "chr1");
    assert_eq!(r0[2], "100.00");
    assert_eq!((r0[8], r0[9]), ("101", "200"));
    assert_eq!(r0[12], "+");

    let r1 = rows.iter().find(|r| r[0] == "r1").unwrap();
    assert_eq!(r1[1], "chr2");
    assert_eq!((r1[8], r1[9]), ("501", "620"));
    assert_eq!(r1[12], "-");

    let r2 = rows.iter().find(|r| r[0] == "r2").unwrap();
    assert_eq!(r2[4], "3");
}

#[test]
fn test_paired_routing_policies() {
    let fx = fixture();
    let unrelated: Vec<Vec<u8>> = (0..3).map(|i| random_seq(100, 300 + i)).collect();
    let mate2 = revcomp(&fx.chr1[400..500]);
    let reads1 = write_file(
        fx.dir.path(),
        "reads_1.fa",
        &fasta(&[
            ("p0/1", &fx.chr1[100..200]),
            ("p1/1", &fx.chr2[300..400]),
            ("p2/1", &unrelated[0][..]),
        ]),
    );
    let reads2 = write_file(
        fx.dir.path(),
        "reads_2.fa",
        &fasta(&[
            ("p0/2", &mate2[..]),
            ("p1/2", &unrelated[1][..]),
            ("p2/2", &unrelated[2][..]),
        ]),
    );

    let cases = [
        (
            "default",
            set(&["p0/1", "p0/2", "p1/1"]),
            set(&["p1/2", "p2/1", "p2/2"]),
        ),
        (
            "paired-in",
            set(&["p0/1", "p0/2", "p1/1", "p1/2"]),
            set(&["p2/1", "p2/2"]),
        ),
        (
            "paired-out",
            set(&["p0/1", "p0/2"]),
            set(&["p1/1", "p1/2", "p2/1", "p2/2"]),
        ),
    ];

    for (policy, expected_aligned, expected_other) in cases {
        let aligned = fx.dir.path().join(format!("aligned_{policy}.fa"));
        let other = fx.dir.path().join(format!("other_{policy}.fa"));
        let stats = run(&[
            "-r",
            path_str(&fx.reference),
            "-q",
            path_str(&reads1),
            "-q",
            path_str(&reads2),
            "-o",
            path_str(&aligned),
            "--other",
            path_str(&other),
            "--paired",
            policy,
        ])
        .unwrap();

        assert_eq!(stats.reads_processed, 3, "policy {policy}");
        assert_eq!(stats.sequences_aligned, 3, "policy {policy}");
        assert_eq!(ids(&aligned), expected_aligned, "policy {policy}");
        assert_eq!(ids(&other), expected_other, "policy {policy}");
    }
}

#[test]
fn test_split_paired_outputs_and_sam_report() {
    let fx = fixture();
    let unrelated: Vec<Vec<u8>> = (0..3).map(|i| random_seq(100, 310 + i)).collect();
    let mate2 = revcomp(&fx.chr1[400..500]);
    let reads1 = write_file(
        fx.dir.path(),
        "split_1.fa",
        &fasta(&[
            ("p0/1", &fx.chr1[100..200]),
            ("p1/1", &fx.chr2[300..400]),
            ("p2/1", &unrelated[0][..]),
        ]),
    );
    let reads2 = write_file(
        fx.dir.path(),
        "split_2.fa",
        &fasta(&[
            ("p0/2", &mate2[..]),
            ("p1/2", &unrelated[1][..]),
            ("p2/2", &unrelated[2][..]),
        ]),
    );
    let out = fx.dir.path();
    let sam = out.join("hits.sam");

    run(&[
        "-r",
        path_str(&fx.reference),
        "-q",
        path_str(&reads1),
        "-q",
        path_str(&reads2),
        "-o",
        path_str(&out.join("aligned.fa")),
        "--other",
        path_str(&out.join("other.fa")),
        "--out2",
        "--sout",
        "--sam",
        path_str(&sam),
        "--sam-sq",
    ])
    .unwrap();

    assert_eq!(ids(&out.join("aligned_paired_fwd.fa")), set(&["p0/1"]));
    assert_eq!(ids(&out.join("aligned_paired_rev.fa")), set(&["p0/2"]));
    assert_eq!(ids(&out.join("aligned_singleton_fwd.fa")), set(&["p1/1"]));
    assert_eq!(ids(&out.join("aligned_singleton_rev.fa")), set(&[]));
    assert_eq!(ids(&out.join("other_paired_fwd.fa")), set(&["p2/1"]));
    assert_eq!(ids(&out.join("other_paired_rev.fa")), set(&["p2/2"]));
    assert_eq!(ids(&out.join("other_singleton_rev.fa")), set(&["p1/2"]));
    assert!(!out.join("aligned.fa").exists());

    let text = read_text(&sam);
    let header: Vec<&str> = text.lines().filter(|l| l.starts_with('@')).collect();
    assert!(header.contains(&"@SQ\tSN:chr1\tLN:3000"));
    assert!(header.contains(&"@SQ\tSN:chr2\tLN:2000"));
    let records: Vec<Vec<&str>> = text
        .lines()
        .filter(|l| !l.starts_with('@'))
        .map(|l| l.split('\t').collect())
        .collect();
    let flags: BTreeSet<(String, String)> = records
        .iter()
        .map(|r| (r[0].to_string(), r[1].to_string()))
        .collect();
    assert_eq!(
        flags,
        [("p0/1", "65"), ("p0/2", "145"), ("p1/1", "73")]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    );
    let p0 = records.iter().find(|r| r[0] == "p0/1").unwrap();
    assert_eq!((p0[2], p0[3], p0[5]), ("chr1", "101", "100M"));
}

#[test]
fn test_gzip_input_and_output_with_lock_free_queue() {
    let fx = fixture();
    let records: Vec<(String, Vec<u8>)> = (0..30)
        .map(|i| {
            let start = 50 + i * 90;
            (format!("g{i}"), fx.chr1[start..start + 100].to_vec())
        })
        .collect();
    let borrowed: Vec<(&str, &[u8])> = records.iter().map(|(id, s)| (id.as_str(), &s[..])).collect();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&fasta(&borrowed)).unwrap();
    let reads = write_file(fx.dir.path(), "reads.fa.gz", &encoder.finish().unwrap());
    let aligned = fx.dir.path().join("aligned.fa.gz");

    let stats = run(&[
        "-r",
        path_str(&fx.reference),
        "-q",
        path_str(&reads),
        "-o",
        path_str(&aligned),
        "--queue",
        "lock-free",
        "--queue-capacity",
        "2",
        "-t",
        "4",
    ])
    .unwrap();

    assert_eq!(stats.reads_queued, 30);
    assert_eq!(stats.sequences_aligned, 30);
    assert!(fs::read(&aligned).unwrap().starts_with(&[0x1f, 0x8b]));
    let expected: BTreeSet<String> = records.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids(&aligned), expected);
}

#[test]
fn test_all_hits_reports_each_copy() {
    let dir = tempfile::tempdir().unwrap();
    let unit = random_seq(150, 401);
    let mut genome = random_seq(300, 402);
    genome.extend_from_slice(&unit);
    genome.extend(random_seq(300, 403));
    genome.extend_from_slice(&unit);
    genome.extend(random_seq(300, 404));
    let reference = write_file(dir.path(), "ref.fa", &fasta(&[("rep", &genome[..])]));
    let reads = write_file(dir.path(), "reads.fa", &fasta(&[("copy", &unit[..])]));
    let aligned = dir.path().join("aligned.fa");
    let blast = dir.path().join("hits.tsv");

    let stats = run(&[
        "-r",
        path_str(&reference),
        "-q",
        path_str(&reads),
        "-o",
        path_str(&aligned),
        "--blast",
        path_str(&blast),
        "--all-hits",
    ])
    .unwrap();

    assert_eq!(stats.alignments, 2);
    let starts: BTreeSet<String> = read_text(&blast)
        .lines()
        .map(|l| l.split('\t').nth(8).unwrap().to_string())
        .collect();
    assert_eq!(starts, set(&["301", "751"]));
}

#[test]
fn test_missing_reference_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let reads = write_file(dir.path(), "reads.fa", b">r\nACGT\n");
    let aligned = dir.path().join("aligned.fa");
    let missing = dir.path().join("nope.fa");
    let err = run(&[
        "-r",
        path_str(&missing),
        "-q",
        path_str(&reads),
        "-o",
        path_str(&aligned),
    ])
    .unwrap_err();
    assert!(format!("{err:#}").contains("references"));
}

#[test]
fn test_invalid_options_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let reference = write_file(dir.path(), "ref.fa", b">c\nACGTACGTACGTACGTACGTAC\n");
    let reads = write_file(dir.path(), "reads.fa", b">r\nACGT\n");
    let aligned = dir.path().join("aligned.fa");
    let result = run(&[
        "-r",
        path_str(&reference),
        "-q",
        path_str(&reads),
        "-o",
        path_str(&aligned),
        "--passes",
        "3,9,18",
    ]);
    assert!(result.is_err());
    assert!(!aligned.exists());
}
