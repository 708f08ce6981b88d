//! Thread layout of a filter run.
//!
//! ```text
//! producer ──push──▶ ReadQueue ──pop──▶ processor × N ──send──▶ writer
//! ```
//!
//! The producer drains the read source into the queue and marks it done.
//! Each processor owns a [`ReadSearcher`] and loops until the queue reports
//! end of stream. Finished reads go over a bounded channel to the single
//! writer thread, which owns the [`ResultWriter`].
//!
//! A read-scoped error is reported and the read skipped. The first run-scoped
//! error raises the abort flag: the producer stops reading, processors drain
//! the queue without searching, the writer discards what is still in flight,
//! and `run` returns that error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use parking_lot::Mutex;

use super::search::{ReadOutcome, ReadSearcher};
use crate::core::diagnostics::{DiagnosticSink, LogSink};
use crate::core::io::read_source::ReadSource;
use crate::core::io::report::ResultWriter;
use crate::core::read::Read;
use crate::defaults;
use crate::pipelines::linear::error::{PipelineError, Result};
use crate::pipelines::linear::filter_opt::FilterOpt;
use crate::pipelines::linear::index::SeedIndex;
use crate::pipelines::linear::read_queue::{
    new_read_queue, next_item, push_with_backoff, Backoff, QueueConfig, ReadQueue,
};
use crate::pipelines::linear::statistics::AcceptanceModel;

/// Totals of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStatistics {
    /// Reads (or pairs) handed to the queue
    pub reads_queued: u64,
    /// Reads (or pairs) searched and written
    pub reads_processed: u64,
    /// Sequences with at least one alignment, mates counted separately
    pub sequences_aligned: u64,
    pub sequences_unaligned: u64,
    /// Reads dropped for read-scoped errors, at input or during search
    pub reads_skipped: u64,
    /// Reads popped after an abort and not searched
    pub reads_discarded: u64,
    pub alignments: u64,
    pub seeds: u64,
    pub extensions: u64,
    /// Rejected lock-free pushes
    pub push_retries: u64,
    pub elapsed: Duration,
}

impl PipelineStatistics {
    fn merge_processor(&mut self, tally: &ProcessorTally) {
        self.reads_skipped += tally.skipped;
        self.reads_discarded += tally.discarded;
    }

    fn add_outcome(&mut self, outcome: &ReadOutcome) {
        self.reads_processed += 1;
        let mut add = |aligned: bool, n_aln: usize, seeds: usize, ext: usize| {
            if aligned {
                self.sequences_aligned += 1;
            } else {
                self.sequences_unaligned += 1;
            }
            self.alignments += n_aln as u64;
            self.seeds += seeds as u64;
            self.extensions += ext as u64;
        };
        add(
            outcome.is_aligned(),
            outcome.alignments.len(),
            outcome.stats.seeds_collected,
            outcome.stats.extensions_attempted,
        );
        if let (Some(alns), Some(stats)) = (&outcome.mate_alignments, &outcome.mate_stats) {
            add(
                !alns.is_empty(),
                alns.len(),
                stats.seeds_collected,
                stats.extensions_attempted,
            );
        }
    }

    /// Share of searched sequences with an alignment, in percent
    pub fn aligned_percent(&self) -> f64 {
        let total = self.sequences_aligned + self.sequences_unaligned;
        if total == 0 {
            0.0
        } else {
            100.0 * self.sequences_aligned as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct ProcessorTally {
    skipped: u64,
    discarded: u64,
}

/// First run-scoped error plus the flag every thread polls.
#[derive(Default)]
struct AbortState {
    aborted: AtomicBool,
    first: Mutex<Option<PipelineError>>,
}

impl AbortState {
    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    fn abort(&self, err: PipelineError, sink: &dyn DiagnosticSink) {
        let mut first = self.first.lock();
        if first.is_none() {
            sink.emit(log::Level::Error, &format!("aborting run: {}", err));
            *first = Some(err);
        }
        self.aborted.store(true, Ordering::Release);
    }

    fn take(&self) -> Option<PipelineError> {
        self.first.lock().take()
    }
}

/// A configured filter run over a shared index.
pub struct FilterPipeline {
    opt: FilterOpt,
    index: Arc<dyn SeedIndex>,
    model: AcceptanceModel,
    sink: Arc<dyn DiagnosticSink>,
}

impl FilterPipeline {
    /// Validate the options against the index and derive the acceptance
    /// model from the database size.
    pub fn new(opt: FilterOpt, index: Arc<dyn SeedIndex>) -> Result<Self> {
        opt.validate()?;
        if opt.window_len != index.window_len() {
            return Err(PipelineError::Config(format!(
                "window length {} does not match the index ({})",
                opt.window_len,
                index.window_len()
            )));
        }
        let model = AcceptanceModel::from_opt(&opt, index.total_length());
        Ok(Self {
            opt,
            index,
            model,
            sink: Arc::new(LogSink),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn options(&self) -> &FilterOpt {
        &self.opt
    }

    pub fn model(&self) -> &AcceptanceModel {
        &self.model
    }

    /// Run every read of `source` through the pipeline into `writer`.
    ///
    /// `expected_total` only feeds progress messages; pass 0 when unknown.
    pub fn run<S, W>(&self, source: S, expected_total: u64, writer: &mut W) -> Result<PipelineStatistics>
    where
        S: ReadSource,
        W: ResultWriter + ?Sized,
    {
        let start = Instant::now();
        let n_threads = self.opt.n_threads.max(1);
        let queue: Arc<dyn ReadQueue<Read>> = new_read_queue(
            self.opt.queue_backend,
            QueueConfig::new("reads", self.opt.queue_capacity, expected_total),
            self.sink.clone(),
        );
        let abort = AbortState::default();
        let (tx, rx) = bounded::<ReadOutcome>(defaults::WRITER_CHANNEL_CAPACITY);

        self.sink.info(&format!(
            "Filtering with {} processor threads, {:?} queue of {}, intervals {:?}",
            n_threads, self.opt.queue_backend, self.opt.queue_capacity, self.opt.skip_intervals
        ));

        let (producer_tally, processor_tallies, writer_stats) = thread::scope(|scope| {
            let queue_ref = queue.as_ref();
            let abort_ref = &abort;

            let producer = scope.spawn(move || self.produce(source, queue_ref, abort_ref));

            let processors: Vec<_> = (0..n_threads)
                .map(|_| {
                    let tx = tx.clone();
                    scope.spawn(move || self.process(queue_ref, tx, abort_ref))
                })
                .collect();
            drop(tx);

            let writer_handle = scope.spawn(move || {
                let mut stats = PipelineStatistics::default();
                for outcome in rx.iter() {
                    if abort_ref.is_aborted() {
                        continue;
                    }
                    if let Err(e) = writer.write(&outcome) {
                        abort_ref.abort(e, self.sink.as_ref());
                        continue;
                    }
                    stats.add_outcome(&outcome);
                }
                if !abort_ref.is_aborted() {
                    if let Err(e) = writer.finish() {
                        abort_ref.abort(e, self.sink.as_ref());
                    }
                }
                stats
            });

            let producer_tally = join_thread(producer, "producer");
            let processor_tallies: Vec<Result<ProcessorTally>> = processors
                .into_iter()
                .map(|h| join_thread(h, "processor"))
                .collect();
            let stats = join_thread(writer_handle, "writer");
            (producer_tally, processor_tallies, stats)
        });

        if let Some(err) = abort.take() {
            return Err(err);
        }

        let mut stats = writer_stats?;
        let (queued, skipped, retries) = producer_tally?;
        stats.reads_queued = queued;
        stats.reads_skipped += skipped;
        stats.push_retries = retries;
        for tally in processor_tallies {
            stats.merge_processor(&tally?);
        }
        stats.elapsed = start.elapsed();

        self.sink.info(&format!(
            "Processed {} reads in {:.2}s: {} of {} sequences aligned ({:.2}%), {} skipped",
            stats.reads_processed,
            stats.elapsed.as_secs_f64(),
            stats.sequences_aligned,
            stats.sequences_aligned + stats.sequences_unaligned,
            stats.aligned_percent(),
            stats.reads_skipped
        ));
        Ok(stats)
    }

    /// Producer loop. Returns (queued, skipped, push retries).
    fn produce<S: ReadSource>(
        &self,
        source: S,
        queue: &dyn ReadQueue<Read>,
        abort: &AbortState,
    ) -> (u64, u64, u64) {
        let (mut queued, mut skipped, mut retries) = (0u64, 0u64, 0u64);
        for item in source {
            if abort.is_aborted() {
                break;
            }
            match item {
                Ok(read) => {
                    retries += push_with_backoff(queue, read);
                    queued += 1;
                }
                Err(e) if e.is_run_fatal() => {
                    abort.abort(e, self.sink.as_ref());
                    break;
                }
                Err(e) => {
                    self.sink.warn(&format!("skipping input record: {}", e));
                    skipped += 1;
                }
            }
        }
        queue.mark_done_pushing();
        self.sink.debug(&format!("producer done: {} reads queued", queued));
        (queued, skipped, retries)
    }

    /// Processor loop.
    fn process(
        &self,
        queue: &dyn ReadQueue<Read>,
        tx: crossbeam_channel::Sender<ReadOutcome>,
        abort: &AbortState,
    ) -> ProcessorTally {
        let mut tally = ProcessorTally::default();
        let mut searcher = ReadSearcher::new(self.index.as_ref(), &self.model, &self.opt);
        let mut backoff = Backoff::new();

        while let Some(read) = next_item(queue, &mut backoff) {
            if abort.is_aborted() {
                tally.discarded += 1;
                continue;
            }
            let id = read.id.clone();
            match searcher.process(read) {
                Ok(outcome) => {
                    if tx.send(outcome).is_err() {
                        // Writer gone; keep draining so the producer can finish
                        tally.discarded += 1;
                    }
                }
                Err(e) if e.is_run_fatal() => abort.abort(e, self.sink.as_ref()),
                Err(e) => {
                    self.sink.warn(&format!("skipping read '{}': {}", id, e));
                    tally.skipped += 1;
                }
            }
        }
        tally
    }
}

fn join_thread<T>(handle: thread::ScopedJoinHandle<'_, T>, role: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| PipelineError::Io(std::io::Error::other(format!("{} thread panicked", role))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::MemorySink;
    use crate::core::io::report::CollectingWriter;
    use crate::pipelines::linear::filter_opt::QueueBackend;
    use crate::pipelines::linear::index::{KmerIndex, ReferenceSet};
    use rand::{Rng, SeedableRng};

    fn random_seq(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
    }

    fn pipeline(reference: &[u8], backend: QueueBackend, threads: usize) -> FilterPipeline {
        let mut refs = ReferenceSet::new();
        refs.push("ref", reference);
        let index = KmerIndex::build(refs, 14).unwrap();
        let opt = FilterOpt {
            window_len: 14,
            skip_intervals: vec![14, 7, 2],
            queue_backend: backend,
            queue_capacity: 4,
            n_threads: threads,
            ..Default::default()
        };
        FilterPipeline::new(opt, Arc::new(index)).unwrap()
    }

    struct FailingWriter;

    impl ResultWriter for FailingWriter {
        fn write(&mut self, _: &ReadOutcome) -> Result<()> {
            Err(PipelineError::Writer("disk full".into()))
        }
    }

    #[test]
    fn test_every_read_reaches_the_writer() {
        let reference = random_seq(3000, 11);
        for backend in [QueueBackend::Blocking, QueueBackend::LockFree] {
            let p = pipeline(&reference, backend, 3);
            let reads: Vec<Result<Read>> = (0..40u64)
                .map(|i| {
                    let start = (i as usize * 60) % 2800;
                    let seq = if i % 2 == 0 {
                        reference[start..start + 100].to_vec()
                    } else {
                        vec![b'A'; 100]
                    };
                    Ok(Read::new(format!("r{i}"), seq, i))
                })
                .collect();

            let mut writer = CollectingWriter::new();
            let stats = p.run(reads.into_iter(), 40, &mut writer).unwrap();
            assert!(writer.finished);
            assert_eq!(stats.reads_queued, 40);
            assert_eq!(stats.reads_processed, 40);
            assert_eq!(writer.outcomes.len(), 40);

            for outcome in writer.sorted() {
                assert_eq!(outcome.is_aligned(), outcome.read.read_num % 2 == 0);
            }
            assert_eq!(stats.sequences_aligned, 20);
        }
    }

    #[test]
    fn test_malformed_reads_are_skipped() {
        let reference = random_seq(1000, 12);
        let sink = Arc::new(MemorySink::new());
        let p = pipeline(&reference, QueueBackend::Blocking, 2).with_sink(sink.clone());
        let reads = vec![
            Ok(Read::new("good", reference[100..200].to_vec(), 0)),
            Ok(Read::new("bad", b"ACGT!!".to_vec(), 1)),
            Ok(Read::new("empty", Vec::new(), 2)),
        ];

        let mut writer = CollectingWriter::new();
        let stats = p.run(reads.into_iter(), 0, &mut writer).unwrap();
        assert_eq!(stats.reads_processed, 1);
        assert_eq!(stats.reads_skipped, 2);
        assert_eq!(sink.count(log::Level::Warn), 2);
    }

    #[test]
    fn test_writer_failure_aborts_run() {
        let reference = random_seq(1000, 13);
        let p = pipeline(&reference, QueueBackend::LockFree, 2);
        let reads: Vec<Result<Read>> = (0..50u64)
            .map(|i| Ok(Read::new(format!("r{i}"), reference[0..100].to_vec(), i)))
            .collect();

        let err = p.run(reads.into_iter(), 0, &mut FailingWriter).unwrap_err();
        assert!(matches!(err, PipelineError::Writer(_)));
    }

    #[test]
    fn test_input_error_aborts_run() {
        let reference = random_seq(1000, 14);
        let p = pipeline(&reference, QueueBackend::Blocking, 1);
        let reads = vec![
            Ok(Read::new("r0", reference[0..100].to_vec(), 0)),
            Err(PipelineError::Io(std::io::Error::other("truncated file"))),
            Ok(Read::new("r2", reference[0..100].to_vec(), 2)),
        ];
        let mut writer = CollectingWriter::new();
        let err = p.run(reads.into_iter(), 0, &mut writer).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_window_mismatch_rejected() {
        let mut refs = ReferenceSet::new();
        refs.push("ref", b"ACGTACGTACGTACGTACGT");
        let index = KmerIndex::build(refs, 10).unwrap();
        assert!(FilterPipeline::new(FilterOpt::default(), Arc::new(index)).is_err());
    }
}
