//! Per-read search: seeding passes from coarse to fine, chaining, extension
//! and acceptance.
//!
//! ```text
//! PENDING -> SEEDING(i) -> CHAIN_SEARCH -> EXTENDING -> ACCEPTED -> DONE
//!                 ^             |              |
//!                 +-- i + 1 <---+--------------+      (finer interval left)
//!                               EXHAUSTED -> DONE     (none left)
//! ```
//!
//! Each interval searches the forward strand and then, unless disabled, the
//! reverse complement. Best-hit mode stops at the first accepted alignment;
//! all-hits mode runs every interval and keeps every accepted alignment that
//! does not overlap one already stored.

use std::collections::HashSet;

use crate::core::encoding::{encode_read, reverse_complement};
use crate::core::read::Read;
use crate::pipelines::linear::alignment_store::AlignmentStore;
use crate::pipelines::linear::chaining::{candidate_chains, Chain, ChainSignature};
use crate::pipelines::linear::error::{PipelineError, Result};
use crate::pipelines::linear::extension::{AlignmentExtender, AlignmentResult, Strand};
use crate::pipelines::linear::filter_opt::{ChainingParams, FilterOpt, SearchMode, SeedingParams};
use crate::pipelines::linear::index::SeedIndex;
use crate::pipelines::linear::seeding::SeedCollector;
use crate::pipelines::linear::statistics::AcceptanceModel;

/// Where a read's search currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Pending,
    /// Collecting seeds at skip interval `i` (index into the interval list)
    Seeding(usize),
    ChainSearch,
    Extending,
    Accepted,
    Exhausted,
    Done,
}

/// How a read's search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOutcome {
    Accepted,
    #[default]
    Exhausted,
}

/// Counters of one read's search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSearchStats {
    /// Skip intervals entered
    pub intervals_tried: usize,
    pub windows_queried: usize,
    pub seeds_collected: usize,
    pub chains_built: usize,
    pub extensions_attempted: usize,
    pub alignments_accepted: usize,
    pub min_score: i32,
    pub outcome: SearchOutcome,
}

/// One finished read (or pair) on its way to the writer.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub read: Read,
    pub alignments: Vec<AlignmentResult>,
    pub stats: ReadSearchStats,
    /// Present for paired reads
    pub mate_alignments: Option<Vec<AlignmentResult>>,
    pub mate_stats: Option<ReadSearchStats>,
}

impl ReadOutcome {
    pub fn is_aligned(&self) -> bool {
        !self.alignments.is_empty()
    }

    /// `None` for single reads
    pub fn mate_aligned(&self) -> Option<bool> {
        self.mate_alignments.as_ref().map(|a| !a.is_empty())
    }

    /// Aligned under the "either mate" rule
    pub fn any_aligned(&self) -> bool {
        self.is_aligned() || self.mate_aligned() == Some(true)
    }

    /// Highest scoring alignment of the first read, earliest on ties
    pub fn best(&self) -> Option<&AlignmentResult> {
        self.alignments.iter().fold(None, |best, a| match best {
            Some(b) if b.score >= a.score => Some(b),
            _ => Some(a),
        })
    }
}

/// Per-strand scratch reused between reads.
struct StrandScratch {
    strand: Strand,
    codes: Vec<u8>,
    collector: SeedCollector,
    extended: HashSet<ChainSignature>,
}

impl StrandScratch {
    fn new(strand: Strand, window_len: usize) -> Self {
        Self {
            strand,
            codes: Vec::new(),
            collector: SeedCollector::new(window_len),
            extended: HashSet::new(),
        }
    }

    fn reset(&mut self, codes: Vec<u8>) {
        self.collector.reset(codes.len());
        self.codes = codes;
        self.extended.clear();
    }
}

/// Runs the search for one read at a time. Owned by a single processor
/// thread; the index and acceptance model are shared read-only.
pub struct ReadSearcher<'a> {
    index: &'a dyn SeedIndex,
    model: &'a AcceptanceModel,
    extender: AlignmentExtender,
    seeding: SeedingParams,
    chaining: ChainingParams,
    mode: SearchMode,
    num_alignments: Option<usize>,
    forward_only: bool,
    strands: [StrandScratch; 2],
    state: SearchState,
    terminal: Option<SearchState>,
}

impl<'a> ReadSearcher<'a> {
    pub fn new(index: &'a dyn SeedIndex, model: &'a AcceptanceModel, opt: &FilterOpt) -> Self {
        let window_len = index.window_len();
        Self {
            index,
            model,
            extender: AlignmentExtender::new(&opt.extension_params()),
            seeding: opt.seeding_params(),
            chaining: opt.chaining_params(),
            mode: opt.mode,
            num_alignments: opt.num_alignments,
            forward_only: opt.forward_only,
            strands: [
                StrandScratch::new(Strand::Forward, window_len),
                StrandScratch::new(Strand::Reverse, window_len),
            ],
            state: SearchState::Pending,
            terminal: None,
        }
    }

    /// Current state; `Done` once a search has returned.
    pub fn state(&self) -> SearchState {
        self.state
    }

    /// `Accepted` or `Exhausted`: the state the last search passed through
    /// before `Done`. `None` before the first search.
    pub fn terminal_state(&self) -> Option<SearchState> {
        self.terminal
    }

    /// Search a read and its mate, if any.
    ///
    /// Fails when a mate is empty or malformed, or when extension hits a
    /// corrupted reference segment (read-scoped), or when the alignment store
    /// cannot grow (run-scoped).
    pub fn process(&mut self, read: Read) -> Result<ReadOutcome> {
        let (store, stats) = self.search(&read.id, &read.seq)?;
        let (mate_alignments, mate_stats) = match read.mate.as_deref() {
            Some(mate) => {
                let (store, stats) = self.search(&mate.id, &mate.seq)?;
                (Some(store.into_vec()), Some(stats))
            }
            None => (None, None),
        };

        Ok(ReadOutcome {
            read,
            alignments: store.into_vec(),
            stats,
            mate_alignments,
            mate_stats,
        })
    }

    /// Search one sequence.
    pub fn search(&mut self, id: &str, seq: &[u8]) -> Result<(AlignmentStore, ReadSearchStats)> {
        self.state = SearchState::Pending;
        self.terminal = None;
        let codes = encode_read(id, seq)?;
        let read_len = codes.len();

        let cap = match self.mode {
            SearchMode::BestHit => None,
            SearchMode::AllHits => self.num_alignments,
        };
        let mut store = AlignmentStore::new(cap);
        let mut stats = ReadSearchStats {
            min_score: self.model.min_score(read_len),
            ..Default::default()
        };

        let n_strands = if self.forward_only { 1 } else { 2 };
        let rc = if self.forward_only {
            Vec::new()
        } else {
            reverse_complement(&codes)
        };
        self.strands[0].reset(codes);
        self.strands[1].reset(rc);

        let intervals = self.seeding.skip_intervals.clone();
        'intervals: for (i, &skip) in intervals.iter().enumerate() {
            stats.intervals_tried += 1;
            for s in 0..n_strands {
                self.state = SearchState::Seeding(i);
                if self.search_strand(s, skip, &mut store, &mut stats)? {
                    break 'intervals;
                }
            }
            log::trace!(
                "{}: interval {} done, {} seeds, {} extensions",
                id,
                skip,
                stats.seeds_collected,
                stats.extensions_attempted
            );
        }

        stats.alignments_accepted = store.size();
        let (terminal, outcome) = if store.is_empty() {
            (SearchState::Exhausted, SearchOutcome::Exhausted)
        } else {
            (SearchState::Accepted, SearchOutcome::Accepted)
        };
        stats.outcome = outcome;
        self.terminal = Some(terminal);
        self.state = SearchState::Done;
        Ok((store, stats))
    }

    /// One seeding pass plus chaining and extension on one strand. Returns
    /// true when the search should stop.
    fn search_strand(
        &mut self,
        s: usize,
        skip: usize,
        store: &mut AlignmentStore,
        stats: &mut ReadSearchStats,
    ) -> Result<bool> {
        let index = self.index;
        let window_len = index.window_len();
        let scratch = &mut self.strands[s];
        let pass = scratch.collector.collect_pass(index, &scratch.codes, skip);
        stats.windows_queried += pass.windows_queried;
        stats.seeds_collected += pass.new_seeds;

        self.state = SearchState::ChainSearch;
        let read_len = scratch.codes.len();
        let chains: Vec<Chain> = scratch
            .collector
            .chainable(self.chaining.min_seed_hits)
            .flat_map(|(id, seeds)| candidate_chains(id, seeds, read_len, &self.chaining))
            .collect();
        stats.chains_built += chains.len();

        for chain in &chains {
            let Some(signature) = chain.signature() else {
                continue;
            };
            if !scratch.extended.insert(signature) {
                continue;
            }
            let reference = index.reference(chain.reference_id).ok_or(
                PipelineError::SegmentOutOfBounds {
                    reference_id: chain.reference_id,
                    begin: 0,
                    end: 0,
                    len: 0,
                },
            )?;
            // Seeds entirely inside an accepted alignment cannot yield a
            // distinct one
            if let (Some(first), Some(last)) = (chain.first(), chain.last()) {
                let begin = first.reference_offset as usize;
                let end = last.reference_offset as usize + window_len;
                if store.contains_span(chain.reference_id, scratch.strand, begin, end) {
                    continue;
                }
            }

            self.state = SearchState::Extending;
            stats.extensions_attempted += 1;
            let accepted = self.extender.extend(
                &scratch.codes,
                scratch.strand,
                reference,
                chain,
                stats.min_score,
            )?;

            if let Some(result) = accepted {
                if store.overlaps(
                    result.reference_id,
                    result.strand,
                    result.reference_begin,
                    result.reference_end,
                ) {
                    continue;
                }
                store.add(result)?;
                if self.mode == SearchMode::BestHit {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
