// src/pipelines/linear/filter.rs
//
// Entry point of the `filter` command: load references, build the index,
// open inputs and outputs, run the pipeline.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::core::io::read_source::FastxSource;
use crate::core::io::report::{FastxReportWriter, MultiWriter, PairedLayout, SamWriter, TabularWriter};
use crate::pipelines::linear::filter_opt::{FilterCliOptions, FilterOpt};
use crate::pipelines::linear::index::{KmerIndex, ReferenceSet, SeedIndex};
use crate::pipelines::linear::orchestrator::{FilterPipeline, PipelineStatistics};

pub fn main_filter(cli: &FilterCliOptions, opt: FilterOpt) -> Result<PipelineStatistics> {
    let start = Instant::now();
    let refs = ReferenceSet::from_fasta_files(cli.references.as_slice()).context("Error loading references")?;
    log::info!(
        "Loaded {} reference sequences ({} bases)",
        refs.len(),
        refs.total_length()
    );

    let index = KmerIndex::build(refs, opt.window_len).context("Error building L-mer index")?;
    log::info!(
        "Indexed {} distinct {}-mers in {:.2}s",
        index.num_distinct(),
        opt.window_len,
        start.elapsed().as_secs_f64()
    );
    let references: Vec<(String, usize)> = index
        .references()
        .iter()
        .map(|(id, seq)| (index.reference_name(id).unwrap_or_default().to_string(), seq.len()))
        .collect();
    let reference_names: Vec<String> = references.iter().map(|(name, _)| name.clone()).collect();

    let source = FastxSource::open(cli.reads.as_slice()).context("Error opening read files")?;
    let layout = if source.is_paired() {
        log::info!("Paired input, mates routed with policy {:?}", cli.paired);
        cli.paired_layout()
    } else {
        if cli.out2 || cli.sout {
            log::warn!("--out2 and --sout only apply to paired input; ignored");
        }
        PairedLayout::default()
    };

    let pipeline = FilterPipeline::new(opt, Arc::new(index))?;

    let mut writer = MultiWriter::new();
    writer.push(Box::new(
        FastxReportWriter::with_layout(&cli.aligned, cli.other.as_deref(), cli.paired, layout)
            .with_context(|| format!("Error creating output file {}", cli.aligned.display()))?,
    ));
    if let Some(path) = &cli.blast {
        writer.push(Box::new(
            TabularWriter::create(path, reference_names, *pipeline.model())
                .with_context(|| format!("Error creating report file {}", path.display()))?,
        ));
    }

    if let Some(path) = &cli.sam {
        writer.push(Box::new(
            SamWriter::create(path, &references, cli.sam_sq, cli.sam_unaligned)
                .with_context(|| format!("Error creating SAM file {}", path.display()))?,
        ));
    }

    let stats = pipeline.run(source, 0, &mut writer).context("Filtering failed")?;

    log::debug!(
        "{} seeds, {} extensions, {} alignments, {} queue push retries",
        stats.seeds,
        stats.extensions,
        stats.alignments,
        stats.push_retries
    );
    Ok(stats)
}
