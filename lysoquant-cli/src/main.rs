//! lysoquant CLI - segment and quantify lysosomes in a TIFF hyperstack.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser};
use common::log_setup::setup_logging;
use lysoquant::{
    load_stack, ExternalCommand, PrecomputedLabels, ResultSink, Roi, RunConfig, Segmenter, Session,
};

#[derive(Debug, Parser)]
#[command(name = "lysoquant")]
#[command(about = "Count and measure segmented lysosomes in multichannel microscopy stacks")]
#[command(version)]
#[command(group(ArgGroup::new("segmenter").required(true).args(["labels", "segment_command"])))]
struct Cli {
    /// Raw multichannel TIFF stack.
    #[arg(long)]
    raw: PathBuf,

    /// Label TIFF produced beforehand by the segmentation job.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Program that segments the composite, called with
    /// `--parameters <p> --input <tiff> --output <tiff>`.
    #[arg(long)]
    segment_command: Option<PathBuf>,

    /// Extra leading argument for the segmentation program (repeatable).
    #[arg(long = "segment-arg", requires = "segment_command")]
    segment_args: Vec<String>,

    /// Directory for the composite and label files exchanged with the program.
    #[arg(long, default_value = "lysoquant_work")]
    work_dir: PathBuf,

    /// Run configuration (.yaml or .json); defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// ROI quantified on its own, `name:x,y,w,h` or `name:x1,y1,x2,y2,...` (repeatable).
    #[arg(long = "roi")]
    rois: Vec<Roi>,

    /// Selection that only crops the segmentation input, same syntax as --roi.
    #[arg(long, conflicts_with = "rois")]
    active_roi: Option<Roi>,

    /// Output directory for Results.csv and LysoQuant.csv.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Also write all records to results.json in the output directory.
    #[arg(long)]
    json: bool,

    /// Log specification, e.g. `info` or `lysoquant=debug`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _logger = setup_logging(&cli.log_level);

    let config = match &cli.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    let measurements = config.measurements.clone();
    let session = Session::new(config).context("Invalid run configuration")?;

    let mut raw = load_stack(&cli.raw, None)
        .with_context(|| format!("Failed to read raw image {}", cli.raw.display()))?;
    session.apply_calibration(&mut raw);

    let mut segmenter: Box<dyn Segmenter> = match (&cli.labels, &cli.segment_command) {
        (Some(path), _) => Box::new(
            PrecomputedLabels::from_file(path)
                .with_context(|| format!("Failed to read labels {}", path.display()))?,
        ),
        (None, Some(program)) => Box::new(
            ExternalCommand::new(program, &cli.work_dir).with_args(cli.segment_args.clone()),
        ),
        (None, None) => bail!("either --labels or --segment-command is required"),
    };

    let mut sink = ResultSink::open(measurements);
    let summary = session
        .run(
            &raw,
            &cli.rois,
            cli.active_roi.as_ref(),
            segmenter.as_mut(),
            &mut sink,
        )
        .with_context(|| format!("LysoQuant failed on {}", raw.title()))?;
    sink.close();

    let written = sink
        .write_tables(&cli.out)
        .with_context(|| format!("Failed to write results to {}", cli.out.display()))?;
    if cli.json {
        let path = cli.out.join("results.json");
        std::fs::write(&path, sink.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {}", path.display());
    }

    log::info!(
        "{}: {} objects in {} pass(es), tables {:?}",
        summary.labels.title(),
        summary.stats.objects,
        summary.passes,
        written
    );

    Ok(())
}
