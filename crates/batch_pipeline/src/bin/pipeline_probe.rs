//! Runs a pipeline from a JSON config and reports throughput.
//!
//! ```text
//! pipeline-probe <config.json> [--batches N]
//! ```
//!
//! Pulls `N` batches (one epoch by default), logging each batch's tags.
//! Set `RUST_LOG=debug` to see stage lifecycle events.

use anyhow::{bail, Context, Result};
use batch_pipeline::{Pipeline, PipelineConfig};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

struct Args {
    config: PathBuf,
    batches: Option<usize>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    let mut batches = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--batches" => {
                let value = args.next().context("--batches needs a value")?;
                batches = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid --batches value: {}", value))?,
                );
            }
            _ if config.is_none() => config = Some(PathBuf::from(arg)),
            other => bail!("unexpected argument: {}", other),
        }
    }

    let Some(config) = config else {
        bail!("usage: pipeline-probe <config.json> [--batches N]");
    };
    Ok(Args { config, batches })
}

fn run(args: Args) -> Result<()> {
    let config = PipelineConfig::from_json_file(&args.config)?;
    let pipeline = Pipeline::new(config)?;
    let batches = args.batches.unwrap_or_else(|| pipeline.num_batches());
    let (rows, _) = pipeline.data_dims();
    info!(
        "{} classes, {} batches per epoch, {} features per sample",
        pipeline.num_classes(),
        pipeline.num_batches(),
        rows
    );

    pipeline.start()?;
    let started = Instant::now();
    let mut samples = 0;
    for _ in 0..batches {
        let batch = match pipeline.get_next_batch() {
            Ok(batch) => batch,
            Err(e) => {
                if let Err(stop_err) = pipeline.stop() {
                    warn!("Pipeline stopped with a further error: {:#}", stop_err);
                }
                return Err(e);
            }
        };
        samples += batch.batch_size();
        info!(
            "epoch {} batch {} ({} samples)",
            batch.epoch_index,
            batch.batch_index,
            batch.batch_size()
        );
    }
    let elapsed = started.elapsed();
    pipeline.stop()?;

    info!(
        "{} batches ({} samples) in {:.2?}: {:.1} samples/s",
        batches,
        samples,
        elapsed,
        samples as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    match parse_args().and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
