use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use psim_core::{Annotations, CurveSample, CurveSampler, SweepOptions};
use psim_runner::RunConfig;
use psim_schema::Metadata;
use serde::Serialize;

mod timeline;

#[derive(Debug, Parser)]
#[command(name = "psim")]
#[command(about = "Virtual-player timing simulator for lane charts", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sweep skill levels and write the difficulty curve as JSON.
    Curve {
        input: PathBuf,
        #[arg(long)]
        max_level: Option<f64>,
        #[arg(long)]
        step: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        parallel: bool,
    },
    /// Write the press/release stream of one skill level as JSON.
    Actions {
        input: PathBuf,
        #[arg(long)]
        level: f64,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a per-timestamp lane table of one skill level.
    Timeline {
        input: PathBuf,
        #[arg(long)]
        level: f64,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate a chart and print its event counts.
    Check { input: PathBuf },
}

#[derive(Debug, Serialize)]
struct CurveReport<'a> {
    meta: &'a Metadata,
    sweep: SweepOptions,
    annotations: Annotations,
    samples: &'a [CurveSample],
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let _ = env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .try_init();

    match cli.command {
        Command::Curve {
            input,
            max_level,
            step,
            config,
            output,
            parallel,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(max_level) = max_level {
                config.sweep.max_level = max_level;
            }
            if let Some(step) = step {
                config.sweep.step = step;
            }

            let (chart, model) = psim_runner::load_model_from_path(&input)?;
            let sampler = CurveSampler::new(&model, config.sweep, config.sim)
                .with_context(|| format!("simulation failed: {}", input.display()))?;
            let curve = if parallel {
                sampler.collect_parallel()
            } else {
                sampler.collect()
            }
            .with_context(|| format!("simulation failed: {}", input.display()))?;

            let report = CurveReport {
                meta: &chart.meta,
                sweep: curve.sweep,
                annotations: curve.annotations(),
                samples: &curve.samples,
            };
            let json = serde_json::to_string_pretty(&report).context("failed to serialize curve")?;
            write_output(output.as_deref(), &json)?;
        }
        Command::Actions {
            input,
            level,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let (_, model) = psim_runner::load_model_from_path(&input)?;
            let stream = psim_core::generate_actions(&model, level, config.sim)
                .with_context(|| format!("simulation failed: {}", input.display()))?;

            let json =
                serde_json::to_string_pretty(&stream).context("failed to serialize actions")?;
            write_output(output.as_deref(), &json)?;
        }
        Command::Timeline {
            input,
            level,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let (chart, model) = psim_runner::load_model_from_path(&input)?;
            timeline::print_timeline(&chart.meta, &model, level, config.sim)
                .with_context(|| format!("simulation failed: {}", input.display()))?;
        }
        Command::Check { input } => {
            let (chart, model) = psim_runner::load_model_from_path(&input)?;
            println!(
                "ok: {} - {} [{}]",
                chart.meta.artist, chart.meta.title, chart.meta.version
            );
            println!(
                "notes={} events={} channels={}",
                model.note_count(),
                model.len(),
                model.columns()
            );
            for channel in 0..model.columns() {
                println!(
                    "channel {channel}: {} events",
                    model.channel_events(channel).count()
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RunConfig> {
    match path {
        Some(path) => psim_runner::load_config_from_path(path),
        None => Ok(RunConfig::default()),
    }
}

fn write_output(path: Option<&Path>, json: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write: {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
