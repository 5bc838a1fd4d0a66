use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use expbox::{EXPBOX_LOG, FlagMonitor, Study, run};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Prepares the experiments of a simulation study
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Study file (JSON)
    study: PathBuf,

    /// Directory receiving produced files, overrides the study one
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Seed, overrides the study one
    #[arg(short, long)]
    seed: Option<u64>,

    /// Only write the design table, no configuration
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let env = Env::new().filter_or(EXPBOX_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();

    let args = Args::parse();
    let mut study = Study::from_file(&args.study)?;
    if let Some(output_dir) = args.output_dir {
        study = study.output_dir(output_dir);
    }
    if let Some(seed) = args.seed {
        study = study.seed(seed);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("cannot set Ctrl-C handler")?;

    let report = run(&study, args.dry_run, &mut FlagMonitor::new(stop))
        .with_context(|| format!("study {:?} failed", args.study))?;
    for file in report.files.iter() {
        info!("Written {file:?}");
    }
    if report.is_cancelled() {
        warn!(
            "Stopped: {} configurations written, next index {}",
            report.batch.produced, report.batch.next_index
        );
        std::process::exit(2);
    }
    info!("{} configurations written", report.batch.produced);
    Ok(())
}
