/*!
`expbox` prepares the experiments of a simulation study from a study file.

The study file declares the factors under study and the sampling method, see [Study].
Depending on the method, `expbox`
* writes every combination of the factors values in the branches of one configuration (`parallel`),
* persists one configuration per combination, possibly sub-sampled (`sequential`),
* or builds a design table (`factorial`, `nolh`, `random`, `morris`), writes it as a CSV file
  then persists one configuration per experiment.

Configurations are JSON files written by [JsonConfig] and [JsonTree], sampling is
provided by the [expbox_doe] crate.
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod model;
mod study;

pub use model::*;
pub use study::*;

use anyhow::{Context, Result};
use expbox_doe::{
    BatchReport, BatchStatus, DesignMethod, DesignWriter, FullFactorial, Monitor, NolhRegistry,
    SensitivityList,
};
use log::info;
use rand_xoshiro::Xoshiro256Plus;
use rand_xoshiro::rand_core::SeedableRng;
use std::path::PathBuf;

pub use expbox_doe::EXPBOX_LOG;

/// Outcome of a study run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Produced configurations (or branches)
    pub batch: BatchReport,
    /// Files summarizing the run: design table, sensitivity summary or branches file
    pub files: Vec<PathBuf>,
}

impl RunReport {
    /// Whether the run was stopped before completion
    pub fn is_cancelled(&self) -> bool {
        self.batch.is_cancelled()
    }
}

/// Runs the study, `dry_run` only writing the design table without any configuration
///
/// Enumeration methods write a summary of the explored values beside their configurations,
/// their dry run writes the full factorial design table.
pub fn run(study: &Study, dry_run: bool, monitor: &mut impl Monitor) -> Result<RunReport> {
    let factors = study.sensitivity()?;
    let dir = &study.output_dir;
    info!(
        "Study '{}': {} factors ({} varying)",
        study.name,
        factors.len(),
        factors.dimension()
    );
    let config = || {
        JsonConfig::new(study.base.clone(), dir, &study.name)
            .seed(study.seed, study.first_index)
            .runs_per_config(study.runs_per_config)
    };

    match (&study.method, dry_run) {
        (Method::Parallel, false) => {
            let summary = write_summary(study, &factors)?;
            let mut tree = JsonTree::new(study.base.clone());
            let produced = FullFactorial::new(&factors).parallel(&mut tree)?;
            let path = dir.join(format!("{}_parallel.json", study.name));
            tree.save(&path)?;
            Ok(RunReport {
                batch: BatchReport {
                    produced,
                    next_index: study.first_index,
                    status: BatchStatus::Completed,
                },
                files: vec![summary, path],
            })
        }
        (Method::Sequential { probability }, false) => {
            let summary = write_summary(study, &factors)?;
            let mut rng = Xoshiro256Plus::seed_from_u64(study.seed);
            let batch = FullFactorial::new(&factors).sequential(
                &mut config(),
                *probability,
                study.first_index,
                &mut rng,
                monitor,
            )?;
            Ok(RunReport {
                batch,
                files: vec![summary],
            })
        }
        _ => {
            let method = study.design_method().unwrap_or(DesignMethod::Factorial);
            let mut registry = NolhRegistry::new();
            let table = match method.generate(
                &factors,
                &mut registry,
                study.nolh_table.as_deref(),
                monitor,
            ) {
                Ok(table) => table.first_index(study.first_index),
                Err(e) if e.is_cancellation() => {
                    info!("{} design computation stopped", method.name());
                    return Ok(RunReport {
                        batch: BatchReport {
                            produced: 0,
                            next_index: study.first_index,
                            status: BatchStatus::Cancelled,
                        },
                        files: vec![],
                    });
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("cannot generate {} design", method.name()))
                }
            };
            let writer = DesignWriter::new(dir, &study.name);
            if dry_run {
                let path = writer.write_table(&table)?;
                return Ok(RunReport {
                    batch: BatchReport {
                        produced: 0,
                        next_index: study.first_index,
                        status: BatchStatus::Completed,
                    },
                    files: vec![path],
                });
            }
            let (path, batch) = writer.emit(&table, &mut config(), monitor)?;
            Ok(RunReport {
                batch,
                files: vec![path],
            })
        }
    }
}

fn write_summary(study: &Study, factors: &SensitivityList) -> Result<PathBuf> {
    std::fs::create_dir_all(&study.output_dir)?;
    let path = study.output_dir.join(format!("{}_sens.txt", study.name));
    factors.write_summary(&path)?;
    Ok(path)
}
