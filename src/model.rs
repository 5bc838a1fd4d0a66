//! File-backed model configurations and the interruptible progress monitor
use expbox_doe::{BranchTree, Configuration, DoeError, FactorKind, Monitor, Result};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Values of model elements by label, each element holding its value slots
/// (slot 0 for parameters, slot `lag` for lagged variables)
pub type Values = BTreeMap<String, Vec<f64>>;

fn set_slot(values: &mut Values, label: &str, kind: FactorKind, value: f64) {
    let slots = values.entry(label.to_string()).or_default();
    let slot = kind.slot();
    if slots.len() <= slot {
        slots.resize(slot + 1, 0.);
    }
    slots[slot] = value;
}

#[derive(Serialize)]
struct Experiment<'a> {
    index: usize,
    seed: u64,
    values: &'a Values,
}

/// A model configuration persisted as one JSON file per experiment:
/// `<output_dir>/<name>_<index>.json`
///
/// Each configuration records the seed of its first run, successive configurations
/// getting disjoint seed ranges of `runs_per_config` seeds.
#[derive(Clone, Debug)]
pub struct JsonConfig {
    values: Values,
    output_dir: PathBuf,
    name: String,
    seed: u64,
    first_index: usize,
    runs_per_config: usize,
}

impl JsonConfig {
    /// Constructor given the initial values of the model elements
    pub fn new<P: AsRef<Path>>(values: Values, output_dir: P, name: &str) -> Self {
        JsonConfig {
            values,
            output_dir: output_dir.as_ref().to_path_buf(),
            name: name.to_string(),
            seed: 0,
            first_index: 1,
            runs_per_config: 1,
        }
    }

    /// Set the seed of the first configuration and the index it is persisted with
    pub fn seed(mut self, seed: u64, first_index: usize) -> Self {
        self.seed = seed;
        self.first_index = first_index;
        self
    }

    /// Set the number of runs of each configuration
    pub fn runs_per_config(mut self, runs_per_config: usize) -> Self {
        self.runs_per_config = runs_per_config;
        self
    }

    /// Current values
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Seed of the first run of configuration `index`
    pub fn run_seed(&self, index: usize) -> u64 {
        let offset = index.saturating_sub(self.first_index) * self.runs_per_config;
        self.seed + offset as u64
    }

    /// Path of configuration `index`
    pub fn path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("{}_{index}.json", self.name))
    }

    fn save(&self, index: usize) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.path(index);
        let experiment = Experiment {
            index,
            seed: self.run_seed(index),
            values: &self.values,
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &experiment)?;
        Ok(path)
    }
}

impl Configuration for JsonConfig {
    fn assign(&mut self, label: &str, kind: FactorKind, value: f64) -> Result<()> {
        set_slot(&mut self.values, label, kind, value);
        Ok(())
    }

    fn persist(&mut self, index: usize) -> Result<()> {
        let path = self.save(index).map_err(|e| DoeError::Persist {
            index,
            reason: e.to_string(),
        })?;
        debug!("Configuration #{index} saved in {path:?}");
        Ok(())
    }
}

/// A model configuration holding sibling branches, saved as a single JSON file
#[derive(Clone, Debug, Default, Serialize)]
pub struct JsonTree {
    #[serde(skip)]
    base: Values,
    branches: Vec<Values>,
}

impl JsonTree {
    /// Constructor given the values every branch starts from
    pub fn new(base: Values) -> Self {
        JsonTree {
            base,
            branches: vec![],
        }
    }

    /// Branches values
    pub fn branches(&self) -> &[Values] {
        &self.branches
    }

    /// Writes every branch in the given file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), self).map_err(
            |e| DoeError::Persist {
                index: 0,
                reason: e.to_string(),
            },
        )?;
        info!("{} branches saved in {path:?}", self.branches.len());
        Ok(())
    }
}

impl BranchTree for JsonTree {
    fn replicate(&mut self, count: usize) -> Result<()> {
        self.branches = vec![self.base.clone(); count];
        Ok(())
    }

    fn assign(&mut self, branch: usize, label: &str, kind: FactorKind, value: f64) -> Result<()> {
        let count = self.branches.len();
        let values = self.branches.get_mut(branch).ok_or_else(|| {
            DoeError::InvalidConfig(format!("branch {branch} out of {count} branches"))
        })?;
        set_slot(values, label, kind, value);
        Ok(())
    }
}

/// Steps between two progress logs when the total is unknown
const UNKNOWN_TOTAL_STEP: usize = 100_000;

/// A monitor logging progress by steps of 10% and stopping once its flag is raised
#[derive(Clone, Debug, Default)]
pub struct FlagMonitor {
    stop: Arc<AtomicBool>,
    reported: usize,
}

impl FlagMonitor {
    /// Constructor given the stop flag, typically raised by a Ctrl-C handler
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        FlagMonitor { stop, reported: 0 }
    }
}

impl Monitor for FlagMonitor {
    fn progress(&mut self, done: usize, total: usize) {
        if total == 0 {
            if done % UNKNOWN_TOTAL_STEP == 0 {
                info!("Progress {done}");
            }
            return;
        }
        let decile = 10 * done / total;
        if decile > self.reported || done == 0 {
            self.reported = decile;
            info!("Progress {done}/{total}");
        }
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}
