use crate::design::DesignTable;
use crate::errors::Result;
use crate::traits::{BatchReport, BatchStatus, Configuration, Monitor};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of experiments between two monitor polls
pub const WRITER_CADENCE: usize = 5;

/// Writes design tables and materializes one configuration per experiment
#[derive(Clone, Debug)]
pub struct DesignWriter {
    /// Directory receiving design tables
    output_dir: PathBuf,
    /// Base name of the design table files
    name: String,
    /// Number of experiments between two monitor polls
    cadence: usize,
}

impl DesignWriter {
    /// Constructor given the output directory and the base name of the produced files
    pub fn new<P: AsRef<Path>>(output_dir: P, name: &str) -> Self {
        DesignWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
            name: name.to_string(),
            cadence: WRITER_CADENCE,
        }
    }

    /// Sets the number of experiments between two monitor polls (at least 1)
    pub fn cadence(mut self, cadence: usize) -> Self {
        self.cadence = cadence.max(1);
        self
    }

    /// Path of the design table file: `<output_dir>/<name>_<first>_<last>.csv`
    pub fn table_path(&self, table: &DesignTable) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_{}.csv",
            self.name,
            table.start_index(),
            table.last_index()
        ))
    }

    /// Writes the factor labels then one line of values per experiment
    ///
    /// Values are written with the shortest representation giving back the same double.
    pub fn write_table(&self, table: &DesignTable) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.table_path(table);
        let mut wtr = csv::Writer::from_path(&path)?;
        wtr.write_record(table.labels())?;
        for row in table.values().rows() {
            wtr.write_record(row.iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        info!(
            "Design table of {} experiments written in {:?}",
            table.nrows(),
            path
        );
        Ok(path)
    }

    /// Pushes each experiment into `config` then persists it with its index
    ///
    /// Constant factors are assigned with every experiment. The monitor is polled
    /// every `cadence` experiments, a stop request ends the batch with a
    /// [BatchStatus::Cancelled] status, already persisted experiments being kept.
    ///
    /// # Errors
    ///
    /// Any assignment or persistence failure aborts the batch without retry.
    pub fn materialize<C: Configuration, M: Monitor>(
        &self,
        table: &DesignTable,
        config: &mut C,
        monitor: &mut M,
    ) -> Result<BatchReport> {
        let total = table.nrows();
        let first_index = table.start_index();
        let mut status = BatchStatus::Completed;
        let mut produced = 0;
        for (i, row) in table.values().rows().into_iter().enumerate() {
            if i % self.cadence == 0 {
                monitor.progress(i, total);
                if monitor.should_stop() {
                    info!("Configuration writing stopped after {i}/{total} experiments");
                    status = BatchStatus::Cancelled;
                    break;
                }
            }
            for c in table.constants() {
                config.assign(&c.label, c.kind, c.value)?;
            }
            for ((label, kind), &value) in table.labels().iter().zip(table.kinds()).zip(row) {
                config.assign(label, *kind, value)?;
            }
            let index = first_index + i;
            debug!("Persist experiment #{index}");
            config.persist(index)?;
            produced += 1;
        }
        if status == BatchStatus::Completed {
            monitor.progress(total, total);
        }
        Ok(BatchReport {
            produced,
            next_index: first_index + produced,
            status,
        })
    }

    /// Writes the design table then materializes its experiments
    pub fn emit<C: Configuration, M: Monitor>(
        &self,
        table: &DesignTable,
        config: &mut C,
        monitor: &mut M,
    ) -> Result<(PathBuf, BatchReport)> {
        let path = self.write_table(table)?;
        let report = self.materialize(table, config, monitor)?;
        Ok((path, report))
    }
}
