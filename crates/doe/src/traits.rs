use crate::errors::Result;
use crate::factor::FactorKind;
use linfa::Float;
use ndarray::Array2;

/// Sampling method allowing to generate a DoE in a given sample space
///
/// A sampling method is able to generate a set of samples in a given sample space.
/// where the sample space is defined by `[lower_bound_xi, upper_bound_xi]^nx`
/// within `R^nx` where `nx` is the dimension of the sample space: x = (x_i) with i in [1, nx].
/// The number of generated samples is a property of the method itself.
pub trait SamplingMethod<F: Float> {
    /// Returns the bounds of the sample space
    ///
    /// # Returns
    ///
    /// * A (nx, 2) matrix where the ith row is the interval of the ith components of a sample.
    fn sampling_space(&self) -> &Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples belonging to `[0., 1.]^nx`
    ///
    /// # Returns
    ///
    /// * A (ns, nx) matrix of samples where nx is the dimension of the sample space
    ///   each sample belongs to `[0., 1.]^nx` hypercube
    fn normalized_sample(&self) -> Result<Array2<F>>;

    /// Generates a (ns, nx)-shaped array of samples belonging to `[lower_bound_xi, upper_bound_xi]^nx`
    ///
    /// # Returns
    ///
    /// * A (ns, nx) matrix where nx is the dimension of the sample space.
    ///   each sample belongs to `[lower_bound_xi, upper_bound_xi]^nx` where bounds
    ///   are defined as returned values of `sampling_space` function.
    fn sample(&self) -> Result<Array2<F>> {
        let xlimits = self.sampling_space();
        let lower = xlimits.column(0);
        let scaler = &xlimits.column(1) - &lower;
        Ok(self.normalized_sample()? * scaler + lower)
    }
}

/// The configuration of the simulation model an experiment is written to
///
/// Implementors own a whole model configuration: `assign` overwrites the value
/// slot of every instance of the element named `label`, `persist` saves the
/// current configuration as experiment `index`.
pub trait Configuration {
    /// Overwrites the `kind.slot()` value of element `label`
    fn assign(&mut self, label: &str, kind: FactorKind, value: f64) -> Result<()>;

    /// Saves the current state of the configuration as experiment `index`
    fn persist(&mut self, index: usize) -> Result<()>;
}

/// A model configuration holding independent sibling branches under one root
pub trait BranchTree {
    /// Makes the tree hold exactly `count` sibling branches
    fn replicate(&mut self, count: usize) -> Result<()>;

    /// Overwrites the `kind.slot()` value of element `label` within the given branch
    fn assign(&mut self, branch: usize, label: &str, kind: FactorKind, value: f64) -> Result<()>;
}

/// Progress report and cooperative cancellation of long computations
pub trait Monitor {
    /// Called at a bounded cadence with `done` steps out of `total`, 0 when unknown
    fn progress(&mut self, _done: usize, _total: usize) {}

    /// Polled at the same cadence, returning true stops the computation
    fn should_stop(&self) -> bool {
        false
    }
}

/// A monitor which never stops anything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMonitor;

impl Monitor for NoMonitor {}

/// How a batch of experiments ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every experiment was processed
    Completed,
    /// A stop was requested, already produced experiments are valid
    Cancelled,
}

/// Outcome of a batch of experiments
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of experiments produced
    pub produced: usize,
    /// Index the next produced experiment would get
    pub next_index: usize,
    /// Whether the batch ran to completion
    pub status: BatchStatus,
}

impl BatchReport {
    /// Whether the batch was stopped before completion
    pub fn is_cancelled(&self) -> bool {
        self.status == BatchStatus::Cancelled
    }
}
