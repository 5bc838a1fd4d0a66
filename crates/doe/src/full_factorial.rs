use crate::errors::{DoeError, Result};
use crate::factor::{Factor, SensitivityList};
use crate::traits::{BatchReport, BatchStatus, BranchTree, Configuration, Monitor};
use log::{debug, info};
use ndarray::{Array1, Array2, s};
use ndarray_rand::rand::Rng;
use std::ops::ControlFlow;

/// The full factorial enumeration goes through all combinations of the declared
/// values of a list of factors.
///
/// Combinations are visited depth-first following the list order: the first
/// factor varies the slowest, the last one the fastest. An empty list has
/// exactly one (empty) combination.
pub struct FullFactorial<'a> {
    /// Factors with their declared values
    factors: &'a SensitivityList,
}

impl<'a> FullFactorial<'a> {
    /// Constructor given the list of factors to enumerate
    ///
    /// ```
    /// use expbox_doe::{Factor, FullFactorial, SensitivityList};
    ///
    /// let factors = SensitivityList::new(vec![
    ///     Factor::parameter("a", vec![1., 2.]),
    ///     Factor::parameter("b", vec![10., 20., 30.]),
    /// ]).unwrap();
    /// assert_eq!(FullFactorial::new(&factors).combinations(), Some(6));
    /// ```
    pub fn new(factors: &'a SensitivityList) -> Self {
        FullFactorial { factors }
    }

    /// Number of combinations, i.e. number of leaves of the enumeration,
    /// `None` when too many to be counted
    pub fn combinations(&self) -> Option<usize> {
        self.factors.space_size()
    }

    /// Visits every combination, `visit` receives the value index of each factor
    ///
    /// The enumeration stops as soon as `visit` fails or breaks.
    pub fn for_each<V>(&self, mut visit: V) -> Result<ControlFlow<()>>
    where
        V: FnMut(&[usize]) -> Result<ControlFlow<()>>,
    {
        let mut cursor = vec![0; self.factors.len()];
        self.descend(0, &mut cursor, &mut visit)
    }

    fn descend<V>(
        &self,
        depth: usize,
        cursor: &mut [usize],
        visit: &mut V,
    ) -> Result<ControlFlow<()>>
    where
        V: FnMut(&[usize]) -> Result<ControlFlow<()>>,
    {
        if depth == cursor.len() {
            return visit(&cursor[..]);
        }
        for i in 0..self.factors.factors()[depth].values().len() {
            cursor[depth] = i;
            if self.descend(depth + 1, cursor, visit)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn selected<'b>(&'b self, cursor: &'b [usize]) -> impl Iterator<Item = (&'b Factor, f64)> {
        self.factors
            .factors()
            .iter()
            .zip(cursor)
            .map(|(f, &i)| (f, f.values()[i]))
    }

    /// Parallel sensitivity: each combination is written in its own sibling branch
    ///
    /// The tree is first replicated to hold one branch per combination, then
    /// branches are filled in enumeration order.
    ///
    /// # Returns
    ///
    /// * the number of branches written
    ///
    /// # Errors
    ///
    /// * [DoeError::InvalidConfig] when the combinations cannot be counted
    pub fn parallel<T: BranchTree>(&self, tree: &mut T) -> Result<usize> {
        let count = self.combinations().ok_or_else(|| {
            DoeError::InvalidConfig("too many combinations to replicate the model".to_string())
        })?;
        info!("Replicate model in {count} branches for parallel sensitivity");
        tree.replicate(count)?;
        let mut branch = 0;
        let flow = self.for_each(|cursor| {
            for (f, value) in self.selected(cursor) {
                tree.assign(branch, f.label(), f.kind(), value)?;
            }
            branch += 1;
            Ok(ControlFlow::Continue(()))
        })?;
        debug_assert!(flow.is_continue());
        Ok(branch)
    }

    /// Sequential sensitivity: each combination is written in the same configuration
    /// which is then persisted as a standalone experiment.
    ///
    /// Each combination is persisted with the given `probability`, allowing a Monte Carlo
    /// sampling of spaces too large to be enumerated. Persisted experiments are numbered
    /// from `first_index`. The `monitor` is polled once per combination, its total
    /// being 0 when the combinations cannot be counted.
    ///
    /// # Errors
    ///
    /// * [DoeError::InvalidConfig] when `probability` is not within `(0, 1]`
    /// * any persistence failure aborts the enumeration, already persisted experiments are kept
    pub fn sequential<C: Configuration, R: Rng, M: Monitor>(
        &self,
        config: &mut C,
        probability: f64,
        first_index: usize,
        rng: &mut R,
        monitor: &mut M,
    ) -> Result<BatchReport> {
        if !(probability > 0. && probability <= 1.) {
            return Err(DoeError::InvalidConfig(format!(
                "sampling probability should be in (0, 1], got {probability}"
            )));
        }
        let total = self.combinations();
        match total {
            Some(total) => {
                info!("Enumerate {total} combinations with sampling probability {probability}")
            }
            None => info!(
                "Enumerate more than {} combinations with sampling probability {probability}",
                usize::MAX
            ),
        }
        let known = total.unwrap_or(0);
        let mut visited = 0;
        let mut index = first_index;
        let flow = self.for_each(|cursor| {
            if monitor.should_stop() {
                return Ok(ControlFlow::Break(()));
            }
            for (f, value) in self.selected(cursor) {
                config.assign(f.label(), f.kind(), value)?;
            }
            if rng.gen::<f64>() <= probability {
                debug!("Persist combination {cursor:?} as #{index}");
                config.persist(index)?;
                index += 1;
            }
            visited += 1;
            monitor.progress(visited, known);
            Ok(ControlFlow::Continue(()))
        })?;
        let status = if flow.is_break() {
            info!("Sequential sensitivity stopped after {visited} combinations");
            BatchStatus::Cancelled
        } else {
            BatchStatus::Completed
        };
        Ok(BatchReport {
            produced: index - first_index,
            next_index: index,
            status,
        })
    }

    /// The (n, k) matrix of all combinations of the active factors values
    ///
    /// Factors held constant are left out, rows follow the enumeration order.
    ///
    /// # Errors
    ///
    /// * [DoeError::InvalidConfig] when the combinations cannot be counted
    pub fn table(&self) -> Result<Array2<f64>> {
        let active: Vec<&Factor> = self.factors.active().collect();
        let nx = active.len();
        let nrows = active
            .iter()
            .try_fold(1usize, |n, f| n.checked_mul(f.values().len()))
            .ok_or_else(|| {
                DoeError::InvalidConfig(format!("too many combinations of {nx} factors"))
            })?;
        let mut doe = Array2::<f64>::zeros((nrows, nx));

        let mut level_repeat = nrows;
        let mut range_repeat = 1;
        for (j, f) in active.iter().enumerate() {
            let n = f.values().len();
            level_repeat /= n;
            let mut chunk = Array1::zeros(level_repeat * n);
            for (i, &fill) in f.values().iter().enumerate() {
                chunk
                    .slice_mut(s![i * level_repeat..(i + 1) * level_repeat])
                    .fill(fill);
            }
            for k in 0..range_repeat {
                doe.slice_mut(s![n * level_repeat * k..n * level_repeat * (k + 1), j])
                    .assign(&chunk);
            }
            range_repeat *= n;
        }
        Ok(doe)
    }
}
