//! Morris Elementary Effects design
//!
//! A pool of one-factor-at-a-time trajectories is drawn in the unit hypercube,
//! then the `r` trajectories spreading the most are kept using the local
//! optimisation heuristic of Ruano et al. (2012), a polynomial approximation
//! of the maximal `r`-subset distance problem of Campolongo et al. (2007).
use crate::combinatorics::{best_candidate, sum_pairwise, top_k};
use crate::errors::{DoeError, Result};
use crate::traits::{Monitor, NoMonitor, SamplingMethod};
use crate::utils::{insert_row_block, row_block, sum_cdist};
use linfa::{Float, ParamGuard};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_xoshiro::Xoshiro256Plus;

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Default number of grid levels
pub const MORRIS_LEVELS: usize = 4;
/// Default jump in number of levels
pub const MORRIS_JUMP: usize = 2;
/// Default number of generated trajectories
pub const MORRIS_POOL_SIZE: usize = 20;
/// Default number of kept trajectories
pub const MORRIS_TRAJECTORIES: usize = 4;

/// Validated Morris design parameters
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct MorrisValidParams {
    /// Number of levels `p` of the grid discretizing each factor range
    pub(crate) levels: usize,
    /// Step size in number of levels, `delta = jump / (p - 1)`
    pub(crate) jump: usize,
    /// Number of trajectories generated before selection
    pub(crate) pool_size: usize,
    /// Number of trajectories kept
    pub(crate) trajectories: usize,
    /// Seed the random generator is reset to before generating the pool
    pub(crate) seed: u64,
}

impl Default for MorrisValidParams {
    fn default() -> Self {
        MorrisValidParams {
            levels: MORRIS_LEVELS,
            jump: MORRIS_JUMP,
            pool_size: MORRIS_POOL_SIZE,
            trajectories: MORRIS_TRAJECTORIES,
            seed: 0,
        }
    }
}

impl MorrisValidParams {
    /// Get the number of grid levels
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Get the jump in number of levels
    pub fn jump(&self) -> usize {
        self.jump
    }

    /// Get the number of generated trajectories
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of kept trajectories
    pub fn trajectories(&self) -> usize {
        self.trajectories
    }

    /// Get the seed
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Step size in the unit hypercube
    pub fn delta<F: Float>(&self) -> F {
        F::cast(self.jump) / F::cast(self.levels - 1)
    }
}

/// The set of parameters of the [Morris design](Morris)
#[derive(Clone, Debug, Default)]
pub struct MorrisParams(MorrisValidParams);

impl MorrisParams {
    /// Parameters with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of grid levels `p`
    pub fn levels(mut self, levels: usize) -> Self {
        self.0.levels = levels;
        self
    }

    /// Set the jump in number of levels, should be in `[1, p - 1]`
    pub fn jump(mut self, jump: usize) -> Self {
        self.0.jump = jump;
        self
    }

    /// Set the number of generated trajectories
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.0.pool_size = pool_size;
        self
    }

    /// Set the number of kept trajectories.
    /// When greater or equal to the pool size, the whole pool is kept as is.
    pub fn trajectories(mut self, trajectories: usize) -> Self {
        self.0.trajectories = trajectories;
        self
    }

    /// Set the seed the random generator is reset to
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }
}

impl From<MorrisValidParams> for MorrisParams {
    fn from(valid: MorrisValidParams) -> Self {
        MorrisParams(valid)
    }
}

impl ParamGuard for MorrisParams {
    type Checked = MorrisValidParams;
    type Error = DoeError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let p = &self.0;
        if p.levels < 2 {
            return Err(DoeError::InvalidConfig(format!(
                "Morris design needs at least 2 levels, got {}",
                p.levels
            )));
        }
        if p.jump < 1 || p.jump > p.levels - 1 {
            return Err(DoeError::InvalidConfig(format!(
                "Morris jump should be in [1, {}], got {}",
                p.levels - 1,
                p.jump
            )));
        }
        if p.pool_size < 1 {
            return Err(DoeError::InvalidConfig(
                "Morris design needs at least one generated trajectory".to_string(),
            ));
        }
        if p.trajectories < 1 {
            return Err(DoeError::InvalidConfig(
                "Morris design needs at least one kept trajectory".to_string(),
            ));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Generates `pool_size` trajectories of `k + 1` points stacked in a `(pool_size * (k + 1), k)` matrix
///
/// Each trajectory is `(B.P.D + J) * delta / 2 + base` where `B` is the `(k + 1, k)` orientation
/// matrix (-1 on and above the diagonal, 1 below), `P` a random permutation matrix, `D` a random
/// diagonal matrix of directions (+/-1), `J` the matrix of ones and `base` a random point of the
/// `p`-level grid such that `base + delta` stays in the unit hypercube.
pub fn trajectory_pool<F: Float, R: Rng>(
    params: &MorrisValidParams,
    k: usize,
    rng: &mut R,
) -> Array2<F> {
    let p = params.levels;
    let half_delta = params.delta::<F>() / F::cast(2.);
    let orientation = Array2::from_shape_fn((k + 1, k), |(i, j)| {
        if i > j {
            F::one()
        } else {
            -F::one()
        }
    });
    let n_offsets = p - params.jump;

    let mut pool = Array2::zeros((params.pool_size * (k + 1), k));
    let mut order: Vec<usize> = (0..k).collect();
    for m in 0..params.pool_size {
        order.shuffle(rng);
        let mut permutation = Array2::<F>::zeros((k, k));
        for (j, &o) in order.iter().enumerate() {
            permutation[[o, j]] = F::one();
        }
        let directions = Array1::from_shape_fn(k, |_| {
            if rng.gen_bool(0.5) {
                F::one()
            } else {
                -F::one()
            }
        });
        let base = Array1::from_shape_fn(k, |_| {
            F::cast(rng.gen_range(0..n_offsets)) / F::cast(p - 1)
        });
        let walk = orientation
            .dot(&permutation)
            .dot(&Array2::from_diag(&directions));
        let trajectory = (walk + F::one()) * half_delta + &base;
        insert_row_block(&mut pool, m, &trajectory);
    }
    pool
}

/// Symmetric matrix of the distances between trajectories of `k + 1` points
///
/// The distance between two trajectories is the sum of the Euclidean distances between
/// every point of the first one and every point of the second one.
/// The monitor is consulted once per row, a stop request gives [DoeError::Cancelled].
pub fn trajectory_distances<F: Float>(
    pool: &Array2<F>,
    k: usize,
    monitor: &mut impl Monitor,
) -> Result<Array2<F>> {
    let size = k + 1;
    let m = pool.nrows() / size;
    let mut distances = Array2::zeros((m, m));
    for i in 0..m {
        if monitor.should_stop() {
            return Err(DoeError::Cancelled);
        }
        monitor.progress(i, m);
        for j in (i + 1)..m {
            let d = sum_cdist(&row_block(pool, i, size), &row_block(pool, j, size));
            distances[[i, j]] = d;
            distances[[j, i]] = d;
        }
    }
    monitor.progress(m, m);
    Ok(distances)
}

/// Greedily grows `set` one trajectory at a time until it holds `r` trajectories,
/// each time adding the trajectory maximizing the total pairwise distance.
/// Trajectories are returned in insertion order.
fn extend_selection<F: Float>(mut set: Vec<usize>, r: usize, distances: &Array2<F>) -> Vec<usize> {
    let m = distances.nrows();
    while set.len() < r {
        let candidates: Vec<Vec<usize>> = (0..m)
            .filter(|j| !set.contains(j))
            .map(|j| {
                let mut extended = set.clone();
                extended.push(j);
                extended
            })
            .collect();
        match best_candidate(candidates, distances) {
            Some((extended, _)) => set = extended,
            None => break,
        }
    }
    set
}

/// Indices of `r` trajectories, sorted by increasing index, with a large total pairwise distance
///
/// For each seed size `i` in `[1, r - 1]`, every trajectory is paired with its `i` farthest
/// trajectories, the best scoring group is then extended one trajectory at a time up to `r`
/// trajectories. The best extended group over all seed sizes is returned.
/// Ties are resolved in favor of the lowest index (or smallest seed size).
/// When `r` is greater or equal to the number of trajectories, all of them are returned.
pub fn select_trajectories<F: Float>(distances: &Array2<F>, r: usize) -> Vec<usize> {
    let m = distances.nrows();
    if r >= m {
        return (0..m).collect();
    }
    let mut best: Option<(Vec<usize>, F)> = None;
    for i in 1..r {
        let seeds: Vec<Vec<usize>> = distances
            .rows()
            .into_iter()
            .enumerate()
            .map(|(row, d)| {
                let mut seed = top_k(&d, i, row);
                seed.push(row);
                seed
            })
            .collect();
        let Some((seed, _)) = best_candidate(seeds, distances) else {
            continue;
        };
        let set = extend_selection(seed, r, distances);
        let score = sum_pairwise(&set, distances);
        debug!("Seed size {i}: score {score}");
        if best.as_ref().map_or(true, |(_, s)| score > *s) {
            best = Some((set, score));
        }
    }
    // a single trajectory always scores 0
    let mut selected = best.map_or_else(|| vec![0], |(set, _)| set);
    selected.sort_unstable();
    selected
}

/// The Morris design generates trajectories suited to the Elementary Effects
/// sensitivity analysis: `trajectories * (k + 1)` points, each trajectory
/// changing one factor at a time.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Morris<F: Float> {
    /// Sampling space definition as a (nx, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of xi, the ith component of x
    xlimits: Array2<F>,
    /// Design parameters
    params: MorrisValidParams,
}

impl<F: Float> Morris<F> {
    /// Default parameters to be customized then checked
    pub fn params() -> MorrisParams {
        MorrisParams::new()
    }

    /// Constructor given a design space as a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    /// and checked parameters
    ///
    /// ```
    /// use expbox_doe::{Morris, SamplingMethod};
    /// use linfa::ParamGuard;
    /// use ndarray::arr2;
    ///
    /// let params = Morris::<f64>::params().pool_size(10).trajectories(3).check().unwrap();
    /// let doe = Morris::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]), &params)
    ///     .unwrap()
    ///     .sample()
    ///     .unwrap();
    /// assert_eq!(doe.nrows(), 3 * 3);
    /// ```
    ///
    /// # Errors
    ///
    /// * [DoeError::InvalidConfig] when xlimits has not 2 columns or no row
    pub fn new(
        xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>,
        params: &MorrisValidParams,
    ) -> Result<Self> {
        if xlimits.ncols() != 2 {
            return Err(DoeError::InvalidConfig(
                "xlimits must have 2 columns (lower, upper)".to_string(),
            ));
        }
        if xlimits.nrows() == 0 {
            return Err(DoeError::InvalidConfig(
                "Morris design needs at least one factor".to_string(),
            ));
        }
        Ok(Morris {
            xlimits: xlimits.to_owned(),
            params: params.clone(),
        })
    }

    /// Generates the design in the unit hypercube, reporting the progress of
    /// the distance computation to the given monitor which can stop it.
    pub fn normalized_sample_with(&self, monitor: &mut impl Monitor) -> Result<Array2<F>> {
        let k = self.xlimits.nrows();
        let mut rng = Xoshiro256Plus::seed_from_u64(self.params.seed);
        let pool = trajectory_pool(&self.params, k, &mut rng);
        info!(
            "Morris pool of {} trajectories generated ({} levels, jump {})",
            self.params.pool_size, self.params.levels, self.params.jump
        );
        if self.params.trajectories >= self.params.pool_size {
            info!("Whole pool kept, no trajectory selection");
            return Ok(pool);
        }

        let distances = trajectory_distances(&pool, k, monitor)?;
        let selected = select_trajectories(&distances, self.params.trajectories);
        info!("Selected trajectories {selected:?}");
        let mut doe = Array2::zeros((selected.len() * (k + 1), k));
        for (i, &t) in selected.iter().enumerate() {
            insert_row_block(&mut doe, i, &row_block(&pool, t, k + 1));
        }
        Ok(doe)
    }
}

impl<F: Float> SamplingMethod<F> for Morris<F> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self) -> Result<Array2<F>> {
        self.normalized_sample_with(&mut NoMonitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Axis, array};

    fn params(pool_size: usize, trajectories: usize) -> MorrisValidParams {
        MorrisParams::new()
            .pool_size(pool_size)
            .trajectories(trajectories)
            .seed(42)
            .check()
            .unwrap()
    }

    struct StopAt(usize, usize);

    impl Monitor for StopAt {
        fn progress(&mut self, done: usize, _total: usize) {
            self.1 = done;
        }
        fn should_stop(&self) -> bool {
            self.1 >= self.0
        }
    }

    #[test]
    fn test_params_check() {
        assert!(MorrisParams::new().check().is_ok());
        assert!(MorrisParams::new().levels(1).check().is_err());
        assert!(MorrisParams::new().levels(4).jump(0).check().is_err());
        assert!(MorrisParams::new().levels(4).jump(4).check().is_err());
        assert!(MorrisParams::new().levels(4).jump(3).check().is_ok());
        assert!(MorrisParams::new().pool_size(0).check().is_err());
        assert!(MorrisParams::new().trajectories(0).check().is_err());
    }

    #[test]
    fn test_trajectory_pool_structure() {
        let k = 3;
        let p = params(15, 4);
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let pool: Array2<f64> = trajectory_pool(&p, k, &mut rng);
        assert_eq!(pool.dim(), (15 * (k + 1), k));
        let delta = 2. / 3.;
        for m in 0..15 {
            let trajectory = row_block(&pool, m, k + 1);
            let mut moved = vec![0; k];
            for step in 0..k {
                let diff = &trajectory.row(step + 1) - &trajectory.row(step);
                let changed: Vec<_> = (0..k).filter(|&j| diff[j].abs() > 1e-12).collect();
                assert_eq!(changed.len(), 1);
                assert_abs_diff_eq!(diff[changed[0]].abs(), delta, epsilon = 1e-12);
                moved[changed[0]] += 1;
            }
            assert_eq!(moved, vec![1; k]);
            assert!(trajectory.iter().all(|&v| (-1e-12..=1. + 1e-12).contains(&v)));
        }
    }

    #[test]
    fn test_trajectory_distances() {
        // two trajectories of two points in the plane
        let pool = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.]];
        let d = trajectory_distances(&pool, 1, &mut NoMonitor).unwrap();
        let expected = 2. + 2. * 2f64.sqrt();
        assert_abs_diff_eq!(d, array![[0., expected], [expected, 0.]], epsilon = 1e-12);
    }

    #[test]
    fn test_trajectory_distances_cancelled() {
        let pool = Array2::<f64>::zeros((20, 1));
        let res = trajectory_distances(&pool, 1, &mut StopAt(3, 0));
        assert!(matches!(res, Err(DoeError::Cancelled)));
    }

    #[test]
    fn test_select_trajectories() {
        let d = array![
            [0., 1., 2., 3.],
            [1., 0., 4., 10.],
            [2., 4., 0., 5.],
            [3., 10., 5., 0.]
        ];
        assert_eq!(select_trajectories(&d, 2), vec![1, 3]);
        assert_eq!(select_trajectories(&d, 3), vec![1, 2, 3]);
        assert_eq!(select_trajectories(&d, 1), vec![0]);
        assert_eq!(select_trajectories(&d, 4), vec![0, 1, 2, 3]);
        assert_eq!(select_trajectories(&d, 9), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_greedy_last_step_is_locally_optimal() {
        let k = 2;
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let pool: Array2<f64> = trajectory_pool(&params(12, 5), k, &mut rng);
        let d = trajectory_distances(&pool, k, &mut NoMonitor).unwrap();
        let set = extend_selection(vec![0, 1], 5, &d);
        assert_eq!(set.len(), 5);
        let score = sum_pairwise(&set, &d);
        let head = &set[..4];
        for j in (0..12).filter(|j| !head.contains(j)) {
            let mut alternative = head.to_vec();
            alternative.push(j);
            assert!(score >= sum_pairwise(&alternative, &d));
        }
    }

    #[test]
    fn test_morris_sizes() {
        let xlimits = array![[0., 10.], [-1., 1.], [5., 6.]];
        let doe = Morris::new(&xlimits, &params(10, 4))
            .unwrap()
            .sample()
            .unwrap();
        assert_eq!(doe.dim(), (4 * 4, 3));
        for (col, lims) in doe.axis_iter(Axis(1)).zip(xlimits.rows()) {
            assert!(col
                .iter()
                .all(|&v| lims[0] - 1e-9 <= v && v <= lims[1] + 1e-9));
        }
    }

    #[test]
    fn test_morris_invalid_xlimits() {
        let p = params(8, 3);
        assert!(matches!(
            Morris::new(&array![[0., 1., 2.]], &p),
            Err(DoeError::InvalidConfig(_))
        ));
        assert!(matches!(
            Morris::<f64>::new(&Array2::zeros((0, 2)), &p),
            Err(DoeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_morris_is_reproducible() {
        let xlimits = array![[0., 1.], [0., 1.]];
        let doe = Morris::new(&xlimits, &params(8, 3)).unwrap();
        assert_eq!(doe.sample().unwrap(), doe.sample().unwrap());
    }

    #[test]
    fn test_morris_keeps_selected_trajectories_of_pool() {
        let k = 2;
        let p = params(8, 3);
        let pool: Array2<f64> = trajectory_pool(&p, k, &mut Xoshiro256Plus::seed_from_u64(42));
        let doe = Morris::new(&array![[0., 1.], [0., 1.]], &p)
            .unwrap()
            .normalized_sample()
            .unwrap();
        let d = trajectory_distances(&pool, k, &mut NoMonitor).unwrap();
        for (i, t) in select_trajectories(&d, 3).into_iter().enumerate() {
            assert_eq!(row_block(&doe, i, k + 1), row_block(&pool, t, k + 1));
        }
    }

    #[test]
    fn test_morris_pass_through() {
        let k = 2;
        let p = params(5, 5);
        let pool: Array2<f64> = trajectory_pool(&p, k, &mut Xoshiro256Plus::seed_from_u64(42));
        let doe = Morris::new(&array![[0., 1.], [0., 1.]], &p)
            .unwrap()
            .normalized_sample()
            .unwrap();
        assert_eq!(doe, pool);
        let doe = Morris::new(&array![[0., 1.], [0., 1.]], &params(5, 7))
            .unwrap()
            .normalized_sample()
            .unwrap();
        assert_eq!(doe, pool);
    }
}
