use std::marker::PhantomData;

use crate::SamplingMethod;
use crate::errors::{DoeError, Result};
use linfa::Float;
use log::debug;
use ndarray::{Array, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{RandomExt, rand::Rng, rand::SeedableRng, rand_distr::Uniform};
use rand_xoshiro::Xoshiro256Plus;

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// The Random design consists in drawing samples uniformly and independently.
///
/// The generator is reset to the design seed before the first draw,
/// hence sampling twice the same design gives the same samples.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Random<F: Float, R: Rng + SeedableRng = Xoshiro256Plus> {
    /// Sampling space definition as a (nx, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of xi, the ith component of x
    xlimits: Array2<F>,
    /// Number of samples to draw
    samples: usize,
    /// Seed the random generator is reset to
    seed: u64,
    rng: PhantomData<R>,
}

impl<F: Float> Random<F, Xoshiro256Plus> {
    /// Constructor given a design space given a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    /// and the number of samples to draw
    ///
    /// ```
    /// use expbox_doe::Random;
    /// use ndarray::arr2;
    ///
    /// let doe = Random::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]), 10).seed(42);
    /// ```
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, samples: usize) -> Self {
        if xlimits.ncols() != 2 {
            panic!("xlimits must have 2 columns (lower, upper)");
        }
        Random {
            xlimits: xlimits.to_owned(),
            samples,
            seed: 0,
            rng: PhantomData,
        }
    }
}

impl<F: Float, R: Rng + SeedableRng> Random<F, R> {
    /// Set the seed the random generator is reset to before sampling
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set random generator type
    pub fn with_rng<R2: Rng + SeedableRng>(self) -> Random<F, R2> {
        Random {
            xlimits: self.xlimits,
            samples: self.samples,
            seed: self.seed,
            rng: PhantomData,
        }
    }

    /// Number of samples drawn
    pub fn samples(&self) -> usize {
        self.samples
    }
}

impl<F: Float, R: Rng + SeedableRng> SamplingMethod<F> for Random<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self) -> Result<Array2<F>> {
        if self.samples < 1 {
            return Err(DoeError::InvalidConfig(
                "random design needs at least one sample".to_string(),
            ));
        }
        let mut rng = R::seed_from_u64(self.seed);
        let nx = self.xlimits.nrows();
        debug!("Draw {} random samples (seed={})", self.samples, self.seed);
        Ok(
            Array::random_using((self.samples, nx), Uniform::new(0., 1.), &mut rng)
                .mapv(|v| F::cast(v)),
        )
    }
}
