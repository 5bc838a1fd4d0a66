use crate::errors::{DoeError, Result};
use crate::factor::{Factor, FactorKind, SensitivityList};
use crate::full_factorial::FullFactorial;
use crate::morris::{Morris, MorrisParams};
use crate::nolh::{Nolh, NolhRegistry};
use crate::random::Random;
use crate::traits::{Monitor, SamplingMethod};
use linfa::ParamGuard;
use log::info;
use ndarray::{Array2, ArrayView1};
use std::path::Path;

/// A factor held constant over every experiment of a design
#[derive(Clone, Debug, PartialEq)]
pub struct Constant {
    /// Factor name
    pub label: String,
    /// Factor kind
    pub kind: FactorKind,
    /// The single value of the factor
    pub value: f64,
}

/// The experiments of a design, one row per experiment and one column per active factor
///
/// Values lie within the declared range of their factor and are integers
/// for integer factors. Factors held constant are kept aside.
#[derive(Clone, Debug, PartialEq)]
pub struct DesignTable {
    values: Array2<f64>,
    labels: Vec<String>,
    kinds: Vec<FactorKind>,
    xlimits: Array2<f64>,
    constants: Vec<Constant>,
    first_index: usize,
}

impl DesignTable {
    fn with_values(factors: &SensitivityList, values: Array2<f64>) -> Self {
        let active: Vec<&Factor> = factors.active().collect();
        DesignTable {
            values,
            labels: active.iter().map(|f| f.label().to_string()).collect(),
            kinds: active.iter().map(|f| f.kind()).collect(),
            xlimits: factors.xlimits(),
            constants: factors
                .constants()
                .map(|f| Constant {
                    label: f.label().to_string(),
                    kind: f.kind(),
                    value: f.values()[0],
                })
                .collect(),
            first_index: 1,
        }
    }

    /// Builds the design of the active factors of `factors` given a design
    /// in the unit hypercube `[0, 1]^k`
    ///
    /// Values are rescaled in the factors ranges and rounded to the nearest
    /// integer within the range for integer factors.
    pub fn from_normalized(factors: &SensitivityList, normalized: &Array2<f64>) -> Result<Self> {
        let k = factors.dimension();
        if normalized.ncols() != k {
            return Err(DoeError::InvalidConfig(format!(
                "design has {} columns while {k} factors are active",
                normalized.ncols()
            )));
        }
        let xlimits = factors.xlimits();
        let mut values = normalized * &(&xlimits.column(1) - &xlimits.column(0)) + xlimits.column(0);
        for (mut col, f) in values.columns_mut().into_iter().zip(factors.active()) {
            let (lo, hi) = f.bounds();
            if f.is_integer() {
                col.mapv_inplace(|v| v.round().clamp(lo.ceil(), hi.floor()));
            } else {
                col.mapv_inplace(|v| v.clamp(lo, hi));
            }
        }
        Ok(Self::with_values(factors, values))
    }

    /// Builds the full factorial design of the active factors, using declared values as is
    pub fn factorial(factors: &SensitivityList) -> Result<Self> {
        Ok(Self::with_values(factors, FullFactorial::new(factors).table()?))
    }

    /// Sets the index of the first experiment
    pub fn first_index(mut self, first_index: usize) -> Self {
        self.first_index = first_index;
        self
    }

    /// Number of experiments
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of active factors
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Experiment values
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Values of the `i`-th experiment
    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    /// Active factor names
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Active factor kinds
    pub fn kinds(&self) -> &[FactorKind] {
        &self.kinds
    }

    /// The (k, 2) matrix of the active factors ranges
    pub fn xlimits(&self) -> &Array2<f64> {
        &self.xlimits
    }

    /// Factors held constant
    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    /// Index of the first experiment
    pub fn start_index(&self) -> usize {
        self.first_index
    }

    /// Index of the last experiment
    pub fn last_index(&self) -> usize {
        (self.first_index + self.nrows()).saturating_sub(1)
    }

    /// Whether every value lies within the range of its factor
    pub fn is_contained(&self) -> bool {
        self.values
            .columns()
            .into_iter()
            .zip(self.xlimits.rows())
            .all(|(col, lims)| col.iter().all(|&v| lims[0] <= v && v <= lims[1]))
    }
}

/// The sampling strategy used to produce a [DesignTable]
#[derive(Clone, Debug)]
pub enum DesignMethod {
    /// Every combination of the declared values
    Factorial,
    /// Near-Orthogonal Latin Hypercube, basic or extended
    Nolh {
        /// Whether the extended table is used
        extended: bool,
    },
    /// Uniform random sampling
    Random {
        /// Number of experiments
        samples: usize,
        /// Seed the random generator is reset to
        seed: u64,
    },
    /// Morris Elementary Effects trajectories
    Morris(MorrisParams),
}

impl DesignMethod {
    /// Short name of the method
    pub fn name(&self) -> &'static str {
        match self {
            DesignMethod::Factorial => "factorial",
            DesignMethod::Nolh { .. } => "nolh",
            DesignMethod::Random { .. } => "random",
            DesignMethod::Morris(_) => "morris",
        }
    }

    /// Generates the design of `factors`
    ///
    /// NOLH tables are taken from `registry`, `external` being the table file loaded when
    /// no built-in table handles the number of active factors. The monitor can stop
    /// the Morris trajectory selection.
    ///
    /// # Errors
    ///
    /// Configuration errors are reported before any sampling: sampling designs need at
    /// least one active factor, sampling parameters have to be valid and a NOLH table
    /// has to be available.
    pub fn generate(
        &self,
        factors: &SensitivityList,
        registry: &mut NolhRegistry,
        external: Option<&Path>,
        monitor: &mut impl Monitor,
    ) -> Result<DesignTable> {
        let k = factors.dimension();
        if k == 0 && !matches!(self, DesignMethod::Factorial) {
            return Err(DoeError::InvalidConfig(format!(
                "{} design needs at least one factor with two distinct values",
                self.name()
            )));
        }
        let xlimits = factors.xlimits();
        let table = match self {
            DesignMethod::Factorial => DesignTable::factorial(factors)?,
            DesignMethod::Nolh { extended } => {
                let nolh = registry.select(k, external)?;
                let doe = Nolh::new(&xlimits, nolh, *extended)?.normalized_sample()?;
                DesignTable::from_normalized(factors, &doe)?
            }
            DesignMethod::Random { samples, seed } => {
                let doe = Random::new(&xlimits, *samples)
                    .seed(*seed)
                    .normalized_sample()?;
                DesignTable::from_normalized(factors, &doe)?
            }
            DesignMethod::Morris(params) => {
                let params = params.check_ref()?;
                let doe = Morris::new(&xlimits, params)?.normalized_sample_with(monitor)?;
                DesignTable::from_normalized(factors, &doe)?
            }
        };
        info!(
            "{} design: {} experiments of {k} factors",
            self.name(),
            table.nrows()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::traits::NoMonitor;
    use ndarray::array;

    fn column_is_integer(table: &DesignTable, j: usize) -> bool {
        table.values().column(j).iter().all(|v| v.fract() == 0.)
    }

    fn factors() -> SensitivityList {
        SensitivityList::new(vec![
            Factor::parameter("a", vec![0., 10.]),
            Factor::parameter("c", vec![7.]),
            Factor::lagged("b", 2, vec![1., 4.]).integer(true),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_normalized() {
        let normalized = array![[0., 0.], [0.25, 0.5], [1., 0.9]];
        let table = DesignTable::from_normalized(&factors(), &normalized).unwrap();
        assert_abs_diff_eq!(
            table.values(),
            &array![[0., 1.], [2.5, 3.], [10., 4.]],
            epsilon = 1e-12
        );
        assert_eq!(table.labels(), &["a".to_string(), "b".to_string()]);
        assert_eq!(
            table.kinds(),
            &[FactorKind::Parameter, FactorKind::LaggedVariable(2)]
        );
        assert_eq!(
            table.constants(),
            &[Constant {
                label: "c".to_string(),
                kind: FactorKind::Parameter,
                value: 7.
            }]
        );
        assert!(table.is_contained());
        assert!(DesignTable::from_normalized(&factors(), &array![[0.5]]).is_err());
    }

    #[test]
    fn test_indices() {
        let table = DesignTable::factorial(&factors()).unwrap().first_index(5);
        assert_eq!(table.nrows(), 4);
        assert_eq!((table.start_index(), table.last_index()), (5, 8));
        assert_eq!(table.values(), &array![[0., 1.], [0., 4.], [10., 1.], [10., 4.]]);
    }

    #[test]
    fn test_integer_rounding_stays_in_range() {
        let list =
            SensitivityList::new(vec![Factor::parameter("n", vec![0.5, 3.5]).integer(true)])
                .unwrap();
        let normalized = array![[0.], [0.1], [0.5], [1.]];
        let table = DesignTable::from_normalized(&list, &normalized).unwrap();
        assert_eq!(table.values(), &array![[1.], [1.], [2.], [3.]]);
    }

    #[test]
    fn test_generate_every_method() {
        let list = factors();
        let mut registry = NolhRegistry::new();
        let methods = [
            (DesignMethod::Factorial, 4),
            (DesignMethod::Nolh { extended: false }, 9),
            (DesignMethod::Nolh { extended: true }, 17),
            (
                DesignMethod::Random {
                    samples: 12,
                    seed: 3,
                },
                12,
            ),
            (
                DesignMethod::Morris(MorrisParams::new().pool_size(10).trajectories(4)),
                4 * 3,
            ),
        ];
        for (method, n) in methods {
            let table = method
                .generate(&list, &mut registry, None, &mut NoMonitor)
                .unwrap();
            assert_eq!(table.nrows(), n, "{}", method.name());
            assert!(table.is_contained(), "{}", method.name());
            assert!(column_is_integer(&table, 1), "{}", method.name());
        }
    }

    #[test]
    fn test_generate_invalid() {
        let list = SensitivityList::new(vec![Factor::parameter("c", vec![7.])]).unwrap();
        let mut registry = NolhRegistry::new();
        assert!(DesignMethod::Nolh { extended: false }
            .generate(&list, &mut registry, None, &mut NoMonitor)
            .is_err());
        let table = DesignMethod::Factorial
            .generate(&list, &mut registry, None, &mut NoMonitor)
            .unwrap();
        assert_eq!(table.values().dim(), (1, 0));
        let bad_morris = DesignMethod::Morris(MorrisParams::new().levels(1));
        assert!(bad_morris
            .generate(&factors(), &mut registry, None, &mut NoMonitor)
            .is_err());
        let no_samples = DesignMethod::Random {
            samples: 0,
            seed: 0,
        };
        assert!(no_samples
            .generate(&factors(), &mut registry, None, &mut NoMonitor)
            .is_err());
    }

}
