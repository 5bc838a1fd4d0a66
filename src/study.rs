//! Study file describing one design of experiments request
use anyhow::{Context, Result};
use expbox_doe::{
    DesignMethod, Factor, MORRIS_JUMP, MORRIS_LEVELS, MORRIS_POOL_SIZE, MORRIS_TRAJECTORIES,
    MorrisParams, SensitivityList,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Sampling method of a study
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Method {
    /// Every combination written in its own branch of one configuration
    Parallel,
    /// Every combination persisted as a standalone configuration with the given probability
    Sequential {
        /// Probability for a combination to be persisted, in (0, 1]
        #[serde(default = "default_probability")]
        probability: f64,
    },
    /// Full factorial design table
    Factorial,
    /// Near-Orthogonal Latin Hypercube design table
    Nolh {
        /// Whether the extended table is used
        #[serde(default)]
        extended: bool,
    },
    /// Uniform random design table
    Random {
        /// Number of experiments
        samples: usize,
    },
    /// Morris Elementary Effects trajectories
    Morris {
        /// Number of grid levels
        #[serde(default = "default_levels")]
        levels: usize,
        /// Step in number of levels
        #[serde(default = "default_jump")]
        jump: usize,
        /// Number of generated trajectories
        #[serde(default = "default_pool_size")]
        pool_size: usize,
        /// Number of kept trajectories
        #[serde(default = "default_trajectories")]
        trajectories: usize,
    },
}

fn default_probability() -> f64 {
    1.0
}
fn default_levels() -> usize {
    MORRIS_LEVELS
}
fn default_jump() -> usize {
    MORRIS_JUMP
}
fn default_pool_size() -> usize {
    MORRIS_POOL_SIZE
}
fn default_trajectories() -> usize {
    MORRIS_TRAJECTORIES
}
fn default_name() -> String {
    "sim".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_one() -> usize {
    1
}

/// A design of experiments request: factors, method and output settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Study {
    /// Base name of produced files
    #[serde(default = "default_name")]
    pub(crate) name: String,
    /// Directory receiving produced files
    #[serde(default = "default_output_dir")]
    pub(crate) output_dir: PathBuf,
    /// Seed of random designs and of the first persisted configuration
    #[serde(default)]
    pub(crate) seed: u64,
    /// Index of the first persisted configuration
    #[serde(default = "default_one")]
    pub(crate) first_index: usize,
    /// Number of simulation runs of each configuration, used to spread run seeds
    #[serde(default = "default_one")]
    pub(crate) runs_per_config: usize,
    /// Sampling method
    pub(crate) method: Method,
    /// Factors under study, in enumeration order
    pub(crate) factors: Vec<Factor>,
    /// Values of model elements not under study, by label
    #[serde(default)]
    pub(crate) base: BTreeMap<String, Vec<f64>>,
    /// External NOLH table used when no built-in table handles the factors
    #[serde(default)]
    pub(crate) nolh_table: Option<PathBuf>,
}

impl Study {
    /// Constructor given the method and the factors, other settings take default values
    pub fn new(method: Method, factors: Vec<Factor>) -> Self {
        Study {
            name: default_name(),
            output_dir: default_output_dir(),
            seed: 0,
            first_index: 1,
            runs_per_config: 1,
            method,
            factors,
            base: BTreeMap::new(),
            nolh_table: None,
        }
    }

    /// Reads a JSON study file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("cannot read study {path:?}"))?;
        serde_json::from_str(&content).with_context(|| format!("invalid study file {path:?}"))
    }

    /// Set the base name of produced files
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the directory receiving produced files
    pub fn output_dir<P: AsRef<Path>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.as_ref().to_path_buf();
        self
    }

    /// Set the seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the index of the first persisted configuration
    pub fn first_index(mut self, first_index: usize) -> Self {
        self.first_index = first_index;
        self
    }

    /// Set the number of runs of each configuration
    pub fn runs_per_config(mut self, runs_per_config: usize) -> Self {
        self.runs_per_config = runs_per_config;
        self
    }

    /// Set the values of a model element not under study
    pub fn base(mut self, label: &str, values: Vec<f64>) -> Self {
        self.base.insert(label.to_string(), values);
        self
    }

    /// Set the external NOLH table file
    pub fn nolh_table<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.nolh_table = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sampling method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The checked list of factors
    pub fn sensitivity(&self) -> Result<SensitivityList> {
        SensitivityList::new(self.factors.clone()).context("invalid factors")
    }

    /// The design method producing a design table, `None` for enumeration methods
    pub fn design_method(&self) -> Option<DesignMethod> {
        match &self.method {
            Method::Parallel | Method::Sequential { .. } => None,
            Method::Factorial => Some(DesignMethod::Factorial),
            Method::Nolh { extended } => Some(DesignMethod::Nolh {
                extended: *extended,
            }),
            Method::Random { samples } => Some(DesignMethod::Random {
                samples: *samples,
                seed: self.seed,
            }),
            Method::Morris {
                levels,
                jump,
                pool_size,
                trajectories,
            } => Some(DesignMethod::Morris(
                MorrisParams::new()
                    .levels(*levels)
                    .jump(*jump)
                    .pool_size(*pool_size)
                    .trajectories(*trajectories)
                    .seed(self.seed),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expbox_doe::FactorKind;

    #[test]
    fn test_study_from_json() {
        let json = r#"{
            "name": "fish", "output_dir": "out", "seed": 3,
            "method": { "type": "morris", "pool_size": 12 },
            "factors": [
                { "label": "alpha", "values": [0.1, 0.9] },
                { "label": "K", "kind": { "lagged_variable": 1 }, "integer": true, "values": [1, 2, 3] }
            ],
            "base": { "beta": [2.0] }
        }"#;
        let study: Study = serde_json::from_str(json).unwrap();
        assert_eq!(study.name, "fish");
        assert_eq!(study.first_index, 1);
        assert_eq!(
            study.method,
            Method::Morris {
                levels: 4,
                jump: 2,
                pool_size: 12,
                trajectories: 4
            }
        );
        assert_eq!(study.factors[1].kind(), FactorKind::LaggedVariable(1));
        assert!(study.factors[1].is_integer());
        assert_eq!(study.base["beta"], vec![2.0]);
        assert_eq!(study.sensitivity().unwrap().dimension(), 2);
    }

    #[test]
    fn test_method_defaults() {
        let method: Method = serde_json::from_str(r#"{ "type": "sequential" }"#).unwrap();
        assert_eq!(method, Method::Sequential { probability: 1.0 });
        let method: Method = serde_json::from_str(r#"{ "type": "nolh" }"#).unwrap();
        assert_eq!(method, Method::Nolh { extended: false });
        assert!(serde_json::from_str::<Method>(r#"{ "type": "random" }"#).is_err());
    }

    #[test]
    fn test_design_method() {
        let study = Study::new(Method::Random { samples: 5 }, vec![]).seed(9);
        assert!(matches!(
            study.design_method(),
            Some(DesignMethod::Random {
                samples: 5,
                seed: 9
            })
        ));
        assert!(Study::new(Method::Parallel, vec![])
            .design_method()
            .is_none());
    }

    #[test]
    fn test_invalid_factors() {
        let study = Study::new(
            Method::Factorial,
            vec![
                Factor::parameter("a", vec![1.]),
                Factor::parameter("a", vec![2.]),
            ],
        );
        assert!(study.sensitivity().is_err());
    }
}
