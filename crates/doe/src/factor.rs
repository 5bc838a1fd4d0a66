//! Factors under study and the ordered list driving an experiment design.
use crate::errors::{DoeError, Result};
use log::info;
use ndarray::Array2;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Separators accepted between values of a free-form value list
const VALUE_SEPARATORS: &[char] = &[' ', ',', ';', '|', '/', '#', '\t', '\n', '\r'];

/// Kind of model element a factor writes to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serializable", serde(rename_all = "snake_case"))]
pub enum FactorKind {
    /// A model parameter
    #[default]
    Parameter,
    /// A lagged variable, the value is the lag of the overwritten historical slot
    LaggedVariable(usize),
}

impl FactorKind {
    /// Index of the value slot overwritten in the model element
    pub fn slot(&self) -> usize {
        match self {
            FactorKind::Parameter => 0,
            FactorKind::LaggedVariable(lag) => *lag,
        }
    }
}

/// A tunable quantity of the simulation model
///
/// A factor declares an ordered list of values. Factorial designs use every
/// value as is, while NOLH, random and Morris designs only use the range
/// `[min, max]` spanned by the values.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Factor {
    label: String,
    #[cfg_attr(feature = "serializable", serde(default))]
    kind: FactorKind,
    #[cfg_attr(feature = "serializable", serde(default))]
    integer: bool,
    values: Vec<f64>,
}

impl Factor {
    /// Constructor of a parameter factor taking the given values
    ///
    /// ```
    /// use expbox_doe::Factor;
    ///
    /// let alpha = Factor::parameter("alpha", vec![0.1, 0.5, 0.9]);
    /// assert_eq!(alpha.bounds(), (0.1, 0.9));
    /// ```
    pub fn parameter(label: &str, values: Vec<f64>) -> Self {
        Factor {
            label: label.to_string(),
            kind: FactorKind::Parameter,
            integer: false,
            values,
        }
    }

    /// Constructor of a lagged variable factor overwriting the `lag` slot
    pub fn lagged(label: &str, lag: usize, values: Vec<f64>) -> Self {
        Factor {
            label: label.to_string(),
            kind: FactorKind::LaggedVariable(lag),
            integer: false,
            values,
        }
    }

    /// Sets whether sampled values have to be rounded to integers
    pub fn integer(mut self, integer: bool) -> Self {
        self.integer = integer;
        self
    }

    /// Factor name
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Factor kind
    pub fn kind(&self) -> FactorKind {
        self.kind
    }

    /// Whether sampled values are integers
    pub fn is_integer(&self) -> bool {
        self.integer
    }

    /// Declared values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The range `(min, max)` spanned by the declared values
    pub fn bounds(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// A factor is held constant when it has less than two distinct values
    pub fn is_constant(&self) -> bool {
        let (lo, hi) = self.bounds();
        lo == hi
    }

    fn check(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(DoeError::InvalidConfig(
                "factor label cannot be empty".to_string(),
            ));
        }
        if self.values.is_empty() {
            return Err(DoeError::InvalidConfig(format!(
                "factor '{}' has no value",
                self.label
            )));
        }
        if let Some(v) = self.values.iter().find(|v| !v.is_finite()) {
            return Err(DoeError::InvalidConfig(format!(
                "factor '{}' has a non finite value {v}",
                self.label
            )));
        }
        if self.integer {
            let (lo, hi) = self.bounds();
            if lo.ceil() > hi.floor() {
                return Err(DoeError::InvalidConfig(format!(
                    "integer factor '{}' has no integer value within [{lo}, {hi}]",
                    self.label
                )));
            }
        }
        Ok(())
    }
}

/// Parses a free-form list of values
///
/// Values may be separated by any of spaces, tabs, newlines or `,;|/#`.
///
/// ```
/// use expbox_doe::parse_values;
///
/// let values = parse_values("1, 2.5;3\t4").unwrap();
/// assert_eq!(values, vec![1., 2.5, 3., 4.]);
/// ```
pub fn parse_values(text: &str) -> Result<Vec<f64>> {
    text.split(VALUE_SEPARATORS)
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| DoeError::InvalidConfig(format!("'{tok}' is not a number")))
        })
        .collect()
}

/// The ordered list of factors of a study
///
/// Order matters: when enumerating combinations, the first factor varies
/// the slowest and the last one the fastest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensitivityList {
    factors: Vec<Factor>,
}

impl SensitivityList {
    /// Constructor checking factors definitions
    ///
    /// Labels have to be unique and each factor needs at least one finite value.
    pub fn new(factors: Vec<Factor>) -> Result<Self> {
        let mut labels = HashSet::new();
        for f in factors.iter() {
            f.check()?;
            if !labels.insert(f.label()) {
                return Err(DoeError::InvalidConfig(format!(
                    "factor '{}' is defined twice",
                    f.label()
                )));
            }
        }
        Ok(SensitivityList { factors })
    }

    /// All factors in declaration order
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Number of factors, constant ones included
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Whether the list holds no factor
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Number of combinations of the declared values, `None` when it overflows `usize`
    pub fn space_size(&self) -> Option<usize> {
        self.factors
            .iter()
            .try_fold(1usize, |size, f| size.checked_mul(f.values().len()))
    }

    /// Factors taking part in sampling designs
    pub fn active(&self) -> impl Iterator<Item = &Factor> {
        self.factors.iter().filter(|f| !f.is_constant())
    }

    /// Factors held constant
    pub fn constants(&self) -> impl Iterator<Item = &Factor> {
        self.factors.iter().filter(|f| f.is_constant())
    }

    /// Dimension `k` of sampling designs, i.e. number of active factors
    pub fn dimension(&self) -> usize {
        self.active().count()
    }

    /// The (k, 2) matrix of `[min, max]` ranges of active factors
    pub fn xlimits(&self) -> Array2<f64> {
        let mut xlimits = Array2::zeros((self.dimension(), 2));
        for (mut row, f) in xlimits.rows_mut().into_iter().zip(self.active()) {
            let (lo, hi) = f.bounds();
            row[0] = lo;
            row[1] = hi;
        }
        xlimits
    }

    /// Writes one line per factor `label count:\tv1\tv2...` describing the explored space
    pub fn write_summary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        for f in self.factors.iter() {
            write!(out, "{} {}:", f.label(), f.values().len())?;
            for v in f.values() {
                write!(out, "\t{v}")?;
            }
            writeln!(out)?;
        }
        out.flush()?;
        info!("Sensitivity summary written in {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn list() -> SensitivityList {
        SensitivityList::new(vec![
            Factor::parameter("a", vec![1., 2.]),
            Factor::lagged("b", 1, vec![30., 10., 20.]).integer(true),
            Factor::parameter("c", vec![5.]),
        ])
        .unwrap()
    }

    #[test]
    fn test_space_size() {
        assert_eq!(list().space_size(), Some(6));
        assert_eq!(SensitivityList::default().space_size(), Some(1));
    }

    #[test]
    fn test_space_size_overflow() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        let wide = SensitivityList::new(
            (0..20)
                .map(|i| Factor::parameter(&format!("x{i}"), values.clone()))
                .collect(),
        )
        .unwrap();
        assert_eq!(wide.space_size(), None);
        assert_eq!(wide.dimension(), 20);
    }

    #[test]
    fn test_active_factors() {
        let l = list();
        assert_eq!(l.dimension(), 2);
        assert_eq!(l.constants().next().unwrap().label(), "c");
        assert_eq!(l.xlimits(), array![[1., 2.], [10., 30.]]);
    }

    #[test]
    fn test_repeated_value_is_constant() {
        assert!(Factor::parameter("x", vec![3., 3., 3.]).is_constant());
    }

    #[test]
    fn test_invalid_factors() {
        assert!(SensitivityList::new(vec![Factor::parameter("a", vec![])]).is_err());
        assert!(SensitivityList::new(vec![
            Factor::parameter("a", vec![1.]),
            Factor::parameter("a", vec![2.])
        ])
        .is_err());
        assert!(
            SensitivityList::new(vec![Factor::parameter("a", vec![0.2, 0.7]).integer(true)])
                .is_err()
        );
        assert!(SensitivityList::new(vec![Factor::parameter("a", vec![f64::NAN])]).is_err());
    }

    #[test]
    fn test_slot() {
        assert_eq!(FactorKind::Parameter.slot(), 0);
        assert_eq!(FactorKind::LaggedVariable(2).slot(), 2);
    }

    #[test]
    fn test_parse_values() {
        let values = parse_values(" 1|2/3#4\n5 ;; 6.5e-1 ").unwrap();
        assert_eq!(values, vec![1., 2., 3., 4., 5., 0.65]);
        assert!(parse_values("1 two 3").is_err());
        assert!(parse_values("").unwrap().is_empty());
    }

    #[cfg(feature = "serializable")]
    #[test]
    fn test_factor_from_json() {
        let f: Factor = serde_json::from_str(
            r#"{ "label": "K", "kind": { "lagged_variable": 2 }, "values": [1, 5] }"#,
        )
        .unwrap();
        assert_eq!(f, Factor::lagged("K", 2, vec![1., 5.]));
        let f: Factor = serde_json::from_str(r#"{ "label": "a", "values": [0.5] }"#).unwrap();
        assert_eq!(f.kind(), FactorKind::Parameter);
        assert!(!f.is_integer());
    }

    #[test]
    fn test_write_summary() {
        let outdir = "target/test_sensitivity_summary";
        std::fs::create_dir_all(outdir).unwrap();
        let path = format!("{outdir}/sim_sens.txt");
        list().write_summary(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a 2:\t1\t2\nb 3:\t30\t10\t20\nc 1:\t5\n");
    }
}
