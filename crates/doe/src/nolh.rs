use crate::errors::{DoeError, Result};
use crate::traits::SamplingMethod;
use crate::utils::pdist;
use csv::{ReaderBuilder, Trim};
use linfa::Float;
use log::{debug, info, warn};
use ndarray::{Array2, ArrayBase, Axis, Data, Ix2, s};
use ndarray_stats::QuantileExt;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Smallest and largest orders `m` of built-in tables (`2^m + 1` runs)
const BUILTIN_ORDERS: std::ops::RangeInclusive<u32> = 3..=8;

/// Orthogonal Latin hypercube of `2^m + 1` runs and `2m - 2` columns
///
/// Levels range from 1 to `2^m + 1`. See Ye, K. Q. (1998), "Orthogonal column Latin
/// hypercubes and their application in computer experiments", Journal of the
/// American Statistical Association, 93:1430-1439.
pub fn ye_olh(m: u32) -> Array2<u32> {
    let half = 1usize << (m - 1);
    let ncols = 2 * m as usize - 2;
    // permutation A_k of e = (1..2^(m-1)) flips the k lowest bits of the row index
    let flip = |i: usize, k: u32| i ^ ((1usize << k) - 1);
    let sign = |i: usize, k: u32| if (i >> (k - 1)) & 1 == 0 { -1i64 } else { 1 };

    let mut t = Array2::<i64>::zeros((half, ncols));
    for i in 0..half {
        t[[i, 0]] = (i + 1) as i64;
        for k in 1..m {
            t[[i, k as usize]] = (flip(i, k) + 1) as i64 * sign(i, k);
        }
        for k in 1..m - 1 {
            t[[i, (m + k - 1) as usize]] =
                (flip(flip(i, k), m - 1) + 1) as i64 * sign(i, 1) * sign(i, k + 1);
        }
    }

    let mut olh = Array2::<i64>::zeros((2 * half + 1, ncols));
    olh.slice_mut(s![..half, ..]).assign(&t);
    olh.slice_mut(s![half + 1.., ..]).assign(&t.mapv(|v| -v));
    olh.mapv(|v| (v + half as i64 + 1) as u32)
}

/// A matrix of integer levels in `[lo_level, hi_level]`, one row per experiment
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct LevelTable {
    levels: Array2<u32>,
    lo_level: u32,
    hi_level: u32,
}

impl LevelTable {
    /// Constructor given levels, the level range is the range of the given values
    ///
    /// **Panics** if `levels` is empty.
    pub fn new(levels: Array2<u32>) -> Self {
        let lo_level = *levels.min().unwrap();
        let hi_level = *levels.max().unwrap();
        LevelTable {
            levels,
            lo_level,
            hi_level,
        }
    }

    /// Number of experiments
    pub fn nrows(&self) -> usize {
        self.levels.nrows()
    }

    /// Number of factors the table can handle
    pub fn ncols(&self) -> usize {
        self.levels.ncols()
    }

    /// Lowest and highest levels
    pub fn level_range(&self) -> (u32, u32) {
        (self.lo_level, self.hi_level)
    }

    /// Raw levels
    pub fn levels(&self) -> &Array2<u32> {
        &self.levels
    }

    /// The first `k` columns mapped in `[0, 1]`: `(level - lo_level) / (hi_level - lo_level)`
    pub fn normalized<F: Float>(&self, k: usize) -> Array2<F> {
        let lo = F::cast(self.lo_level);
        let width = F::cast(self.hi_level - self.lo_level);
        self.levels
            .slice(s![.., ..k])
            .mapv(|v| (F::cast(v) - lo) / width)
    }

    /// Largest absolute correlation between two of the first `k` columns
    pub fn max_correlation(&self, k: usize) -> f64 {
        let x = self.normalized::<f64>(k);
        let centered = &x - &x.mean_axis(Axis(0)).unwrap();
        let cov = centered.t().dot(&centered);
        let mut worst = 0f64;
        for i in 0..k {
            for j in (i + 1)..k {
                let denom = (cov[[i, i]] * cov[[j, j]]).sqrt();
                if denom > 0. {
                    worst = worst.max((cov[[i, j]] / denom).abs());
                }
            }
        }
        worst
    }
}

/// A Near-Orthogonal Latin Hypercube table usable for `k_min..=k_max` factors
///
/// The basic table has `n1` experiments, the optional extended table trades more
/// experiments `n2` for a better coverage of the same factor range.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct NolhTable {
    k_min: usize,
    k_max: usize,
    basic: LevelTable,
    extended: Option<LevelTable>,
    source: Option<PathBuf>,
}

impl NolhTable {
    /// Smallest number of factors the table is intended for
    pub fn k_min(&self) -> usize {
        self.k_min
    }

    /// Largest number of factors the table can handle
    pub fn k_max(&self) -> usize {
        self.k_max
    }

    /// Number of experiments of the basic design
    pub fn n1(&self) -> usize {
        self.basic.nrows()
    }

    /// Number of experiments of the extended design (`n1` when there is none)
    pub fn n2(&self) -> usize {
        self.extended.as_ref().unwrap_or(&self.basic).nrows()
    }

    /// File the table was loaded from, `None` for built-in tables
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The basic or extended level table
    ///
    /// Tables without extended design fall back on the basic one.
    pub fn levels(&self, extended: bool) -> &LevelTable {
        match (&self.extended, extended) {
            (Some(ext), true) => ext,
            (None, true) => {
                warn!("NOLH table has no extended design, basic design used");
                &self.basic
            }
            _ => &self.basic,
        }
    }
}

/// Reads an external NOLH table as a CSV file of positive integers,
/// one row per experiment and one column per factor.
///
/// # Errors
///
/// * [DoeError::MalformedTable] naming the offending line when a value is missing or
///   not a positive integer, when rows have different lengths, when a blank line is found
///   or when the table does not hold at least two distinct levels.
/// * [DoeError::MissingTable] naming the file when it cannot be read
pub fn read_nolh_table<P: AsRef<Path>>(path: P) -> Result<LevelTable> {
    let path = path.as_ref();
    let malformed = |line: usize, reason: String| DoeError::MalformedTable {
        path: path.to_path_buf(),
        line,
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| DoeError::MissingTable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let content = content.trim_end();
    if let Some(blank) = content.lines().position(|l| l.trim().is_empty()) {
        return Err(malformed(blank + 1, "blank line".to_string()));
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut values = vec![];
    let mut ncols = 0;
    let mut nrows = 0;
    for record in reader.records() {
        let record = record?;
        let line = nrows + 1;
        if nrows == 0 {
            ncols = record.len();
        } else if record.len() != ncols {
            return Err(malformed(
                line,
                format!("expected {ncols} values, found {}", record.len()),
            ));
        }
        for (j, cell) in record.iter().enumerate() {
            match cell.parse::<u32>() {
                Ok(v) if v > 0 => values.push(v),
                _ if cell.is_empty() => {
                    return Err(malformed(line, format!("missing value in column {}", j + 1)))
                }
                _ => {
                    return Err(malformed(
                        line,
                        format!("'{cell}' is not a positive integer"),
                    ))
                }
            }
        }
        nrows += 1;
    }

    if nrows == 0 || ncols == 0 {
        return Err(malformed(1, "empty table".to_string()));
    }
    let levels = Array2::from_shape_vec((nrows, ncols), values)
        .map_err(|e| malformed(nrows, e.to_string()))?;
    let table = LevelTable::new(levels);
    if table.lo_level == table.hi_level {
        return Err(malformed(
            nrows,
            "table needs at least two distinct levels".to_string(),
        ));
    }
    Ok(table)
}

/// The set of NOLH tables available to a session
///
/// Built-in tables are orthogonal Latin hypercubes (see [ye_olh]) of 9 up to 257 runs
/// handling up to 14 factors. An external table, once loaded, takes precedence for every
/// number of factors it can handle and stays the active choice for the registry lifetime.
#[derive(Clone, Debug)]
pub struct NolhRegistry {
    tables: Vec<NolhTable>,
    external: Option<NolhTable>,
}

impl Default for NolhRegistry {
    fn default() -> Self {
        let mut olhs: Vec<Array2<u32>> = BUILTIN_ORDERS.map(ye_olh).collect();
        olhs.push(ye_olh(BUILTIN_ORDERS.end() + 1));
        let mut tables = vec![];
        let mut k_min = 1;
        for pair in olhs.windows(2) {
            let k_max = pair[0].ncols();
            tables.push(NolhTable {
                k_min,
                k_max,
                basic: LevelTable::new(pair[0].clone()),
                extended: Some(LevelTable::new(pair[1].slice(s![.., ..k_max]).to_owned())),
                source: None,
            });
            k_min = k_max + 1;
        }
        NolhRegistry {
            tables,
            external: None,
        }
    }
}

impl NolhRegistry {
    /// Registry with built-in tables only
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in tables ordered by increasing capacity
    pub fn builtin(&self) -> &[NolhTable] {
        &self.tables
    }

    /// The external table loaded so far if any
    pub fn external(&self) -> Option<&NolhTable> {
        self.external.as_ref()
    }

    /// Largest number of factors handled by built-in tables
    pub fn builtin_capacity(&self) -> usize {
        self.tables.last().map_or(0, |t| t.k_max)
    }

    /// Loads an external table from the given CSV file, replacing any previously loaded one
    pub fn load_external<P: AsRef<Path>>(&mut self, path: P) -> Result<&NolhTable> {
        let basic = read_nolh_table(path.as_ref())?;
        info!(
            "Load NOLH table {:?}: {} experiments x {} factors",
            path.as_ref(),
            basic.nrows(),
            basic.ncols()
        );
        Ok(&*self.external.insert(NolhTable {
            k_min: 1,
            k_max: basic.ncols(),
            basic,
            extended: None,
            source: Some(path.as_ref().to_path_buf()),
        }))
    }

    /// Selects the table to use for `k` factors
    ///
    /// A loaded external table able to handle `k` factors comes first, then the smallest
    /// built-in table with `k_max >= k`. Otherwise the `external` file, if any, is loaded.
    ///
    /// # Errors
    ///
    /// * [DoeError::InvalidConfig] when `k` is 0 or the external table is too narrow
    /// * [DoeError::NoNolhTable] when no table can be found
    /// * [DoeError::MalformedTable] when the external file is rejected
    pub fn select(&mut self, k: usize, external: Option<&Path>) -> Result<&NolhTable> {
        if k == 0 {
            return Err(DoeError::InvalidConfig(
                "NOLH design needs at least one factor".to_string(),
            ));
        }
        let loaded_fits = matches!(&self.external, Some(t) if t.k_max >= k);
        if !loaded_fits {
            if let Some(i) = self.tables.iter().position(|t| t.k_max >= k) {
                debug!("Built-in NOLH table #{i} selected for {k} factors");
                return Ok(&self.tables[i]);
            }
            match external {
                Some(path) => {
                    self.load_external(path)?;
                }
                None => {
                    return Err(DoeError::NoNolhTable {
                        factors: k,
                        largest: self.builtin_capacity(),
                    })
                }
            }
        }
        match &self.external {
            Some(t) if t.k_max >= k => Ok(t),
            Some(t) => Err(DoeError::InvalidConfig(format!(
                "external NOLH table {:?} has {} columns, {k} factors require at least {k}",
                t.source, t.k_max
            ))),
            None => Err(DoeError::NoNolhTable {
                factors: k,
                largest: self.builtin_capacity(),
            }),
        }
    }
}

/// The NOLH design maps the levels of a Near-Orthogonal Latin Hypercube table
/// onto the sample space. It involves no randomness.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Nolh<F: Float> {
    /// Sampling space definition as a (nx, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of xi, the ith component of x
    xlimits: Array2<F>,
    /// Levels to be mapped, only the first nx columns are used
    table: LevelTable,
}

impl<F: Float> Nolh<F> {
    /// Constructor given a design space as a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    /// and the NOLH table to use, either its basic or extended form.
    ///
    /// ```
    /// use expbox_doe::{Nolh, NolhRegistry, SamplingMethod};
    /// use ndarray::arr2;
    ///
    /// let xlimits = arr2(&[[0.0, 1.0], [5.0, 10.0]]);
    /// let mut registry = NolhRegistry::new();
    /// let table = registry.select(2, None).unwrap();
    /// let doe = Nolh::new(&xlimits, table, false).unwrap().sample().unwrap();
    /// assert_eq!(doe.nrows(), table.n1());
    /// ```
    pub fn new(
        xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>,
        table: &NolhTable,
        extended: bool,
    ) -> Result<Self> {
        if xlimits.ncols() != 2 {
            return Err(DoeError::InvalidConfig(
                "xlimits must have 2 columns (lower, upper)".to_string(),
            ));
        }
        let k = xlimits.nrows();
        if k == 0 || k > table.k_max() {
            return Err(DoeError::InvalidConfig(format!(
                "NOLH table handles 1 to {} factors, got {k}",
                table.k_max()
            )));
        }
        let levels = table.levels(extended).clone();
        info!(
            "NOLH design of {} experiments for {k} factors (max correlation {:.3e})",
            levels.nrows(),
            levels.max_correlation(k)
        );
        Ok(Nolh {
            xlimits: xlimits.to_owned(),
            table: levels,
        })
    }
}

impl<F: Float> SamplingMethod<F> for Nolh<F> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self) -> Result<Array2<F>> {
        let doe = self.table.normalized(self.xlimits.nrows());
        if let Ok(dmin) = pdist(&doe).min() {
            debug!("NOLH design min distance between points = {dmin}");
        }
        Ok(doe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, array};

    fn write_table(name: &str, content: &str) -> String {
        let outdir = "target/test_nolh_tables";
        fs::create_dir_all(outdir).unwrap();
        let path = format!("{outdir}/{name}.csv");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_ye_olh() {
        let expected: Array2<u32> = array![
            [6, 3, 1, 8],
            [7, 6, 2, 1],
            [8, 1, 7, 4],
            [9, 8, 6, 7],
            [5, 5, 5, 5],
            [4, 7, 9, 2],
            [3, 4, 8, 9],
            [2, 9, 3, 6],
            [1, 2, 4, 3]
        ];
        assert_eq!(ye_olh(3), expected);
    }

    #[test]
    fn test_builtin_tables_are_orthogonal_lhs() {
        for table in NolhRegistry::new().builtin() {
            for lt in [table.levels(false), table.levels(true)] {
                let n = lt.nrows() as u32;
                assert_eq!(lt.level_range(), (1, n));
                for col in lt.levels().columns() {
                    let mut col = col.to_vec();
                    col.sort_unstable();
                    assert_eq!(col, (1..=n).collect::<Vec<_>>());
                }
                assert_abs_diff_eq!(lt.max_correlation(table.k_max()), 0., epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_registry_layout() {
        let registry = NolhRegistry::new();
        let ranges: Vec<_> = registry
            .builtin()
            .iter()
            .map(|t| (t.k_min(), t.k_max(), t.n1(), t.n2()))
            .collect();
        assert_eq!(
            ranges,
            vec![
                (1, 4, 9, 17),
                (5, 6, 17, 33),
                (7, 8, 33, 65),
                (9, 10, 65, 129),
                (11, 12, 129, 257),
                (13, 14, 257, 513)
            ]
        );
        assert_eq!(registry.builtin_capacity(), 14);
    }

    #[test]
    fn test_select_smallest_table() {
        let mut registry = NolhRegistry::new();
        assert_eq!(registry.select(4, None).unwrap().n1(), 9);
        assert_eq!(registry.select(5, None).unwrap().n1(), 17);
        assert_eq!(registry.select(14, None).unwrap().n1(), 257);
        assert!(registry.select(0, None).is_err());
    }

    #[test]
    fn test_select_too_many_factors() {
        let mut registry = NolhRegistry::new();
        match registry.select(20, None) {
            Err(DoeError::NoNolhTable { factors, largest }) => {
                assert_eq!(factors, 20);
                assert_eq!(largest, 14);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_select_external_table() {
        let rows: Vec<String> = (1..=5)
            .map(|i| {
                (0..16)
                    .map(|j| ((i + j) % 5 + 1).to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        let path = write_table("wide", &(rows.join("\n") + "\n"));
        let mut registry = NolhRegistry::new();
        let table = registry.select(16, Some(Path::new(&path))).unwrap();
        assert_eq!((table.n1(), table.k_max()), (5, 16));
        // loaded table now takes precedence
        let table = registry.select(3, None).unwrap();
        assert_eq!(table.source(), Some(Path::new(&path)));
        assert!(matches!(
            registry.select(17, None),
            Err(DoeError::NoNolhTable { factors: 17, .. })
        ));
    }

    #[test]
    fn test_select_missing_external_table() {
        let mut registry = NolhRegistry::new();
        let err = registry
            .select(16, Some(Path::new("does/not/exist.csv")))
            .unwrap_err();
        match &err {
            DoeError::MissingTable { path, .. } => {
                assert_eq!(path, Path::new("does/not/exist.csv"))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("does/not/exist.csv"));
    }

    #[test]
    fn test_malformed_tables() {
        let cases = [
            ("ragged", "1,2,3\n2,3\n3,1,2\n", 2),
            ("negative", "1,2\n2,-1\n", 2),
            ("real", "1,2\n2,1.5\n", 2),
            ("zero", "1,2\n0,1\n", 2),
            ("missing", "1,2\n2,\n", 2),
            ("blank", "1,2\n\n2,1\n", 2),
            ("constant", "1,1\n1,1\n", 2),
        ];
        for (name, content, expected_line) in cases {
            let path = write_table(name, content);
            match read_nolh_table(&path) {
                Err(DoeError::MalformedTable { line, .. }) => {
                    assert_eq!(line, expected_line, "{name}")
                }
                other => panic!("{name}: unexpected {other:?}"),
            }
        }
        let err = read_nolh_table("target/test_nolh_tables/does_not_exist.csv").unwrap_err();
        assert!(matches!(err, DoeError::MissingTable { .. }));
        assert!(err.to_string().contains("does_not_exist.csv"));
    }

    #[test]
    fn test_read_table() {
        let path = write_table("small", "1, 3\n2,1\n3, 2\n");
        let table = read_nolh_table(path).unwrap();
        let expected: Array2<u32> = array![[1, 3], [2, 1], [3, 2]];
        assert_eq!(table.levels(), &expected);
        assert_eq!(table.level_range(), (1, 3));
    }

    #[test]
    fn test_nolh() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let mut registry = NolhRegistry::new();
        let table = registry.select(2, None).unwrap();
        let actual = Nolh::new(&xlimits, table, false).unwrap().sample().unwrap();
        let expected = array![
            [8.125, 0.25],
            [8.75, 0.625],
            [9.375, 0.],
            [10., 0.875],
            [7.5, 0.5],
            [6.875, 0.75],
            [6.25, 0.375],
            [5.625, 1.],
            [5., 0.125]
        ];
        assert_abs_diff_eq!(expected, actual, epsilon = 1e-12);
    }

    #[test]
    fn test_nolh_is_deterministic() {
        let xlimits = arr2(&[[-1., 1.], [0., 100.], [3., 4.]]);
        let mut registry = NolhRegistry::new();
        let table = registry.select(3, None).unwrap().clone();
        let a = Nolh::new(&xlimits, &table, true).unwrap().sample().unwrap();
        let b = Nolh::new(&xlimits, &table, true).unwrap().sample().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.nrows(), 17);
    }

    #[test]
    fn test_nolh_too_many_factors_for_table() {
        let xlimits = Array2::from_shape_fn((5, 2), |(_, j)| j as f64);
        let mut registry = NolhRegistry::new();
        let table = registry.select(4, None).unwrap().clone();
        assert!(Nolh::new(&xlimits, &table, false).is_err());
    }
}
