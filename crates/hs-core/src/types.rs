//! Common data types for hetstat

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Dense row-major design matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Features {
    n: usize,
    p: usize,
    data: Vec<f64>, // length n*p, row-major
}

impl Features {
    /// Build from row-wise data. Rejects empty, ragged or non-finite input.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let p = rows.first().map(|r| r.len()).unwrap_or(0);
        if n == 0 || p == 0 {
            return Err(Error::Validation("X must be non-empty (n>0, p>0)".to_string()));
        }
        let mut data = Vec::with_capacity(n * p);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != p {
                return Err(Error::Validation(format!(
                    "X must be rectangular: row {} has len {}, expected {}",
                    i,
                    row.len(),
                    p
                )));
            }
            for v in row {
                if !v.is_finite() {
                    return Err(Error::Validation("X must contain only finite values".to_string()));
                }
                data.push(v);
            }
        }
        Ok(Self { n, p, data })
    }

    /// Build from a flat row-major buffer of shape (n, p).
    pub fn from_row_major(n: usize, p: usize, data: Vec<f64>) -> Result<Self> {
        if n == 0 || p == 0 {
            return Err(Error::Validation("X must be non-empty (n>0, p>0)".to_string()));
        }
        if data.len() != n * p {
            return Err(Error::Validation(format!(
                "X has wrong length: expected n*p={}, got {}",
                n * p,
                data.len()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("X must contain only finite values".to_string()));
        }
        Ok(Self { n, p, data })
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n
    }

    /// Number of feature columns.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.p
    }

    /// Row `i` as a slice of length `p`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.p;
        &self.data[start..start + self.p]
    }

    /// Flat row-major buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Copy of the given rows, in the given order.
    ///
    /// Panics if an index is out of range; callers pass indices derived from
    /// the same matrix.
    pub fn select_rows(&self, indices: &[usize]) -> Features {
        let mut data = Vec::with_capacity(indices.len() * self.p);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Features { n: indices.len(), p: self.p, data }
    }
}

impl TryFrom<Vec<Vec<f64>>> for Features {
    type Error = Error;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Features::from_rows(rows)
    }
}

impl From<Features> for Vec<Vec<f64>> {
    fn from(x: Features) -> Self {
        x.data.chunks(x.p).map(|r| r.to_vec()).collect()
    }
}

/// Propensity as written in input files: one value per row, or a single
/// value shared by every row (complete randomization).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum PropensityJson {
    Shared(f64),
    PerRow(Vec<f64>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetJson {
    x: Features,
    y: Vec<f64>,
    d: Vec<u8>,
    propensity: PropensityJson,
}

/// A randomized experiment: covariates, outcome, treatment and propensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetJson", into = "DatasetJson")]
pub struct Dataset {
    /// Covariates (n × p).
    pub x: Features,
    /// Outcome (length n).
    pub y: Vec<f64>,
    /// Treatment indicator, 0 or 1 (length n).
    pub d: Vec<u8>,
    /// Treatment propensity P(D=1|X), strictly inside (0,1) (length n).
    pub propensity: Vec<f64>,
}

impl Dataset {
    /// Create a validated dataset.
    pub fn new(x: Features, y: Vec<f64>, d: Vec<u8>, propensity: Vec<f64>) -> Result<Self> {
        let n = x.n_rows();
        if y.len() != n || d.len() != n || propensity.len() != n {
            return Err(Error::Validation(format!(
                "x has {} rows but y/d/propensity have lengths {}/{}/{}",
                n,
                y.len(),
                d.len(),
                propensity.len()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("y must contain only finite values".to_string()));
        }
        if let Some(bad) = d.iter().find(|&&v| v > 1) {
            return Err(Error::Validation(format!("d must be 0 or 1, got {bad}")));
        }
        if let Some(bad) = propensity.iter().find(|&&p| !(p > 0.0 && p < 1.0)) {
            return Err(Error::Validation(format!("propensity must be in (0,1), got {bad}")));
        }
        Ok(Self { x, y, d, propensity })
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// True if the dataset has no rows (never the case for a validated dataset).
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Number of treated observations.
    pub fn n_treated(&self) -> usize {
        self.d.iter().filter(|&&v| v == 1).count()
    }

    /// Rows `indices`, in order.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select_rows(indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
            d: indices.iter().map(|&i| self.d[i]).collect(),
            propensity: indices.iter().map(|&i| self.propensity[i]).collect(),
        }
    }
}

impl TryFrom<DatasetJson> for Dataset {
    type Error = Error;

    fn try_from(raw: DatasetJson) -> Result<Self> {
        let propensity = match raw.propensity {
            PropensityJson::Shared(p) => vec![p; raw.y.len()],
            PropensityJson::PerRow(v) => v,
        };
        Dataset::new(raw.x, raw.y, raw.d, propensity)
    }
}

impl From<Dataset> for DatasetJson {
    fn from(ds: Dataset) -> Self {
        DatasetJson {
            x: ds.x,
            y: ds.y,
            d: ds.d,
            propensity: PropensityJson::PerRow(ds.propensity),
        }
    }
}

/// Which half of a sample split an observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRole {
    /// Used for second-stage estimation ("m").
    Main,
    /// Used to train the ML proxies ("a").
    Auxiliary,
}

/// Per-observation sample assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSplit {
    /// Role of each observation, in dataset order.
    pub roles: Vec<SampleRole>,
}

impl SampleSplit {
    fn indices_of(&self, role: SampleRole) -> Vec<usize> {
        self.roles.iter().enumerate().filter(|(_, r)| **r == role).map(|(i, _)| i).collect()
    }

    /// Indices of main-sample rows, ascending.
    pub fn main_indices(&self) -> Vec<usize> {
        self.indices_of(SampleRole::Main)
    }

    /// Indices of auxiliary-sample rows, ascending.
    pub fn auxiliary_indices(&self) -> Vec<usize> {
        self.indices_of(SampleRole::Auxiliary)
    }

    /// Size of the main sample.
    pub fn n_main(&self) -> usize {
        self.roles.iter().filter(|r| **r == SampleRole::Main).count()
    }

    /// Size of the auxiliary sample.
    pub fn n_auxiliary(&self) -> usize {
        self.roles.len() - self.n_main()
    }
}

/// One regression coefficient with its inference summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefEstimate {
    /// Coefficient label.
    pub name: String,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error.
    pub std_error: f64,
    /// t statistic.
    pub t_value: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Lower bound of the 95% confidence interval.
    pub ci_lower: f64,
    /// Upper bound of the 95% confidence interval.
    pub ci_upper: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dataset() -> Dataset {
        let x = Features::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        Dataset::new(x, vec![1.0, 2.0, 3.0], vec![1, 0, 1], vec![0.5; 3]).unwrap()
    }

    #[test]
    fn test_features_rows() {
        let x = Features::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(x.n_rows(), 2);
        assert_eq!(x.n_cols(), 2);
        assert_eq!(x.row(1), &[3.0, 4.0]);

        let sel = x.select_rows(&[1, 1, 0]);
        assert_eq!(sel.n_rows(), 3);
        assert_eq!(sel.as_slice(), &[3.0, 4.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_features_rejects_bad_input() {
        assert!(Features::from_rows(vec![]).is_err());
        assert!(Features::from_rows(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(Features::from_rows(vec![vec![f64::NAN]]).is_err());
        assert!(Features::from_row_major(2, 2, vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_dataset_validation() {
        let x = Features::from_rows(vec![vec![0.0], vec![1.0]]).unwrap();
        assert!(Dataset::new(x.clone(), vec![1.0], vec![0, 1], vec![0.5, 0.5]).is_err());
        assert!(Dataset::new(x.clone(), vec![1.0, 2.0], vec![0, 2], vec![0.5, 0.5]).is_err());
        assert!(Dataset::new(x.clone(), vec![1.0, 2.0], vec![0, 1], vec![0.5, 1.0]).is_err());
        assert!(Dataset::new(x.clone(), vec![1.0, 2.0], vec![0, 1], vec![0.0, 0.5]).is_err());
        assert!(Dataset::new(x, vec![1.0, f64::INFINITY], vec![0, 1], vec![0.5, 0.5]).is_err());
    }

    #[test]
    fn test_dataset_subset() {
        let ds = small_dataset();
        assert_eq!(ds.n_treated(), 2);
        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.y, vec![3.0, 1.0]);
        assert_eq!(sub.d, vec![1, 1]);
        assert_eq!(sub.x.row(0), &[5.0, 6.0]);
    }

    #[test]
    fn test_dataset_json_shared_propensity() {
        let json = r#"{"x": [[1.0], [2.0]], "y": [0.5, 1.5], "d": [0, 1], "propensity": 0.3}"#;
        let ds: Dataset = serde_json::from_str(json).unwrap();
        assert_eq!(ds.propensity, vec![0.3, 0.3]);

        let back = serde_json::to_value(&ds).unwrap();
        assert_eq!(back["x"], serde_json::json!([[1.0], [2.0]]));
        assert_eq!(back["propensity"], serde_json::json!([0.3, 0.3]));
    }

    #[test]
    fn test_dataset_json_rejects_invalid() {
        let json = r#"{"x": [[1.0], [2.0]], "y": [0.5, 1.5], "d": [0, 1], "propensity": 1.5}"#;
        assert!(serde_json::from_str::<Dataset>(json).is_err());
    }

    #[test]
    fn test_sample_split_indices() {
        use SampleRole::*;
        let split = SampleSplit { roles: vec![Main, Auxiliary, Main, Auxiliary, Auxiliary] };
        assert_eq!(split.main_indices(), vec![0, 2]);
        assert_eq!(split.auxiliary_indices(), vec![1, 3, 4]);
        assert_eq!(split.n_main(), 2);
        assert_eq!(split.n_auxiliary(), 3);
    }
}
