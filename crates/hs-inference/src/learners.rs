//! Built-in regression learners used to build the ML proxies.

use hs_core::{Error, Features, Learner, Predictor, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::linalg::spd_inverse;

#[inline]
fn validate_xy(x: &Features, y: &[f64]) -> Result<()> {
    if y.len() != x.n_rows() {
        return Err(Error::Validation(format!(
            "y has wrong length: expected n={}, got {}",
            x.n_rows(),
            y.len()
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation("y must contain only finite values".to_string()));
    }
    Ok(())
}

#[inline]
fn check_width(x: &Features, p: usize) -> Result<()> {
    if x.n_cols() != p {
        return Err(Error::Validation(format!(
            "X has {} columns, model was fit with {}",
            x.n_cols(),
            p
        )));
    }
    Ok(())
}

#[inline]
fn row_dot(x_row: &[f64], beta: &[f64]) -> f64 {
    debug_assert_eq!(x_row.len(), beta.len());
    x_row.iter().zip(beta).map(|(&x, &b)| x * b).sum()
}

// ---------------------------------------------------------------------------
// Mean
// ---------------------------------------------------------------------------

/// Predicts the training mean for every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanLearner;

#[derive(Debug, Clone)]
struct MeanPredictor {
    mean: f64,
}

impl Learner for MeanLearner {
    fn name(&self) -> &str {
        "mean"
    }

    fn fit(&self, x: &Features, y: &[f64]) -> Result<Box<dyn Predictor>> {
        validate_xy(x, y)?;
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        Ok(Box::new(MeanPredictor { mean }))
    }
}

impl Predictor for MeanPredictor {
    fn predict(&self, x: &Features) -> Result<Vec<f64>> {
        Ok(vec![self.mean; x.n_rows()])
    }
}

// ---------------------------------------------------------------------------
// Linear / ridge
// ---------------------------------------------------------------------------

/// Least squares with intercept, optionally ridge-penalised.
///
/// Solves `(ZᵀZ + λ·D) θ = Zᵀy` where `Z = [1 | X]` and `D` is the identity
/// with a zero in the intercept position.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearLearner {
    /// Ridge penalty λ ≥ 0 on the slope coefficients.
    pub ridge: f64,
}

impl LinearLearner {
    /// Ordinary least squares.
    pub fn ols() -> Self {
        Self { ridge: 0.0 }
    }

    /// Ridge regression with penalty `lambda`.
    pub fn ridge(lambda: f64) -> Self {
        Self { ridge: lambda }
    }
}

#[derive(Debug, Clone)]
struct LinearPredictor {
    intercept: f64,
    beta: Vec<f64>,
}

impl Learner for LinearLearner {
    fn name(&self) -> &str {
        if self.ridge > 0.0 { "ridge" } else { "linear" }
    }

    fn fit(&self, x: &Features, y: &[f64]) -> Result<Box<dyn Predictor>> {
        validate_xy(x, y)?;
        if !(self.ridge.is_finite() && self.ridge >= 0.0) {
            return Err(Error::Validation(format!("ridge must be >= 0, got {}", self.ridge)));
        }
        let n = x.n_rows();
        let p = x.n_cols();
        let dim = p + 1;

        let mut z = DMatrix::<f64>::zeros(n, dim);
        for i in 0..n {
            z[(i, 0)] = 1.0;
            for (j, &v) in x.row(i).iter().enumerate() {
                z[(i, j + 1)] = v;
            }
        }
        let y_vec = DVector::from_column_slice(y);

        let mut ztz = z.transpose() * &z;
        for j in 1..dim {
            ztz[(j, j)] += self.ridge;
        }
        let zty = z.transpose() * &y_vec;
        let what = format!("{} learner normal equations (n={n}, p={p})", self.name());
        let theta = spd_inverse(ztz, &what)? * zty;

        Ok(Box::new(LinearPredictor {
            intercept: theta[0],
            beta: theta.iter().skip(1).copied().collect(),
        }))
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, x: &Features) -> Result<Vec<f64>> {
        check_width(x, self.beta.len())?;
        Ok((0..x.n_rows()).map(|i| self.intercept + row_dot(x.row(i), &self.beta)).collect())
    }
}

// ---------------------------------------------------------------------------
// k-nearest neighbours
// ---------------------------------------------------------------------------

/// k-nearest-neighbour regression with Euclidean distance.
///
/// Predictions average the targets of the `k` closest training rows; equal
/// distances are resolved by training-row order. `k` is clipped to the
/// training size.
#[derive(Debug, Clone, Copy)]
pub struct KnnLearner {
    /// Number of neighbours.
    pub k: usize,
}

impl Default for KnnLearner {
    fn default() -> Self {
        Self { k: 10 }
    }
}

#[derive(Debug, Clone)]
struct KnnPredictor {
    k: usize,
    x: Features,
    y: Vec<f64>,
}

impl Learner for KnnLearner {
    fn name(&self) -> &str {
        "knn"
    }

    fn fit(&self, x: &Features, y: &[f64]) -> Result<Box<dyn Predictor>> {
        validate_xy(x, y)?;
        if self.k == 0 {
            return Err(Error::Validation("knn: k must be >= 1".to_string()));
        }
        Ok(Box::new(KnnPredictor { k: self.k.min(y.len()), x: x.clone(), y: y.to_vec() }))
    }
}

impl Predictor for KnnPredictor {
    fn predict(&self, x: &Features) -> Result<Vec<f64>> {
        check_width(x, self.x.n_cols())?;
        let n_train = self.x.n_rows();
        let mut dist: Vec<(f64, usize)> = Vec::with_capacity(n_train);
        let mut out = Vec::with_capacity(x.n_rows());
        for i in 0..x.n_rows() {
            let q = x.row(i);
            dist.clear();
            for t in 0..n_train {
                let d2: f64 = q.iter().zip(self.x.row(t)).map(|(a, b)| (a - b) * (a - b)).sum();
                dist.push((d2, t));
            }
            // (distance, index) is a total order, so ties keep training order.
            dist.select_nth_unstable_by(self.k - 1, |a, b| {
                a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
            });
            let sum: f64 = dist[..self.k].iter().map(|&(_, t)| self.y[t]).sum();
            out.push(sum / self.k as f64);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Selection from configuration
// ---------------------------------------------------------------------------

/// Learner choice as named in configuration files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearnerKind {
    /// [`MeanLearner`].
    Mean,
    /// [`LinearLearner`] without penalty.
    #[default]
    Linear,
    /// [`LinearLearner`] with ridge penalty `lambda`.
    Ridge {
        /// Penalty on the slopes.
        #[serde(default = "default_lambda")]
        lambda: f64,
    },
    /// [`KnnLearner`] with `k` neighbours.
    Knn {
        /// Number of neighbours.
        #[serde(default = "default_k")]
        k: usize,
    },
}

fn default_lambda() -> f64 {
    1.0
}

fn default_k() -> usize {
    10
}

impl LearnerKind {
    /// Instantiate the learner.
    pub fn build(&self) -> Box<dyn Learner> {
        match *self {
            LearnerKind::Mean => Box::new(MeanLearner),
            LearnerKind::Linear => Box::new(LinearLearner::ols()),
            LearnerKind::Ridge { lambda } => Box::new(LinearLearner::ridge(lambda)),
            LearnerKind::Knn { k } => Box::new(KnnLearner { k }),
        }
    }
}

impl std::str::FromStr for LearnerKind {
    type Err = Error;

    /// Parse `mean`, `linear`, `ridge[:lambda]` or `knn[:k]`.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        let bad_arg = |a: &str| Error::Validation(format!("invalid learner parameter '{a}' in '{s}'"));
        match (kind.to_ascii_lowercase().as_str(), arg) {
            ("mean", None) => Ok(LearnerKind::Mean),
            ("linear" | "ols", None) => Ok(LearnerKind::Linear),
            ("ridge", None) => Ok(LearnerKind::Ridge { lambda: default_lambda() }),
            ("ridge", Some(a)) => a.parse().map(|lambda| LearnerKind::Ridge { lambda }).map_err(|_| bad_arg(a)),
            ("knn", None) => Ok(LearnerKind::Knn { k: default_k() }),
            ("knn", Some(a)) => a.parse().map(|k| LearnerKind::Knn { k }).map_err(|_| bad_arg(a)),
            _ => Err(Error::Validation(format!(
                "unknown learner '{s}' (expected mean, linear, ridge[:lambda] or knn[:k])"
            ))),
        }
    }
}
