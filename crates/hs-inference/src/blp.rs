//! Best Linear Predictor (BLP) of the conditional average treatment effect.
//!
//! Projects the true CATE onto the ML proxy `S(X)` by the weighted regression
//!
//! `Y = α₀ + α₁·B(X) + β₁·(D − p(X)) + β₂·(D − p(X))·(S(X) − mean S) + ε`,
//!
//! with weights `1 / (p(X)(1 − p(X)))`. `β₁` is the average treatment effect
//! and `β₂` the heterogeneity loading: `β₂ = 1` when the proxy is perfect,
//! `β₂ = 0` when it carries no information about the effect.
//!
//! # References
//!
//! - Chernozhukov, Demirer, Duflo & Fernández-Val (2018), "Generic Machine
//!   Learning Inference on Heterogeneous Treatment Effects in Randomized
//!   Experiments", arXiv:1712.04802.

use hs_core::{CoefEstimate, Error, Result};
use serde::{Deserialize, Serialize};

use crate::wls::{CovarianceType, WlsFit, wls_fit};

/// Coefficient labels, in design-matrix column order.
pub const BLP_LABELS: [&str; 4] = ["const.", "b0", "ate", "het"];

const B0: usize = 1;
const ATE: usize = 2;
const HET: usize = 3;

/// Relative spread below which a proxy counts as constant.
const FLAT_PROXY_TOL: f64 = 1e-12;

/// Result of the BLP regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlpResult {
    /// Average treatment effect β₁.
    pub ate: f64,
    /// Heterogeneity loading β₂.
    pub het: f64,
    /// Full regression (labels [`BLP_LABELS`]).
    pub fit: WlsFit,
}

impl BlpResult {
    /// Inference for β₁.
    pub fn ate_estimate(&self) -> CoefEstimate {
        self.fit.coef(ATE)
    }

    /// Inference for β₂.
    pub fn het_estimate(&self) -> CoefEstimate {
        self.fit.coef(HET)
    }

    /// Inference for β₁ with a two-sided `level` interval.
    pub fn ate_estimate_at(&self, level: f64) -> Result<CoefEstimate> {
        self.fit.coef_at(ATE, level)
    }

    /// Inference for β₂ with a two-sided `level` interval.
    pub fn het_estimate_at(&self, level: f64) -> Result<CoefEstimate> {
        self.fit.coef_at(HET, level)
    }
}

fn is_flat(v: &[f64]) -> bool {
    let Some(&first) = v.first() else {
        return true;
    };
    let scale = v.iter().fold(1.0_f64, |m, x| m.max(x.abs()));
    v.iter().all(|x| (x - first).abs() <= FLAT_PROXY_TOL * scale)
}

pub(crate) fn validate_second_stage(
    y: &[f64],
    d: &[u8],
    propensity: &[f64],
    proxies: &[&[f64]],
) -> Result<()> {
    let n = y.len();
    if n == 0 {
        return Err(Error::Validation("y must be non-empty".into()));
    }
    if d.len() != n || propensity.len() != n || proxies.iter().any(|p| p.len() != n) {
        return Err(Error::Validation("All input arrays must have the same length".into()));
    }
    if d.iter().any(|&v| v > 1) {
        return Err(Error::Validation("d must be 0 or 1".into()));
    }
    if propensity.iter().any(|&p| !(p > 0.0 && p < 1.0)) {
        return Err(Error::Validation("propensity must be in (0,1)".into()));
    }
    if proxies.iter().any(|p| p.iter().any(|v| !v.is_finite())) {
        return Err(Error::Validation("proxy predictions must be finite".into()));
    }
    Ok(())
}

/// Horvitz–Thompson style weights `1 / (p(1−p))`.
#[inline]
pub(crate) fn propensity_weights(propensity: &[f64]) -> Vec<f64> {
    propensity.iter().map(|&p| 1.0 / (p * (1.0 - p))).collect()
}

/// Estimate the BLP on the main sample.
///
/// A constant proxy carries no information: a flat `b_hat` duplicates the
/// intercept and a flat `s_hat` zeroes the heterogeneity column. Such columns
/// are left out of the regression and reported with coefficient 0 and NaN
/// inference.
///
/// # Arguments
///
/// - `y` — outcome.
/// - `d` — treatment indicator (0/1).
/// - `propensity` — treatment propensity p(X).
/// - `b_hat` — baseline proxy B(X).
/// - `s_hat` — treatment-effect proxy S(X).
/// - `cov_type` — covariance estimator for the regression.
pub fn blp(
    y: &[f64],
    d: &[u8],
    propensity: &[f64],
    b_hat: &[f64],
    s_hat: &[f64],
    cov_type: CovarianceType,
) -> Result<BlpResult> {
    validate_second_stage(y, d, propensity, &[b_hat, s_hat])?;
    let n = y.len();

    let flat_b = is_flat(b_hat);
    let flat_s = is_flat(s_hat);
    let kept: Vec<usize> = (0..BLP_LABELS.len())
        .filter(|&j| !(j == B0 && flat_b) && !(j == HET && flat_s))
        .collect();

    let s_mean = s_hat.iter().sum::<f64>() / n as f64;
    let mut x = Vec::with_capacity(n * kept.len());
    for i in 0..n {
        let resid_d = d[i] as f64 - propensity[i];
        let row = [1.0, b_hat[i], resid_d, resid_d * (s_hat[i] - s_mean)];
        x.extend(kept.iter().map(|&j| row[j]));
    }
    let weights = propensity_weights(propensity);
    let names: Vec<String> = BLP_LABELS.iter().map(|s| s.to_string()).collect();
    let kept_names: Vec<String> = kept.iter().map(|&j| names[j].clone()).collect();

    let mut fit = wls_fit(y, &x, kept.len(), &weights, &kept_names, cov_type)?;
    if kept.len() < BLP_LABELS.len() {
        log::warn!(
            "blp: constant proxy (b_hat flat: {flat_b}, s_hat flat: {flat_s}); coefficient set to 0"
        );
        fit = fit.expand(&kept, &names);
    }
    log::debug!("blp: n={} ate={:.4} het={:.4}", n, fit.params[ATE], fit.params[HET]);

    Ok(BlpResult { ate: fit.params[ATE], het: fit.params[HET], fit })
}
