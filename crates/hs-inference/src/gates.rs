//! Group Average Treatment Effects (GATES).
//!
//! Observations are sorted into `q` equal-frequency groups by the
//! treatment-effect proxy `S(X)`. The weighted regression
//!
//! `Y = Σₖ αₖ·1[Gₖ] + Σₖ γₖ·1[Gₖ]·(D − p(X)) + ε`, weights `1 / (p(1 − p))`,
//!
//! gives per-group baselines `αₖ` and group average treatment effects `γₖ`.
//! If the proxy carries signal, `γₖ` increases with `k`; the difference
//! `γ_q − γ_1` is reported with its own test.

use hs_core::{CoefEstimate, Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::blp::{propensity_weights, validate_second_stage};
use crate::quantile::quantile_grid;
use crate::wls::{CovarianceType, WlsFit, wls_fit};

/// Relative size of the jitter that breaks ties in `S(X)` before grouping.
const TIE_BREAK_SCALE: f64 = 1e-9;

/// Result of the GATES regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatesResult {
    /// Per-group baselines `αₖ` (lowest proxy group first).
    pub coef_baseline: Vec<f64>,
    /// Per-group average treatment effects `γₖ`.
    pub coef_treatment: Vec<f64>,
    /// Left edge of each group on the proxy scale.
    pub bin_values: Vec<f64>,
    /// Percentile (0..100) of each left edge.
    pub bin_pct: Vec<f64>,
    /// Observations per group.
    pub bin_count: Vec<usize>,
    /// `γ_q − γ_1` with standard error, test and 95% CI.
    pub top_minus_bottom: CoefEstimate,
    /// Full regression: `q` baseline coefficients followed by `q` treatment coefficients.
    pub fit: WlsFit,
}

impl GatesResult {
    /// Number of groups.
    pub fn n_groups(&self) -> usize {
        self.coef_treatment.len()
    }

    /// Inference for `γₖ`.
    pub fn treatment_estimate(&self, k: usize) -> CoefEstimate {
        self.fit.coef(self.n_groups() + k)
    }

    /// Inference for `γₖ` with a two-sided `level` interval.
    pub fn treatment_estimate_at(&self, k: usize, level: f64) -> Result<CoefEstimate> {
        self.fit.coef_at(self.n_groups() + k, level)
    }

    /// `γ_q − γ_1` with a two-sided `level` interval.
    pub fn top_minus_bottom_at(&self, level: f64) -> Result<CoefEstimate> {
        self.fit.contrast_at(TOP_MINUS_BOTTOM, &top_minus_bottom_weights(self.n_groups()), level)
    }
}

const TOP_MINUS_BOTTOM: &str = "Treatment: top - bottom";

/// Contrast weights picking `γ_q − γ_1` out of `[α₁..α_q, γ₁..γ_q]`.
fn top_minus_bottom_weights(q: usize) -> Vec<f64> {
    let mut c = vec![0.0; 2 * q];
    c[q] -= 1.0;
    c[2 * q - 1] += 1.0;
    c
}

/// Estimate GATES on the main sample.
///
/// # Arguments
///
/// - `y` — outcome.
/// - `d` — treatment indicator (0/1).
/// - `propensity` — treatment propensity p(X).
/// - `s_hat` — treatment-effect proxy S(X).
/// - `q` — number of groups.
/// - `cov_type` — covariance estimator for the regression.
/// - `rng` — source of the tie-breaking jitter.
pub fn gates<R: Rng + ?Sized>(
    y: &[f64],
    d: &[u8],
    propensity: &[f64],
    s_hat: &[f64],
    q: usize,
    cov_type: CovarianceType,
    rng: &mut R,
) -> Result<GatesResult> {
    validate_second_stage(y, d, propensity, &[s_hat])?;
    if q == 0 {
        return Err(Error::Validation("number of groups q must be >= 1".into()));
    }
    let n = y.len();

    let scale = s_hat.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0) * TIE_BREAK_SCALE;
    let jittered: Vec<f64> = s_hat.iter().map(|&s| s + scale * rng.random::<f64>()).collect();
    let grid = quantile_grid(&jittered, q)?;

    let mut bin_count = vec![0usize; q];
    for &k in &grid.bin_indices {
        bin_count[k] += 1;
    }
    if let Some(empty) = bin_count.iter().position(|&c| c == 0) {
        return Err(Error::Validation(format!(
            "GATES group {} of {} is empty (n={}); use fewer groups",
            empty + 1,
            q,
            n
        )));
    }

    let k_total = 2 * q;
    let mut x = vec![0.0; n * k_total];
    for i in 0..n {
        let g = grid.bin_indices[i];
        x[i * k_total + g] = 1.0;
        x[i * k_total + q + g] = d[i] as f64 - propensity[i];
    }

    let mut names = Vec::with_capacity(k_total);
    for prefix in ["Baseline", "Treatment"] {
        for (p, e) in grid.bin_pct.iter().zip(&grid.bin_edges) {
            names.push(format!("{prefix}: p={:.2} ({:.2})", p / 100.0, e));
        }
    }

    let weights = propensity_weights(propensity);
    let fit = wls_fit(y, &x, k_total, &weights, &names, cov_type)?;

    let top_minus_bottom = fit.contrast(TOP_MINUS_BOTTOM, &top_minus_bottom_weights(q))?;

    log::debug!("gates: n={} q={} counts={:?}", n, q, bin_count);

    Ok(GatesResult {
        coef_baseline: fit.params[..q].to_vec(),
        coef_treatment: fit.params[q..].to_vec(),
        bin_values: grid.bin_edges,
        bin_pct: grid.bin_pct,
        bin_count,
        top_minus_bottom,
        fit,
    })
}
