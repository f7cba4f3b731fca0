//! Weighted least squares with classical and heteroskedasticity-robust
//! inference.
//!
//! Both second-stage estimators (BLP and GATES) are WLS regressions with
//! weights `1 / (p(1-p))`. The fit reports the same quantities as a
//! conventional regression summary: coefficients, standard errors,
//! t statistics, two-sided p-values and 95% confidence intervals.
//!
//! # References
//!
//! - White (1980), "A heteroskedasticity-consistent covariance matrix estimator."
//! - MacKinnon & White (1985), HC1 small-sample correction `n / (n - k)`.

use std::fmt::Write as _;

use hs_core::{CoefEstimate, Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::linalg::spd_inverse;

/// Covariance estimator for the coefficient vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceType {
    /// `σ² (XᵀWX)⁻¹` with `σ² = Σ wᵢeᵢ² / (n − k)`.
    #[default]
    NonRobust,
    /// HC1 sandwich: `n/(n−k) · B (Σ wᵢ²eᵢ² xᵢxᵢᵀ) B`, `B = (XᵀWX)⁻¹`.
    Hc1,
}

impl CovarianceType {
    /// Short label used in summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            CovarianceType::NonRobust => "nonrobust",
            CovarianceType::Hc1 => "HC1",
        }
    }
}

/// Result of a weighted least-squares fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WlsFit {
    /// Coefficient labels.
    pub names: Vec<String>,
    /// Coefficient estimates.
    pub params: Vec<f64>,
    /// Standard errors.
    pub std_errors: Vec<f64>,
    /// t statistics.
    pub t_values: Vec<f64>,
    /// Two-sided p-values (Student-t with `df_resid` degrees of freedom).
    pub p_values: Vec<f64>,
    /// 95% confidence intervals.
    pub conf_int: Vec<(f64, f64)>,
    /// Coefficient covariance matrix (row-major, k×k).
    pub covariance: Vec<f64>,
    /// Weighted, centered R².
    pub r_squared: f64,
    /// Weighted residual sum of squares.
    pub ssr: f64,
    /// Number of observations.
    pub n_obs: usize,
    /// Residual degrees of freedom (`n − k`).
    pub df_resid: usize,
    /// Covariance estimator used.
    pub cov_type: CovarianceType,
}

/// Student's t(df) distribution. `df > 0` is checked by callers.
#[inline]
fn t_dist(df: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, df)
        .map_err(|e| Error::Computation(format!("invalid t distribution (df={df}): {e}")))
}

/// Two-sided p-value for a t statistic. Degenerate standard errors yield
/// infinite (p = 0) or NaN statistics.
fn two_sided_p(t: f64, dist: &StudentsT) -> f64 {
    if t.is_nan() {
        f64::NAN
    } else if t.is_infinite() {
        0.0
    } else {
        (2.0 * dist.sf(t.abs())).min(1.0)
    }
}

fn t_stat(estimate: f64, se: f64) -> f64 {
    if se > 0.0 {
        estimate / se
    } else if estimate != 0.0 {
        estimate.signum() * f64::INFINITY
    } else {
        f64::NAN
    }
}

/// Fit `y ~ X` by weighted least squares.
///
/// # Arguments
///
/// - `y` — dependent variable (length n).
/// - `x` — regressors, row-major (n × k). Include a constant column if desired.
/// - `k` — number of regressor columns.
/// - `weights` — positive, finite observation weights (length n).
/// - `names` — coefficient labels; generated as `x0..` if the length does not match `k`.
/// - `cov_type` — covariance estimator.
pub fn wls_fit(
    y: &[f64],
    x: &[f64],
    k: usize,
    weights: &[f64],
    names: &[String],
    cov_type: CovarianceType,
) -> Result<WlsFit> {
    let n = y.len();
    if n == 0 {
        return Err(Error::Validation("y must be non-empty".into()));
    }
    if k == 0 {
        return Err(Error::Validation("X must have at least 1 column".into()));
    }
    if x.len() != n * k {
        return Err(Error::Validation(format!("x length ({}) != n*k ({})", x.len(), n * k)));
    }
    if weights.len() != n {
        return Err(Error::Validation(format!(
            "weights length ({}) != n ({})",
            weights.len(),
            n
        )));
    }
    if weights.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
        return Err(Error::Validation("weights must be positive and finite".into()));
    }
    if n <= k {
        return Err(Error::Validation(format!(
            "need more observations than regressors: n={n}, k={k}"
        )));
    }

    let x_mat = DMatrix::from_row_slice(n, k, x);
    let y_vec = DVector::from_column_slice(y);

    // Whitened system: rows scaled by sqrt(w).
    let mut xw = x_mat.clone();
    let mut yw = y_vec.clone();
    for i in 0..n {
        let s = weights[i].sqrt();
        for j in 0..k {
            xw[(i, j)] *= s;
        }
        yw[i] *= s;
    }

    let xtwx = xw.transpose() * &xw;
    let bread = spd_inverse(xtwx, "X'WX")?;
    let beta = &bread * (xw.transpose() * &yw);

    let resid = &y_vec - &x_mat * &beta;
    let ssr: f64 = resid.iter().zip(weights).map(|(e, w)| w * e * e).sum();
    let df_resid = n - k;

    let cov = match cov_type {
        CovarianceType::NonRobust => &bread * (ssr / df_resid as f64),
        CovarianceType::Hc1 => {
            let mut meat = DMatrix::<f64>::zeros(k, k);
            for i in 0..n {
                let xi = x_mat.row(i).transpose();
                let u = weights[i] * resid[i];
                meat += (&xi * xi.transpose()) * (u * u);
            }
            (&bread * meat * &bread) * (n as f64 / df_resid as f64)
        }
    };

    let sum_w: f64 = weights.iter().sum();
    let y_bar_w = y.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / sum_w;
    let tss: f64 = y.iter().zip(weights).map(|(v, w)| w * (v - y_bar_w).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - ssr / tss } else { 0.0 };

    let dist = t_dist(df_resid as f64)?;
    let t_crit = dist.inverse_cdf(0.975);

    let params: Vec<f64> = beta.iter().copied().collect();
    let std_errors: Vec<f64> = (0..k).map(|j| cov[(j, j)].max(0.0).sqrt()).collect();
    let t_values: Vec<f64> = params.iter().zip(&std_errors).map(|(&b, &se)| t_stat(b, se)).collect();
    let p_values: Vec<f64> = t_values.iter().map(|&t| two_sided_p(t, &dist)).collect();
    let conf_int: Vec<(f64, f64)> = params
        .iter()
        .zip(&std_errors)
        .map(|(&b, &se)| (b - t_crit * se, b + t_crit * se))
        .collect();

    let mut covariance = Vec::with_capacity(k * k);
    for i in 0..k {
        for j in 0..k {
            covariance.push(cov[(i, j)]);
        }
    }

    let names = if names.len() == k {
        names.to_vec()
    } else {
        (0..k).map(|j| format!("x{j}")).collect()
    };

    Ok(WlsFit {
        names,
        params,
        std_errors,
        t_values,
        p_values,
        conf_int,
        covariance,
        r_squared,
        ssr,
        n_obs: n,
        df_resid,
        cov_type,
    })
}

impl WlsFit {
    /// Number of coefficients.
    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    /// Covariance element (i, j).
    #[inline]
    pub fn cov(&self, i: usize, j: usize) -> f64 {
        self.covariance[i * self.n_params() + j]
    }

    /// Inference summary for coefficient `i`.
    pub fn coef(&self, i: usize) -> CoefEstimate {
        CoefEstimate {
            name: self.names[i].clone(),
            estimate: self.params[i],
            std_error: self.std_errors[i],
            t_value: self.t_values[i],
            p_value: self.p_values[i],
            ci_lower: self.conf_int[i].0,
            ci_upper: self.conf_int[i].1,
        }
    }

    /// Inference summary for the coefficient labelled `name`.
    pub fn coef_by_name(&self, name: &str) -> Option<CoefEstimate> {
        self.names.iter().position(|n| n == name).map(|i| self.coef(i))
    }

    /// Inference for coefficient `i` with a two-sided `level` confidence interval.
    pub fn coef_at(&self, i: usize, level: f64) -> Result<CoefEstimate> {
        let half = self.t_critical(level)? * self.std_errors[i];
        let est = self.coef(i);
        Ok(CoefEstimate { ci_lower: est.estimate - half, ci_upper: est.estimate + half, ..est })
    }

    /// Inference for the linear combination `cᵀβ`, `Var = cᵀVc`, with a 95% interval.
    pub fn contrast(&self, name: &str, c: &[f64]) -> Result<CoefEstimate> {
        self.contrast_at(name, c, 0.95)
    }

    /// As [`WlsFit::contrast`], with a two-sided `level` confidence interval.
    pub fn contrast_at(&self, name: &str, c: &[f64], level: f64) -> Result<CoefEstimate> {
        let k = self.n_params();
        if c.len() != k {
            return Err(Error::Validation(format!(
                "contrast length ({}) != number of coefficients ({})",
                c.len(),
                k
            )));
        }
        let estimate: f64 = c.iter().zip(&self.params).map(|(a, b)| a * b).sum();
        let mut var = 0.0;
        for i in 0..k {
            for j in 0..k {
                if c[i] != 0.0 && c[j] != 0.0 {
                    var += c[i] * self.cov(i, j) * c[j];
                }
            }
        }
        let std_error = if var.is_nan() { f64::NAN } else { var.max(0.0).sqrt() };
        let t_crit = self.t_critical(level)?;
        let t_value = t_stat(estimate, std_error);
        Ok(CoefEstimate {
            name: name.to_string(),
            estimate,
            std_error,
            t_value,
            p_value: two_sided_p(t_value, &t_dist(self.df_resid as f64)?),
            ci_lower: estimate - t_crit * std_error,
            ci_upper: estimate + t_crit * std_error,
        })
    }

    fn t_critical(&self, level: f64) -> Result<f64> {
        if !(level > 0.0 && level < 1.0) {
            return Err(Error::Validation(format!("confidence level must be in (0,1), got {level}")));
        }
        Ok(t_dist(self.df_resid as f64)?.inverse_cdf(0.5 + level / 2.0))
    }

    /// Re-express a fit on columns `kept` of a wider design labelled `names`.
    ///
    /// Columns left out are reported with estimate 0 and NaN inference, the
    /// minimum-norm answer for a regressor with no variation.
    pub(crate) fn expand(self, kept: &[usize], names: &[String]) -> WlsFit {
        let k_full = names.len();
        let mut params = vec![0.0; k_full];
        let mut std_errors = vec![f64::NAN; k_full];
        let mut t_values = vec![f64::NAN; k_full];
        let mut p_values = vec![f64::NAN; k_full];
        let mut conf_int = vec![(f64::NAN, f64::NAN); k_full];
        let mut covariance = vec![f64::NAN; k_full * k_full];
        for (r, &j) in kept.iter().enumerate() {
            params[j] = self.params[r];
            std_errors[j] = self.std_errors[r];
            t_values[j] = self.t_values[r];
            p_values[j] = self.p_values[r];
            conf_int[j] = self.conf_int[r];
            for (r2, &j2) in kept.iter().enumerate() {
                covariance[j * k_full + j2] = self.cov(r, r2);
            }
        }
        WlsFit {
            names: names.to_vec(),
            params,
            std_errors,
            t_values,
            p_values,
            conf_int,
            covariance,
            ..self
        }
    }

    /// Plain-text regression table.
    pub fn summary(&self) -> String {
        let name_w = self.names.iter().map(|s| s.len()).max().unwrap_or(0).max(10);
        let width = name_w + 66;
        let rule_eq = "=".repeat(width);
        let rule_dash = "-".repeat(width);

        let mut out = String::new();
        let _ = writeln!(out, "{:^width$}", "WLS Regression Results");
        let _ = writeln!(out, "{rule_eq}");
        let _ = writeln!(
            out,
            "{:<22}{:>10}    {:<18}{:>10.4}",
            "No. Observations:", self.n_obs, "R-squared:", self.r_squared
        );
        let _ = writeln!(
            out,
            "{:<22}{:>10}    {:<18}{:>10}",
            "Df Residuals:",
            self.df_resid,
            "Covariance Type:",
            self.cov_type.as_str()
        );
        let _ = writeln!(out, "{rule_eq}");
        let _ = writeln!(
            out,
            "{:<name_w$} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
        );
        let _ = writeln!(out, "{rule_dash}");
        for i in 0..self.n_params() {
            let _ = writeln!(
                out,
                "{:<name_w$} {:>10.4} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
                self.names[i],
                self.params[i],
                self.std_errors[i],
                self.t_values[i],
                self.p_values[i],
                self.conf_int[i].0,
                self.conf_int[i].1
            );
        }
        let _ = writeln!(out, "{rule_eq}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_wls_exact_fit() {
        // y = 1 + 2x, no noise: any weights recover the line.
        let n = 20;
        let mut x = Vec::with_capacity(2 * n);
        let mut y = Vec::with_capacity(n);
        let mut w = Vec::with_capacity(n);
        for i in 0..n {
            let xi = i as f64 * 0.5;
            x.extend_from_slice(&[1.0, xi]);
            y.push(1.0 + 2.0 * xi);
            w.push(1.0 + (i % 3) as f64);
        }
        let fit = wls_fit(&y, &x, 2, &w, &names(&["const", "x"]), CovarianceType::NonRobust)
            .unwrap();
        assert_relative_eq!(fit.params[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(fit.params[1], 2.0, epsilon = 1e-10);
        assert!(fit.ssr < 1e-18);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert_eq!(fit.df_resid, n - 2);
    }

    #[test]
    fn test_wls_matches_closed_form_weighted_mean() {
        // Intercept-only WLS is the weighted mean; SE = sqrt(σ² / Σw).
        let y = [1.0, 2.0, 4.0, 7.0];
        let w = [1.0, 2.0, 1.0, 4.0];
        let x = [1.0; 4];
        let fit = wls_fit(&y, &x, 1, &w, &names(&["const"]), CovarianceType::NonRobust).unwrap();

        let sw: f64 = w.iter().sum();
        let mean = y.iter().zip(&w).map(|(a, b)| a * b).sum::<f64>() / sw;
        assert_relative_eq!(fit.params[0], mean, epsilon = 1e-12);

        let ssr: f64 = y.iter().zip(&w).map(|(v, wi)| wi * (v - mean).powi(2)).sum();
        let se = (ssr / 3.0 / sw).sqrt();
        assert_relative_eq!(fit.std_errors[0], se, epsilon = 1e-12);
        assert_relative_eq!(fit.ssr, ssr, epsilon = 1e-12);
    }

    #[test]
    fn test_wls_ols_inference_known_values() {
        // OLS slope on x=[1..5], y=[1,3,2,5,4]: beta=0.8, se=sqrt(0.3)... via textbook formulas.
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let mut x = Vec::new();
        for &v in &xs {
            x.extend_from_slice(&[1.0, v]);
        }
        let fit = wls_fit(&y, &x, 2, &[1.0; 5], &[], CovarianceType::NonRobust).unwrap();
        assert_eq!(fit.names, names(&["x0", "x1"]));
        assert_relative_eq!(fit.params[1], 0.8, epsilon = 1e-12);
        assert_relative_eq!(fit.params[0], 0.6, epsilon = 1e-12);

        // SSR = 3.6, σ² = 1.2, Sxx = 10 → se(slope) = sqrt(0.12)
        assert_relative_eq!(fit.ssr, 3.6, epsilon = 1e-12);
        assert_relative_eq!(fit.std_errors[1], 0.12_f64.sqrt(), epsilon = 1e-12);
        let t = 0.8 / 0.12_f64.sqrt();
        assert_relative_eq!(fit.t_values[1], t, epsilon = 1e-10);
        // t(3) two-sided p for t≈2.309 is ≈ 0.104
        assert!((fit.p_values[1] - 0.104).abs() < 0.002, "p={}", fit.p_values[1]);
        let (lo, hi) = fit.conf_int[1];
        assert!(lo < 0.0 && hi > 0.8);
    }

    #[test]
    fn test_wls_hc1_differs_but_is_finite() {
        let n = 40;
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let xi = i as f64 / 10.0;
            x.extend_from_slice(&[1.0, xi]);
            // heteroskedastic deterministic "noise"
            let e = if i % 2 == 0 { xi } else { -xi };
            y.push(0.5 + xi + e);
        }
        let w = vec![1.0; n];
        let classic = wls_fit(&y, &x, 2, &w, &[], CovarianceType::NonRobust).unwrap();
        let robust = wls_fit(&y, &x, 2, &w, &[], CovarianceType::Hc1).unwrap();
        assert_relative_eq!(classic.params[1], robust.params[1], epsilon = 1e-12);
        assert!(robust.std_errors.iter().all(|s| s.is_finite() && *s > 0.0));
        assert!((classic.std_errors[1] - robust.std_errors[1]).abs() > 1e-6);
        assert_eq!(robust.cov_type, CovarianceType::Hc1);
    }

    #[test]
    fn test_wls_singular_design() {
        // Two identical columns.
        let x = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let res = wls_fit(&[1.0, 2.0, 3.0], &x, 2, &[1.0; 3], &[], CovarianceType::NonRobust);
        assert!(matches!(res, Err(Error::Computation(_))));
    }

    #[test]
    fn test_wls_validation() {
        let nr = CovarianceType::NonRobust;
        assert!(wls_fit(&[], &[], 1, &[], &[], nr).is_err());
        assert!(wls_fit(&[1.0, 2.0], &[1.0], 1, &[1.0, 1.0], &[], nr).is_err());
        assert!(wls_fit(&[1.0, 2.0], &[1.0, 1.0], 1, &[1.0], &[], nr).is_err());
        assert!(wls_fit(&[1.0, 2.0], &[1.0, 1.0], 1, &[1.0, -1.0], &[], nr).is_err());
        // n <= k
        assert!(wls_fit(&[1.0], &[1.0], 1, &[1.0], &[], nr).is_err());
    }

    #[test]
    fn test_contrast_matches_coefficient_difference() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [2.0, 2.5, 3.9, 4.1, 6.2, 5.8];
        let mut x = Vec::new();
        for &v in &xs {
            x.extend_from_slice(&[1.0, v]);
        }
        let fit = wls_fit(&y, &x, 2, &[1.0; 6], &[], CovarianceType::NonRobust).unwrap();

        let single = fit.contrast("slope", &[0.0, 1.0]).unwrap();
        assert_relative_eq!(single.estimate, fit.params[1], epsilon = 1e-12);
        assert_relative_eq!(single.std_error, fit.std_errors[1], epsilon = 1e-12);
        assert_relative_eq!(single.p_value, fit.p_values[1], epsilon = 1e-12);

        let diff = fit.contrast("diff", &[-1.0, 1.0]).unwrap();
        let var = fit.cov(0, 0) + fit.cov(1, 1) - 2.0 * fit.cov(0, 1);
        assert_relative_eq!(diff.std_error, var.sqrt(), epsilon = 1e-12);
        assert!(fit.contrast("bad", &[1.0]).is_err());
    }

    #[test]
    fn test_summary_contains_labels() {
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let x = [1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 1.0, 4.0, 1.0, 5.0];
        let fit = wls_fit(&y, &x, 2, &[1.0; 5], &names(&["const.", "slope"]), CovarianceType::Hc1)
            .unwrap();
        let table = fit.summary();
        assert!(table.contains("WLS Regression Results"));
        assert!(table.contains("const."));
        assert!(table.contains("slope"));
        assert!(table.contains("HC1"));
        assert!(table.contains("P>|t|"));
        assert_eq!(fit.coef_by_name("slope").unwrap().estimate, fit.params[1]);
        assert!(fit.coef_by_name("missing").is_none());
    }

    #[test]
    fn test_interval_level() {
        let y = [2.0, 2.5, 3.9, 4.1, 6.2, 5.8];
        let x = [1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 1.0, 4.0, 1.0, 5.0, 1.0, 6.0];
        let fit = wls_fit(&y, &x, 2, &[1.0; 6], &[], CovarianceType::NonRobust).unwrap();

        let c95 = fit.coef_at(1, 0.95).unwrap();
        assert_relative_eq!(c95.ci_lower, fit.conf_int[1].0, epsilon = 1e-12);
        assert_relative_eq!(c95.ci_upper, fit.conf_int[1].1, epsilon = 1e-12);

        let c975 = fit.coef_at(1, 0.975).unwrap();
        assert!(c975.ci_lower < c95.ci_lower && c975.ci_upper > c95.ci_upper);
        assert_eq!(c975.p_value, c95.p_value);

        let k975 = fit.contrast_at("slope", &[0.0, 1.0], 0.975).unwrap();
        assert_relative_eq!(k975.ci_lower, c975.ci_lower, epsilon = 1e-12);
        assert!(fit.coef_at(1, 1.0).is_err());
        assert!(fit.coef_at(1, 0.0).is_err());
    }

    #[test]
    fn test_expand_marks_dropped_columns() {
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let x = [1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 1.0, 4.0, 1.0, 5.0];
        let fit = wls_fit(&y, &x, 2, &[1.0; 5], &[], CovarianceType::NonRobust).unwrap();
        let slope = fit.params[1];
        let slope_var = fit.cov(1, 1);

        let full = fit.expand(&[0, 2], &names(&["const", "flat", "slope"]));
        assert_eq!(full.n_params(), 3);
        assert_eq!(full.params[1], 0.0);
        assert!(full.std_errors[1].is_nan() && full.p_values[1].is_nan());
        assert!(full.cov(1, 1).is_nan() && full.cov(0, 1).is_nan());
        assert_eq!(full.params[2], slope);
        assert_eq!(full.cov(2, 2), slope_var);

        // Contrasts that avoid the dropped column stay finite.
        let c = full.contrast("slope", &[0.0, 0.0, 1.0]).unwrap();
        assert_relative_eq!(c.std_error, slope_var.sqrt(), epsilon = 1e-12);
        assert!(full.summary().contains("flat"));
    }
}
