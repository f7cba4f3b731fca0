//! End-to-end generic ML inference: split → proxies → BLP or GATES.
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────┐   ┌──────────────────────┐
//! │ partition    │──▶│ ml_proxy (auxiliary)  │──▶│ blp / gates (main)   │
//! │ stratified   │   │ b_hat, s_hat, all rows│   │ WLS, 1/(p(1-p))      │
//! └──────────────┘   └───────────────────────┘   └──────────────────────┘
//! ```
//!
//! A single split is noisy. [`repeated_combine`] runs many independent
//! splits in parallel (Rayon; split `s` uses seed `seed + s`) and reports
//! medians across splits, with the split-adjusted p-value `min(1, 2·median p)`.

use std::fmt;
use std::str::FromStr;

use hs_core::{CoefEstimate, Dataset, Error, Learner, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::blp::{BlpResult, blp};
use crate::gates::{GatesResult, gates};
use crate::proxy::ml_proxy;
use crate::quantile::median;
use crate::split::partition;
use crate::wls::CovarianceType;

/// Second-stage estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondStage {
    /// Best Linear Predictor.
    #[default]
    Blp,
    /// Group Average Treatment Effects.
    Gates,
}

impl FromStr for SecondStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "blp" => Ok(SecondStage::Blp),
            "gates" => Ok(SecondStage::Gates),
            other => Err(Error::Validation(format!(
                "second_stage must be \"blp\" or \"gates\", got \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for SecondStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecondStage::Blp => write!(f, "blp"),
            SecondStage::Gates => write!(f, "gates"),
        }
    }
}

/// Configuration of a generic ML run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericMlConfig {
    /// Second-stage estimator.
    #[serde(default)]
    pub second_stage: SecondStage,
    /// Number of GATES groups (ignored for BLP).
    #[serde(default = "default_groups")]
    pub groups: usize,
    /// Share of each treatment arm assigned to the main sample.
    #[serde(default = "default_main_fraction")]
    pub main_fraction: f64,
    /// Covariance estimator for the second-stage regression.
    #[serde(default)]
    pub covariance: CovarianceType,
    /// Base RNG seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of independent sample splits.
    #[serde(default = "default_n_splits")]
    pub n_splits: usize,
}

fn default_groups() -> usize {
    10
}

fn default_main_fraction() -> f64 {
    0.5
}

fn default_seed() -> u64 {
    42
}

fn default_n_splits() -> usize {
    1
}

impl Default for GenericMlConfig {
    fn default() -> Self {
        Self {
            second_stage: SecondStage::default(),
            groups: default_groups(),
            main_fraction: default_main_fraction(),
            covariance: CovarianceType::default(),
            seed: default_seed(),
            n_splits: default_n_splits(),
        }
    }
}

/// Second-stage output of one sample split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SplitEstimate {
    /// BLP output.
    Blp(BlpResult),
    /// GATES output.
    Gates(GatesResult),
}

/// Per-split confidence level. The median of `1 − α/2` bounds across splits
/// is a `1 − α` interval, matching the `min(1, 2·median p)` adjustment
/// (Chernozhukov et al., 2018, §4).
pub const SPLIT_CI_LEVEL: f64 = 0.975;

impl SplitEstimate {
    /// Coefficients reported across splits, under split-stable names, with
    /// 95% intervals.
    ///
    /// BLP: `ate`, `het`. GATES: `gamma_1..gamma_q`, `top_minus_bottom`.
    pub fn headline(&self) -> Vec<CoefEstimate> {
        match self {
            SplitEstimate::Blp(r) => vec![r.ate_estimate(), r.het_estimate()],
            SplitEstimate::Gates(r) => {
                let mut out: Vec<CoefEstimate> = (0..r.n_groups())
                    .map(|k| CoefEstimate { name: gamma_name(k), ..r.treatment_estimate(k) })
                    .collect();
                out.push(CoefEstimate { name: "top_minus_bottom".to_string(), ..r.top_minus_bottom.clone() });
                out
            }
        }
    }

    /// [`SplitEstimate::headline`] with two-sided `level` intervals.
    pub fn headline_at(&self, level: f64) -> Result<Vec<CoefEstimate>> {
        match self {
            SplitEstimate::Blp(r) => Ok(vec![r.ate_estimate_at(level)?, r.het_estimate_at(level)?]),
            SplitEstimate::Gates(r) => {
                let mut out = Vec::with_capacity(r.n_groups() + 1);
                for k in 0..r.n_groups() {
                    out.push(CoefEstimate { name: gamma_name(k), ..r.treatment_estimate_at(k, level)? });
                }
                out.push(CoefEstimate { name: "top_minus_bottom".to_string(), ..r.top_minus_bottom_at(level)? });
                Ok(out)
            }
        }
    }

    /// Regression summary table of this split.
    pub fn summary(&self) -> String {
        match self {
            SplitEstimate::Blp(r) => r.fit.summary(),
            SplitEstimate::Gates(r) => r.fit.summary(),
        }
    }
}

fn gamma_name(k: usize) -> String {
    format!("gamma_{}", k + 1)
}

/// Run one split: partition, fit proxies on the auxiliary sample, estimate
/// on the main sample.
pub fn combine<R: Rng + ?Sized>(
    learner: &dyn Learner,
    data: &Dataset,
    config: &GenericMlConfig,
    rng: &mut R,
) -> Result<SplitEstimate> {
    let split = partition(&data.d, config.main_fraction, rng)?;
    let proxies = ml_proxy(learner, data, &split)?;

    let main_idx = split.main_indices();
    let main = data.subset(&main_idx);
    let on_main = |v: &[f64]| main_idx.iter().map(|&i| v[i]).collect::<Vec<f64>>();
    let s_hat = on_main(&proxies.effect);

    match config.second_stage {
        SecondStage::Blp => {
            let b_hat = on_main(&proxies.baseline);
            blp(&main.y, &main.d, &main.propensity, &b_hat, &s_hat, config.covariance).map(SplitEstimate::Blp)
        }
        SecondStage::Gates => gates(&main.y, &main.d, &main.propensity, &s_hat, config.groups, config.covariance, rng)
            .map(SplitEstimate::Gates),
    }
}

/// A coefficient aggregated over sample splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCoef {
    /// Coefficient name (see [`SplitEstimate::headline`]).
    pub name: String,
    /// Median point estimate.
    pub estimate: f64,
    /// Median of the per-split lower bounds at [`SPLIT_CI_LEVEL`]: a 95% bound.
    pub ci_lower: f64,
    /// Median of the per-split upper bounds at [`SPLIT_CI_LEVEL`]: a 95% bound.
    pub ci_upper: f64,
    /// `min(1, 2 · median p)`.
    pub p_value: f64,
    /// Number of splits contributing.
    pub n_splits: usize,
}

/// Output of [`repeated_combine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatedEstimate {
    /// Estimator used.
    pub second_stage: SecondStage,
    /// Learner name.
    pub learner: String,
    /// Splits requested.
    pub n_splits: usize,
    /// Splits that produced an estimate.
    pub n_splits_ok: usize,
    /// Aggregated headline coefficients.
    pub aggregate: Vec<AggregatedCoef>,
    /// Per-split estimates, in split order (failed splits omitted).
    pub splits: Vec<SplitEstimate>,
}

/// Median aggregation of per-split headline coefficients.
///
/// The interval and the adjusted p-value agree: `ci_lower > 0` or
/// `ci_upper < 0` exactly when `p_value < 0.05` for a single split.
pub fn aggregate_splits(splits: &[SplitEstimate]) -> Result<Vec<AggregatedCoef>> {
    let headlines = splits.iter().map(|s| s.headline_at(SPLIT_CI_LEVEL)).collect::<Result<Vec<_>>>()?;
    let Some(first) = headlines.first() else {
        return Ok(Vec::new());
    };

    Ok((0..first.len())
        .map(|j| {
            let col: Vec<&CoefEstimate> = headlines.iter().filter_map(|h| h.get(j)).collect();
            let med = |f: fn(&CoefEstimate) -> f64| median(&col.iter().map(|c| f(c)).collect::<Vec<_>>());
            let p = 2.0 * med(|c| c.p_value);
            AggregatedCoef {
                name: first[j].name.clone(),
                estimate: med(|c| c.estimate),
                ci_lower: med(|c| c.ci_lower),
                ci_upper: med(|c| c.ci_upper),
                // Unidentified coefficients keep NaN.
                p_value: if p.is_nan() { p } else { p.min(1.0) },
                n_splits: col.len(),
            }
        })
        .collect())
}

/// Run `config.n_splits` independent splits in parallel and aggregate.
///
/// Failing splits are logged and skipped; if every split fails the first
/// error is returned as a `Computation` error.
pub fn repeated_combine(
    learner: &dyn Learner,
    data: &Dataset,
    config: &GenericMlConfig,
) -> Result<RepeatedEstimate> {
    if config.n_splits == 0 {
        return Err(Error::Validation("n_splits must be >= 1".into()));
    }

    let results: Vec<Result<SplitEstimate>> = (0..config.n_splits)
        .into_par_iter()
        .map(|s| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(s as u64));
            combine(learner, data, config, &mut rng)
        })
        .collect();

    let mut splits = Vec::with_capacity(results.len());
    let mut first_err = None;
    for (s, r) in results.into_iter().enumerate() {
        match r {
            Ok(est) => splits.push(est),
            Err(e) => {
                log::warn!("split {s} failed: {e}");
                first_err.get_or_insert(e);
            }
        }
    }

    if splits.is_empty() {
        let reason = first_err.map(|e| e.to_string()).unwrap_or_default();
        return Err(Error::Computation(format!(
            "all {} sample splits failed; first error: {reason}",
            config.n_splits
        )));
    }

    let aggregate = aggregate_splits(&splits)?;
    log::info!(
        "generic ML ({}, {}): {}/{} splits ok",
        config.second_stage,
        learner.name(),
        splits.len(),
        config.n_splits
    );

    Ok(RepeatedEstimate {
        second_stage: config.second_stage,
        learner: learner.name().to_string(),
        n_splits: config.n_splits,
        n_splits_ok: splits.len(),
        aggregate,
        splits,
    })
}
