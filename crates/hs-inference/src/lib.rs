//! # hs-inference
//!
//! Generic machine-learning inference on heterogeneous treatment effects
//! in randomized experiments.
//!
//! This crate provides:
//! - Stratified main/auxiliary sample splitting
//! - ML proxies for the baseline and the treatment effect
//! - Best Linear Predictor (BLP) and Group Average Treatment Effects (GATES)
//! - Repeated-split aggregation (median estimates, adjusted p-values)
//!
//! ## Architecture
//!
//! Proxies are fitted through the `Learner` trait from hs-core, so the
//! second stage never depends on a concrete learner.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Best Linear Predictor of the CATE.
pub mod blp;
/// Group Average Treatment Effects.
pub mod gates;
/// Split → proxies → second stage, single and repeated.
pub mod generic_ml;
/// Built-in learners (mean, OLS/ridge, k-NN).
pub mod learners;
mod linalg;
/// Baseline and effect proxies from the auxiliary sample.
pub mod proxy;
/// Linear-interpolation quantiles and equal-frequency groups.
pub mod quantile;
/// Synthetic randomized experiments.
pub mod simulate;
/// Stratified main/auxiliary partition.
pub mod split;
/// Weighted least squares with classical or HC1 covariance.
pub mod wls;

pub use blp::{BLP_LABELS, BlpResult, blp};
pub use gates::{GatesResult, gates};
pub use generic_ml::{
    AggregatedCoef, GenericMlConfig, RepeatedEstimate, SecondStage, SplitEstimate, aggregate_splits, combine,
    repeated_combine,
};
pub use learners::{KnnLearner, LearnerKind, LinearLearner, MeanLearner};
pub use proxy::{ProxyPredictions, ml_proxy};
pub use quantile::{QuantileGrid, quantile_grid};
pub use simulate::{SimulationConfig, simulate_rct};
pub use split::partition;
pub use wls::{CovarianceType, WlsFit, wls_fit};
