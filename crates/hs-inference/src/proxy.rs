//! ML proxies for the baseline outcome and the treatment effect.
//!
//! Both proxies are trained on the auxiliary sample only and then predicted
//! for every observation, so that main-sample predictions are out-of-sample.

use hs_core::{Dataset, Error, Learner, Result, SampleRole, SampleSplit};
use serde::{Deserialize, Serialize};

/// Proxy predictions for every observation of the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyPredictions {
    /// Estimated baseline `E[Y | D=0, X]` (`b_hat`).
    pub baseline: Vec<f64>,
    /// Estimated treatment effect `E[Y(1) − Y(0) | X]` (`s_hat`).
    pub effect: Vec<f64>,
}

fn auxiliary_arm(data: &Dataset, split: &SampleSplit, arm: u8) -> Vec<usize> {
    split
        .roles
        .iter()
        .zip(&data.d)
        .enumerate()
        .filter(|(_, (r, d))| **r == SampleRole::Auxiliary && **d == arm)
        .map(|(i, _)| i)
        .collect()
}

/// Fit the ML proxies.
///
/// 1. Fit `learner` on auxiliary controls `(x, y)`; predict all rows → baseline.
/// 2. Fit `learner` on auxiliary treated with target `y − baseline`;
///    predict all rows → effect.
pub fn ml_proxy(learner: &dyn Learner, data: &Dataset, split: &SampleSplit) -> Result<ProxyPredictions> {
    if split.roles.len() != data.len() {
        return Err(Error::Validation(format!(
            "split has {} roles but dataset has {} rows",
            split.roles.len(),
            data.len()
        )));
    }

    let ctrl = auxiliary_arm(data, split, 0);
    let treat = auxiliary_arm(data, split, 1);
    if ctrl.is_empty() {
        return Err(Error::Validation("auxiliary sample has no control observations".into()));
    }
    if treat.is_empty() {
        return Err(Error::Validation("auxiliary sample has no treated observations".into()));
    }

    let x_ctrl = data.x.select_rows(&ctrl);
    let y_ctrl: Vec<f64> = ctrl.iter().map(|&i| data.y[i]).collect();
    let baseline = learner.fit(&x_ctrl, &y_ctrl)?.predict(&data.x)?;

    let x_treat = data.x.select_rows(&treat);
    let uplift: Vec<f64> = treat.iter().map(|&i| data.y[i] - baseline[i]).collect();
    let effect = learner.fit(&x_treat, &uplift)?.predict(&data.x)?;

    log::debug!(
        "ml_proxy[{}]: trained on {} control / {} treated auxiliary rows",
        learner.name(),
        ctrl.len(),
        treat.len()
    );

    Ok(ProxyPredictions { baseline, effect })
}
