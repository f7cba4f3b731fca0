//! Sample splitting into main and auxiliary samples, stratified by treatment.

use hs_core::{Error, Result, SampleRole, SampleSplit};
use rand::Rng;
use rand::seq::index;

/// Draw `floor(main_fraction * n_arm)` rows of each treatment arm into the
/// main sample, uniformly without replacement. All other rows are auxiliary.
///
/// `main_fraction` must lie strictly inside (0, 1): both samples are needed,
/// the auxiliary one to train the proxies and the main one for estimation.
pub fn partition<R: Rng + ?Sized>(d: &[u8], main_fraction: f64, rng: &mut R) -> Result<SampleSplit> {
    if !(main_fraction.is_finite() && main_fraction > 0.0 && main_fraction < 1.0) {
        return Err(Error::Validation(format!(
            "main_fraction must be in (0,1), got {main_fraction}"
        )));
    }

    let mut treated = Vec::new();
    let mut control = Vec::new();
    for (i, &di) in d.iter().enumerate() {
        match di {
            1 => treated.push(i),
            0 => control.push(i),
            other => {
                return Err(Error::Validation(format!("d must be 0 or 1, got {other} at row {i}")));
            }
        }
    }

    let mut roles = vec![SampleRole::Auxiliary; d.len()];
    for arm in [&treated, &control] {
        let n_main = (main_fraction * arm.len() as f64).floor() as usize;
        for pos in index::sample(rng, arm.len(), n_main) {
            roles[arm[pos]] = SampleRole::Main;
        }
    }

    let split = SampleSplit { roles };
    log::debug!(
        "partition: n={} treated={} control={} main={} auxiliary={}",
        d.len(),
        treated.len(),
        control.len(),
        split.n_main(),
        split.n_auxiliary()
    );
    Ok(split)
}
