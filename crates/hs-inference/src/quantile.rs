//! Quantile utilities and the equal-frequency grid used to form GATES groups.

use hs_core::{Error, Result};

/// Value at fraction `q` of sorted data, interpolating linearly between
/// neighbouring order statistics (numpy's default `linear` method).
/// `q` is clamped to `[0, 1]`; empty input gives `NaN`.
pub fn quantile_linear_sorted(sorted: &[f64], q: f64) -> f64 {
    let Some(&last) = sorted.last() else {
        return f64::NAN;
    };
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    if lo + 1 >= sorted.len() {
        return last;
    }
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
}

/// Median via sorting + linear interpolation. Empty input returns `NaN`.
pub fn median(data: &[f64]) -> f64 {
    let mut v = data.to_vec();
    v.sort_by(f64::total_cmp);
    quantile_linear_sorted(&v, 0.5)
}

/// Percentiles (0..=100) of `data`, linear interpolation between order statistics.
pub fn percentiles(data: &[f64], pct: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(f64::total_cmp);
    pct.iter().map(|&p| quantile_linear_sorted(&v, p / 100.0)).collect()
}

/// Equal-frequency binning of a numeric vector.
#[derive(Debug, Clone)]
pub struct QuantileGrid {
    /// Bin index of each input value, in `[0, q)`.
    pub bin_indices: Vec<usize>,
    /// Left edge of each bin (non-decreasing; first edge is `min(x)`).
    pub bin_edges: Vec<f64>,
    /// Percentile (0..100) at which each left edge was taken.
    pub bin_pct: Vec<f64>,
}

/// Cut `x` into `q` intervals of equal size.
///
/// Left edges sit at percentiles `0, 100/q, ..., 100(q-1)/q`. Each value is
/// assigned to the last bin whose left edge does not exceed it, so the left
/// edge is inclusive and the top bin is open-ended.
pub fn quantile_grid(x: &[f64], q: usize) -> Result<QuantileGrid> {
    if q == 0 {
        return Err(Error::Validation("number of groups q must be >= 1".into()));
    }
    if x.is_empty() {
        return Err(Error::Validation("x must be non-empty".into()));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation("x must contain only finite values".into()));
    }

    let bin_pct: Vec<f64> = (0..q).map(|i| 100.0 * i as f64 / q as f64).collect();
    let bin_edges = percentiles(x, &bin_pct);

    let bin_indices = x
        .iter()
        .map(|&v| {
            // Edges are sorted, so the count of edges <= v is a partition point.
            let above = bin_edges.partition_point(|&e| e <= v);
            above.saturating_sub(1)
        })
        .collect();

    Ok(QuantileGrid { bin_indices, bin_edges, bin_pct })
}
