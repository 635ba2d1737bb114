//! Numerical reductions: percentiles, distribution summaries, Wilson intervals, VaR.
//!
//! Percentiles use linear interpolation between closest ranks: for sorted `x[0..n]` and
//! `p` in `[0, 100]`, `h = (n - 1) * p / 100` and the result is
//! `x[floor(h)] + (h - floor(h)) * (x[floor(h) + 1] - x[floor(h)])`.
//!
//! Empty inputs produce zero-valued summaries with `count == 0`; callers check the count.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::SimError;

/// Percentile of already-sorted data (ascending). Returns 0 for empty input.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * (p.clamp(0.0, 100.0) / 100.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Sorted copy of `values` (total order, so NaN-free input is assumed but never panics).
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Two-sided standard-normal quantile for a confidence level in `(0, 1)`.
///
/// `0.95` → `1.959964...`
pub fn z_for_confidence(level: f64) -> Result<f64, SimError> {
    if !(level.is_finite() && level > 0.0 && level < 1.0) {
        return Err(SimError::config(format!(
            "confidence level must lie in (0, 1) (got {level})"
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| SimError::config(format!("standard normal unavailable: {e}")))?;
    Ok(normal.inverse_cdf(0.5 + level / 2.0))
}

/// Wilson score bounds `(lower, upper)` for `successes` out of `trials` at normal quantile `z`.
///
/// With no trials the proportion is unconstrained and the bounds are `(0, 1)`.
pub fn wilson_bounds(successes: usize, trials: usize, z: f64) -> (f64, f64) {
    if trials == 0 {
        return (0.0, 1.0);
    }
    let n = trials as f64;
    let p = successes.min(trials) as f64 / n;
    let z2 = z * z;
    let shrink = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / shrink;
    let radius = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / shrink;
    (
        (center - radius).clamp(0.0, 1.0),
        (center + radius).clamp(0.0, 1.0),
    )
}

/// A confidence interval at one level.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceInterval {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn margin_of_error(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }
}

/// A proportion with Wilson intervals at each requested level.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProportionEstimate {
    pub successes: usize,
    pub trials: usize,
    /// `successes / trials`, or 0 when `trials == 0`.
    pub estimate: f64,
    pub intervals: Vec<ConfidenceInterval>,
}

impl ProportionEstimate {
    pub fn from_counts(successes: usize, trials: usize, levels: &[f64]) -> Result<Self, SimError> {
        let estimate = if trials == 0 {
            0.0
        } else {
            successes as f64 / trials as f64
        };
        let intervals = levels
            .iter()
            .map(|&level| {
                let z = z_for_confidence(level)?;
                let (lower, upper) = wilson_bounds(successes, trials, z);
                Ok(ConfidenceInterval {
                    level,
                    lower,
                    upper,
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        Ok(Self {
            successes,
            trials,
            estimate,
            intervals,
        })
    }

    /// Interval at exactly `level`, if it was requested.
    pub fn interval(&self, level: f64) -> Option<&ConfidenceInterval> {
        self.intervals.iter().find(|ci| ci.level == level)
    }
}

/// Value of one requested percentile.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PercentileValue {
    /// Percentile in `(0, 100)`.
    pub percentile: f64,
    pub value: f64,
}

/// Location/spread summary of a real-valued sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub percentiles: Vec<PercentileValue>,
}

impl DistributionSummary {
    pub fn from_values(values: &[f64], percentiles: &[f64]) -> Self {
        Self::from_sorted(&sorted_copy(values), percentiles)
    }

    /// Summary of ascending-sorted data.
    pub fn from_sorted(sorted: &[f64], percentiles: &[f64]) -> Self {
        let count = sorted.len();
        let (mean, std_dev) = mean_std(sorted);
        Self {
            count,
            mean,
            std_dev,
            min: sorted.first().copied().unwrap_or(0.0),
            max: sorted.last().copied().unwrap_or(0.0),
            median: percentile_sorted(sorted, 50.0),
            percentiles: percentiles
                .iter()
                .map(|&p| PercentileValue {
                    percentile: p,
                    value: percentile_sorted(sorted, p),
                })
                .collect(),
        }
    }

    /// Value at exactly percentile `p`, if it was requested.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|v| v.percentile == p)
            .map(|v| v.value)
    }
}

/// Mean and population standard deviation; `(0, 0)` for empty input.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Cost level not exceeded with probability `confidence`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueAtRisk {
    pub confidence: f64,
    pub value: f64,
}

/// VaR at `confidence` in `(0, 1)`: the `100 * confidence`-th percentile of sorted losses.
pub fn value_at_risk(sorted: &[f64], confidence: f64) -> ValueAtRisk {
    ValueAtRisk {
        confidence,
        value: percentile_sorted(sorted, confidence * 100.0),
    }
}
