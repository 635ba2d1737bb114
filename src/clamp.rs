//! Clamp-and-record: the only place adjusted parameters are forced back into range.
//!
//! Extreme patient attributes can push an adjusted parameter out of its domain. That is
//! expected, not a bug, so it is recovered by clamping; every clamp is logged and kept as a
//! [`ClampEvent`] so it can be surfaced with the results.

use std::fmt;

/// Which adjusted quantity was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdjustedField {
    SeverityFraction,
    EfficacyMean,
    EfficacyConcentration,
    ComplicationProbability,
}

impl fmt::Display for AdjustedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdjustedField::SeverityFraction => "severity_fraction",
            AdjustedField::EfficacyMean => "efficacy_mean",
            AdjustedField::EfficacyConcentration => "efficacy_concentration",
            AdjustedField::ComplicationProbability => "complication_probability",
        })
    }
}

/// One clamp: the value that escaped, the bounds it was forced into, and the result.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClampEvent {
    pub field: AdjustedField,
    pub original: f64,
    pub lower: f64,
    pub upper: f64,
    pub clamped: f64,
}

/// Accumulates clamp events for one adjustment pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClampLog {
    events: Vec<ClampEvent>,
}

impl ClampLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force `value` into `[lower, upper]`, recording and logging an event if it moved.
    ///
    /// Non-finite input goes to the nearest bound (`NaN` goes to `lower`).
    pub fn clamp(&mut self, field: AdjustedField, value: f64, lower: f64, upper: f64) -> f64 {
        debug_assert!(lower <= upper);
        let clamped = if value.is_nan() {
            lower
        } else {
            value.clamp(lower, upper)
        };
        if clamped != value || value.is_nan() {
            tracing::warn!(
                field = %field,
                original = value,
                lower,
                upper,
                clamped,
                "adjusted parameter left its domain; clamped"
            );
            self.events.push(ClampEvent {
                field,
                original: value,
                lower,
                upper,
                clamped,
            });
        }
        clamped
    }

    pub fn events(&self) -> &[ClampEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<ClampEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_values_pass_through_unrecorded() {
        let mut log = ClampLog::new();
        let v = log.clamp(AdjustedField::ComplicationProbability, 0.3, 0.0, 1.0);
        assert_eq!(v, 0.3);
        assert!(log.is_empty());
    }

    #[test]
    fn escapes_are_clamped_and_recorded() {
        let mut log = ClampLog::new();
        assert_eq!(log.clamp(AdjustedField::ComplicationProbability, 1.7, 0.0, 1.0), 1.0);
        assert_eq!(log.clamp(AdjustedField::EfficacyMean, -0.2, 0.001, 0.999), 0.001);
        assert_eq!(log.len(), 2);
        let e = log.events()[0];
        assert_eq!(e.field, AdjustedField::ComplicationProbability);
        assert_eq!(e.original, 1.7);
        assert_eq!(e.upper, 1.0);
        assert_eq!(e.clamped, 1.0);
    }

    #[test]
    fn non_finite_goes_to_nearest_bound() {
        let mut log = ClampLog::new();
        assert_eq!(log.clamp(AdjustedField::SeverityFraction, f64::NAN, 0.0, 1.0), 0.0);
        assert_eq!(log.clamp(AdjustedField::SeverityFraction, f64::INFINITY, 0.0, 1.0), 1.0);
        assert_eq!(
            log.clamp(AdjustedField::EfficacyConcentration, f64::NEG_INFINITY, 0.5, f64::INFINITY),
            0.5
        );
        assert_eq!(log.len(), 3);
        assert!(log.events()[0].original.is_nan());
    }
}
