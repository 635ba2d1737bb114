use crate::{AdjustmentConfig, AggregationConfig, CohortConfig, ScoringConfig, SimError};

/// Every tunable of a simulation, with the reference calibration as `Default`.
///
/// With the `serde` feature every section (and every field within it) is optional when
/// deserializing; missing values fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    pub cohort: CohortConfig,
    pub adjustment: AdjustmentConfig,
    pub aggregation: AggregationConfig,
    pub scoring: ScoringConfig,
}

impl SimulationConfig {
    /// Validate every section. Called before any sampling.
    pub fn validate(&self) -> Result<(), SimError> {
        self.cohort.validate()?;
        self.adjustment.validate()?;
        self.aggregation.validate()?;
        self.scoring.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn each_section_is_checked() {
        let mut c = SimulationConfig::default();
        c.cohort.trial_count = 0;
        assert!(c.validate().unwrap_err().is_invalid_configuration());

        let mut c = SimulationConfig::default();
        c.adjustment.age_scale = 0.0;
        assert!(c.validate().is_err());

        let mut c = SimulationConfig::default();
        c.aggregation.confidence_levels = vec![0.95, 1.5];
        assert!(c.validate().is_err());

        let mut c = SimulationConfig::default();
        c.scoring.success_weight = -1.0;
        assert!(c.validate().is_err());
    }
}
