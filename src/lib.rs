//! `carecast`: deterministic Monte Carlo projection of treatment outcomes.
//!
//! For each patient and each treatment protocol in a small, closed comparison set, the engine
//! samples many independent trials (efficacy, success, recovery time, complication, cost),
//! then reduces them into decision-relevant statistics and a per-patient recommendation.
//!
//! Pipeline (data flows strictly downward):
//!
//! ```text
//!   samplers  <-  adjustment rules  <-  trial engine  <-  cohort driver
//!                                                            |
//!                         recommendation  <-  aggregation  <-+
//! ```
//!
//! - [`sampling`]: Beta / Triangular / Bernoulli draws with fail-fast domain checks.
//! - [`adjust`](mod@adjust): patient attributes → adjusted parameters; the only place values are clamped,
//!   always through [`ClampLog::clamp`].
//! - [`run_trials`]: one (patient, treatment) batch.
//! - [`run_cohort`]: every selected patient × every treatment.
//! - [`CohortRun::summarize`], [`compare_treatments`], [`stratify_by_severity`],
//!   [`cohort_overview`]: pure reductions over stored trials.
//! - [`recommend`]: weighted score plus clinical override rules.
//!
//! **Goals:**
//! - **Deterministic by default**: same seed + patients + treatments + trial count → bit-identical
//!   statistics, with or without the `parallel` feature. Each (patient, treatment) pair owns a
//!   generator seeded by [`pair_seed`]; there is no shared generator.
//! - **Re-derivable**: aggregation never resamples; summarizing a stored [`CohortRun`] twice
//!   gives identical results.
//! - **Nothing silently dropped**: clamp events and failed trials are counted and surfaced.
//!
//! **Non-goals:**
//! - No persistence, rendering or export; outputs are plain records (with `serde` derives
//!   behind the `serde` feature).
//! - No cohort generation; [`Patient`] records come from outside.
//!
//! ```rust
//! use carecast::{simulate_cohort, Patient, SimulationConfig, TreatmentCatalog};
//!
//! let patients = vec![
//!     Patient::new("PT000001", 62.0, 55.0, 2, 31.0),
//!     Patient::new("PT000002", 41.0, 22.0, 0, 24.5),
//! ];
//! let mut cfg = SimulationConfig::default();
//! cfg.cohort.trial_count = 200;
//!
//! let report = simulate_cohort(&patients, &TreatmentCatalog::reference(), &cfg).unwrap();
//! assert_eq!(report.recommendations.len(), 2);
//! ```

#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod stable_hash;
pub use stable_hash::*;

pub mod sampling;

mod treatment;
pub use treatment::*;

mod clamp;
pub use clamp::*;

pub mod adjust;
pub use adjust::{adjust, AdjustedParameters, AdjustmentConfig};

mod trial;
pub use trial::*;

mod stats;
pub use stats::*;

mod aggregate;
pub use aggregate::*;

mod recommend;
pub use recommend::*;

mod cohort;
pub use cohort::*;

mod config;
pub use config::*;

/// One patient record, produced externally and never mutated by the engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Patient {
    /// Unique identifier within a cohort.
    pub id: String,
    /// Age in years (> 0).
    pub age: f64,
    /// Baseline severity on the scale configured in [`AdjustmentConfig`] (default 0–100).
    pub severity: f64,
    /// Number of comorbid conditions.
    pub comorbidities: u32,
    /// Body-mass index (> 0).
    pub bmi: f64,
}

impl Patient {
    pub fn new(id: impl Into<String>, age: f64, severity: f64, comorbidities: u32, bmi: f64) -> Self {
        Self {
            id: id.into(),
            age,
            severity,
            comorbidities,
            bmi,
        }
    }

    /// Check the input contract: non-empty id, finite positive age and BMI, finite severity.
    ///
    /// Severity outside the configured scale is not an error; adjustment clamps it.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.id.trim().is_empty() {
            return Err(SimError::config("patient id must not be empty"));
        }
        if !(self.age.is_finite() && self.age > 0.0) {
            return Err(SimError::config(format!(
                "patient `{}`: age must be finite and > 0 (got {})",
                self.id, self.age
            )));
        }
        if !(self.bmi.is_finite() && self.bmi > 0.0) {
            return Err(SimError::config(format!(
                "patient `{}`: bmi must be finite and > 0 (got {})",
                self.id, self.bmi
            )));
        }
        if !self.severity.is_finite() {
            return Err(SimError::config(format!(
                "patient `{}`: severity must be finite",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_contract_is_enforced() {
        assert!(Patient::new("PT1", 45.0, 5.0, 1, 27.0).validate().is_ok());
        for p in [
            Patient::new("", 45.0, 5.0, 1, 27.0),
            Patient::new("PT1", 0.0, 5.0, 1, 27.0),
            Patient::new("PT1", f64::NAN, 5.0, 1, 27.0),
            Patient::new("PT1", 45.0, f64::INFINITY, 1, 27.0),
            Patient::new("PT1", 45.0, 5.0, 1, -3.0),
        ] {
            assert!(p.validate().unwrap_err().is_invalid_configuration(), "{p:?}");
        }
    }

    #[test]
    fn out_of_scale_severity_is_accepted() {
        assert!(Patient::new("PT1", 45.0, 130.0, 1, 27.0).validate().is_ok());
    }
}
