//! Patient-adjustment rules: baseline protocol parameters → parameters for one patient.
//!
//! Policy:
//! - Efficacy mean: `base_mean * (1 - severity_fraction * severity_penalty)`, optionally times an
//!   obesity factor `1 - max(0, bmi - bmi_threshold) * bmi_penalty` (off by default). The new
//!   mean is re-expressed as Beta parameters by method of moments, preserving the baseline
//!   variance where the new mean allows it.
//! - Complication probability: `base * (1 + (age - reference_age) / age_scale)
//!   * (1 + comorbidities * comorbidity_weight)`, clamped to `[0, 1]`.
//! - Recovery time: multiplied by `complication_recovery_multiplier` when a complication
//!   occurs and by `failure_recovery_multiplier` when the trial fails; both compose.
//!
//! All range enforcement goes through [`ClampLog::clamp`].

use crate::{AdjustedField, ClampEvent, ClampLog, Patient, SimError, TreatmentProfile};

/// Constants of the adjustment policy. Defaults are the reference calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AdjustmentConfig {
    /// Lower end of the severity scale.
    pub severity_min: f64,
    /// Upper end of the severity scale.
    pub severity_max: f64,
    /// Fraction of efficacy lost at maximum severity.
    pub severity_penalty: f64,
    /// Age at which the age factor is exactly 1.
    pub reference_age: f64,
    /// Years per unit change of the age factor.
    pub age_scale: f64,
    /// Complication-risk increment per comorbidity.
    pub comorbidity_weight: f64,
    /// BMI above which the obesity penalty applies.
    pub bmi_threshold: f64,
    /// Efficacy fraction lost per BMI unit above the threshold (0 disables).
    pub bmi_penalty: f64,
    /// Recovery-time multiplier for a trial with a complication.
    pub complication_recovery_multiplier: f64,
    /// Recovery-time multiplier for an unsuccessful trial.
    pub failure_recovery_multiplier: f64,
    /// Adjusted efficacy mean is kept inside `[floor, 1 - floor]`.
    pub efficacy_mean_floor: f64,
    /// Smallest allowed `alpha + beta` after re-expression.
    pub min_efficacy_concentration: f64,
    /// Largest allowed `alpha + beta` after re-expression.
    pub max_efficacy_concentration: f64,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            severity_min: 0.0,
            severity_max: 100.0,
            severity_penalty: 0.20,
            reference_age: 50.0,
            age_scale: 100.0,
            comorbidity_weight: 0.10,
            bmi_threshold: 30.0,
            bmi_penalty: 0.0,
            complication_recovery_multiplier: 1.3,
            failure_recovery_multiplier: 1.5,
            efficacy_mean_floor: 1e-3,
            min_efficacy_concentration: 1e-3,
            max_efficacy_concentration: 1e12,
        }
    }
}

impl AdjustmentConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        let fields = [
            ("severity_min", self.severity_min),
            ("severity_max", self.severity_max),
            ("severity_penalty", self.severity_penalty),
            ("reference_age", self.reference_age),
            ("age_scale", self.age_scale),
            ("comorbidity_weight", self.comorbidity_weight),
            ("bmi_threshold", self.bmi_threshold),
            ("bmi_penalty", self.bmi_penalty),
            ("complication_recovery_multiplier", self.complication_recovery_multiplier),
            ("failure_recovery_multiplier", self.failure_recovery_multiplier),
            ("efficacy_mean_floor", self.efficacy_mean_floor),
            ("min_efficacy_concentration", self.min_efficacy_concentration),
            ("max_efficacy_concentration", self.max_efficacy_concentration),
        ];
        if let Some((name, v)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::config(format!("{name} must be finite (got {v})")));
        }
        if self.severity_max <= self.severity_min {
            return Err(SimError::config("severity_max must exceed severity_min"));
        }
        if !(0.0..=1.0).contains(&self.severity_penalty) {
            return Err(SimError::config("severity_penalty must lie in [0, 1]"));
        }
        if self.age_scale <= 0.0 {
            return Err(SimError::config("age_scale must be > 0"));
        }
        if self.comorbidity_weight < 0.0 || self.bmi_penalty < 0.0 {
            return Err(SimError::config("comorbidity_weight and bmi_penalty must be >= 0"));
        }
        if self.complication_recovery_multiplier <= 0.0 || self.failure_recovery_multiplier <= 0.0
        {
            return Err(SimError::config("recovery multipliers must be > 0"));
        }
        if !(self.efficacy_mean_floor > 0.0 && self.efficacy_mean_floor < 0.5) {
            return Err(SimError::config("efficacy_mean_floor must lie in (0, 0.5)"));
        }
        if self.min_efficacy_concentration <= 0.0 {
            return Err(SimError::config("min_efficacy_concentration must be > 0"));
        }
        if self.max_efficacy_concentration <= self.min_efficacy_concentration {
            return Err(SimError::config(
                "max_efficacy_concentration must exceed min_efficacy_concentration",
            ));
        }
        Ok(())
    }

    /// Severity normalized to `[0, 1]` over `[severity_min, severity_max]`.
    pub fn severity_fraction(&self, severity: f64, log: &mut ClampLog) -> f64 {
        let f = (severity - self.severity_min) / (self.severity_max - self.severity_min);
        log.clamp(AdjustedField::SeverityFraction, f, 0.0, 1.0)
    }
}

/// Parameters for one (patient, treatment) trial batch, guaranteed inside their domains.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdjustedParameters {
    pub efficacy_mean: f64,
    pub efficacy_alpha: f64,
    pub efficacy_beta: f64,
    pub complication_probability: f64,
    pub recovery_optimistic: f64,
    pub recovery_likely: f64,
    pub recovery_pessimistic: f64,
    pub complication_recovery_multiplier: f64,
    pub failure_recovery_multiplier: f64,
    pub base_cost: f64,
    pub complication_cost: f64,
    /// Every clamp applied while producing these parameters.
    pub clamps: Vec<ClampEvent>,
}

impl AdjustedParameters {
    /// Combined recovery multiplier for one trial's outcome.
    pub fn recovery_multiplier(&self, success: bool, complication: bool) -> f64 {
        let mut m = 1.0;
        if complication {
            m *= self.complication_recovery_multiplier;
        }
        if !success {
            m *= self.failure_recovery_multiplier;
        }
        m
    }

    pub fn cost(&self, complication: bool) -> f64 {
        if complication {
            self.base_cost + self.complication_cost
        } else {
            self.base_cost
        }
    }
}

/// Severity- (and optionally BMI-) adjusted efficacy mean.
pub fn adjusted_efficacy_mean(
    profile: &TreatmentProfile,
    patient: &Patient,
    cfg: &AdjustmentConfig,
    log: &mut ClampLog,
) -> f64 {
    let severity = cfg.severity_fraction(patient.severity, log);
    let mut mean = profile.mean_efficacy() * (1.0 - severity * cfg.severity_penalty);
    if cfg.bmi_penalty > 0.0 {
        let excess = (patient.bmi - cfg.bmi_threshold).max(0.0);
        mean *= 1.0 - excess * cfg.bmi_penalty;
    }
    log.clamp(
        AdjustedField::EfficacyMean,
        mean,
        cfg.efficacy_mean_floor,
        1.0 - cfg.efficacy_mean_floor,
    )
}

/// Re-express Beta(alpha, beta) with a new mean by method of moments.
///
/// The baseline variance `v` is kept, giving concentration `k = m(1 - m) / v - 1`. When the
/// new mean cannot carry that variance (`k` too small), `k` is clamped to
/// `min_efficacy_concentration`; near-degenerate baselines are clamped to
/// `max_efficacy_concentration` so the result stays finite.
pub fn rescale_beta(
    alpha: f64,
    beta: f64,
    target_mean: f64,
    cfg: &AdjustmentConfig,
    log: &mut ClampLog,
) -> (f64, f64) {
    let k0 = alpha + beta;
    let m0 = alpha / k0;
    let variance = m0 * (1.0 - m0) / (k0 + 1.0);
    let k = target_mean * (1.0 - target_mean) / variance - 1.0;
    let k = log.clamp(
        AdjustedField::EfficacyConcentration,
        k,
        cfg.min_efficacy_concentration,
        cfg.max_efficacy_concentration,
    );
    (target_mean * k, (1.0 - target_mean) * k)
}

/// Age- and comorbidity-scaled complication probability, clamped to `[0, 1]`.
pub fn adjusted_complication_probability(
    base: f64,
    patient: &Patient,
    cfg: &AdjustmentConfig,
    log: &mut ClampLog,
) -> f64 {
    let age_factor = 1.0 + (patient.age - cfg.reference_age) / cfg.age_scale;
    let comorbidity_factor = 1.0 + f64::from(patient.comorbidities) * cfg.comorbidity_weight;
    log.clamp(
        AdjustedField::ComplicationProbability,
        base * age_factor * comorbidity_factor,
        0.0,
        1.0,
    )
}

/// Apply every adjustment rule for one (patient, treatment) pair.
///
/// The profile is assumed valid (see [`TreatmentProfile::validate`]).
pub fn adjust(
    profile: &TreatmentProfile,
    patient: &Patient,
    cfg: &AdjustmentConfig,
) -> AdjustedParameters {
    let mut log = ClampLog::new();
    let efficacy_mean = adjusted_efficacy_mean(profile, patient, cfg, &mut log);
    let (efficacy_alpha, efficacy_beta) = rescale_beta(
        profile.efficacy_alpha,
        profile.efficacy_beta,
        efficacy_mean,
        cfg,
        &mut log,
    );
    let complication_probability =
        adjusted_complication_probability(profile.complication_probability, patient, cfg, &mut log);

    AdjustedParameters {
        efficacy_mean,
        efficacy_alpha,
        efficacy_beta,
        complication_probability,
        recovery_optimistic: profile.recovery_optimistic,
        recovery_likely: profile.recovery_likely,
        recovery_pessimistic: profile.recovery_pessimistic,
        complication_recovery_multiplier: cfg.complication_recovery_multiplier,
        failure_recovery_multiplier: cfg.failure_recovery_multiplier,
        base_cost: profile.base_cost,
        complication_cost: profile.complication_cost,
        clamps: log.into_events(),
    }
}
