//! Trial engine: a batch of independent simulated encounters for one (patient, treatment).
//!
//! Per trial, in this order (the draw order is part of the reproducibility contract):
//! 1. efficacy ~ Beta(adjusted alpha, adjusted beta)
//! 2. success ~ Bernoulli(efficacy), i.e. the efficacy draw *is* the success probability
//! 3. base recovery ~ Triangular(optimistic, likely, pessimistic)
//! 4. complication ~ Bernoulli(adjusted complication probability)
//! 5. recovery = base recovery × complication/failure multipliers
//! 6. cost = base cost (+ complication cost)
//! 7. severity reduction = baseline severity × efficacy
//!
//! A trial that hits a numerical edge case is counted in `failed_trials` and excluded; it never
//! aborts the batch.

use rand::Rng;
use rand_distr::{Bernoulli, Beta, Distribution, Triangular};

use crate::sampling::{
    bernoulli_distribution, beta_distribution, sample_bernoulli, triangular_distribution,
};
use crate::{
    adjust, AdjustedParameters, AdjustmentConfig, Patient, SimError, TreatmentEntry, TreatmentId,
};

/// One simulated encounter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialOutcome {
    /// Sampled efficacy in `[0, 1]`; also the success probability of this trial.
    pub efficacy: f64,
    pub success: bool,
    /// Baseline severity × efficacy.
    pub severity_reduction: f64,
    /// Baseline severity − severity reduction.
    pub final_severity: f64,
    /// Days to recovery, after outcome multipliers (> 0).
    pub recovery_days: f64,
    pub complication: bool,
    /// Monetary cost (>= 0).
    pub cost: f64,
}

/// Result of one trial batch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialBatch {
    /// Outcomes of the trials that completed, in draw order.
    pub outcomes: Vec<TrialOutcome>,
    /// Trials requested.
    pub requested_trials: usize,
    /// Trials that failed and were excluded from `outcomes`.
    pub failed_trials: usize,
    /// The patient-adjusted parameters the batch was sampled under.
    pub adjusted: AdjustedParameters,
}

/// Assemble one outcome from its raw draws, rejecting draws outside their domains.
pub(crate) fn outcome_from_draws(
    params: &AdjustedParameters,
    baseline_severity: f64,
    efficacy: f64,
    success: bool,
    base_recovery: f64,
    complication: bool,
) -> Result<TrialOutcome, SimError> {
    if !(efficacy.is_finite() && (0.0..=1.0).contains(&efficacy)) {
        return Err(SimError::domain(
            "Beta",
            "efficacy",
            efficacy,
            "sampled efficacy must lie in [0, 1]",
        ));
    }
    let recovery_days = base_recovery * params.recovery_multiplier(success, complication);
    if !(recovery_days.is_finite() && recovery_days > 0.0) {
        return Err(SimError::domain(
            "Triangular",
            "recovery_days",
            recovery_days,
            "sampled recovery time must be finite and > 0",
        ));
    }
    let severity_reduction = baseline_severity * efficacy;
    Ok(TrialOutcome {
        efficacy,
        success,
        severity_reduction,
        final_severity: baseline_severity - severity_reduction,
        recovery_days,
        complication,
        cost: params.cost(complication),
    })
}

/// Distributions for one batch, validated once before the first trial.
struct BatchSamplers {
    efficacy: Beta<f64>,
    recovery: Triangular<f64>,
    complication: Bernoulli,
}

impl BatchSamplers {
    fn new(p: &AdjustedParameters) -> Result<Self, SimError> {
        Ok(Self {
            efficacy: beta_distribution(p.efficacy_alpha, p.efficacy_beta)?,
            recovery: triangular_distribution(
                p.recovery_optimistic,
                p.recovery_likely,
                p.recovery_pessimistic,
            )?,
            complication: bernoulli_distribution(p.complication_probability)?,
        })
    }

    fn trial<R: Rng + ?Sized>(
        &self,
        params: &AdjustedParameters,
        baseline_severity: f64,
        rng: &mut R,
    ) -> Result<TrialOutcome, SimError> {
        let efficacy = self.efficacy.sample(rng);
        let success = sample_bernoulli(rng, efficacy)?;
        let base_recovery = self.recovery.sample(rng);
        let complication = self.complication.sample(rng);
        outcome_from_draws(
            params,
            baseline_severity,
            efficacy,
            success,
            base_recovery,
            complication,
        )
    }
}

/// Run `trial_count` trials through `next`, keeping completed outcomes and counting failures.
pub(crate) fn collect_outcomes<F>(
    patient_id: &str,
    treatment: TreatmentId,
    trial_count: usize,
    mut next: F,
) -> (Vec<TrialOutcome>, usize)
where
    F: FnMut() -> Result<TrialOutcome, SimError>,
{
    let mut outcomes = Vec::with_capacity(trial_count);
    let mut failed_trials = 0usize;
    for trial in 0..trial_count {
        match next() {
            Ok(o) => outcomes.push(o),
            Err(error) => {
                failed_trials += 1;
                tracing::warn!(
                    patient = %patient_id,
                    treatment = %treatment,
                    trial,
                    %error,
                    "trial failed; excluded from sample"
                );
            }
        }
    }
    (outcomes, failed_trials)
}

/// Run `trial_count` independent trials of `treatment` for `patient`.
///
/// Errors (raised before the generator is touched):
/// - [`SimError::InvalidConfiguration`] if `trial_count == 0`
/// - [`SimError::Domain`] if the treatment profile violates a distribution domain
pub fn run_trials<R: Rng + ?Sized>(
    patient: &Patient,
    treatment: &TreatmentEntry,
    adjustment: &AdjustmentConfig,
    trial_count: usize,
    rng: &mut R,
) -> Result<TrialBatch, SimError> {
    if trial_count == 0 {
        return Err(SimError::config("trial_count must be > 0"));
    }
    treatment.profile.validate()?;
    let adjusted = adjust(&treatment.profile, patient, adjustment);
    let samplers = BatchSamplers::new(&adjusted)?;

    let (outcomes, failed_trials) = collect_outcomes(&patient.id, treatment.id, trial_count, || {
        samplers.trial(&adjusted, patient.severity, rng)
    });

    tracing::debug!(
        patient = %patient.id,
        treatment = %treatment.id,
        trials = trial_count,
        failed = failed_trials,
        clamps = adjusted.clamps.len(),
        "trial batch complete"
    );

    Ok(TrialBatch {
        outcomes,
        requested_trials: trial_count,
        failed_trials,
        adjusted,
    })
}
