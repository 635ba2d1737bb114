//! Aggregation: trial sequences → summary statistics, comparisons and risk strata.
//!
//! Everything here is a pure reduction over stored [`TrialOutcome`]s. Summarizing the same
//! [`CohortRun`] twice, or summarizing a run that was stored and reloaded, yields identical
//! records; nothing is resampled.
//!
//! Proportion confidence intervals use the Wilson score method at every configured level.

use crate::stats::{sorted_copy, value_at_risk, DistributionSummary, ProportionEstimate, ValueAtRisk};
use crate::{mean_std, percentile_sorted, CohortRun, Patient, SimError, TreatmentId, TrialOutcome};

/// A severity range used for stratification: `(lower, upper]`.
///
/// The first band of an [`AggregationConfig`] also includes its lower bound.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeverityBand {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
}

impl SeverityBand {
    pub fn new(label: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            label: label.into(),
            lower,
            upper,
        }
    }
}

/// Statistics to compute from trial data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AggregationConfig {
    /// Percentiles in `(0, 100)` reported for recovery time and cost.
    pub percentiles: Vec<f64>,
    /// Confidence levels in `(0, 1)` for proportion intervals.
    pub confidence_levels: Vec<f64>,
    /// Confidence levels in `(0, 1)` at which cost VaR is reported.
    pub var_levels: Vec<f64>,
    /// Ascending, non-overlapping severity bands.
    pub severity_bands: Vec<SeverityBand>,
    /// Patients with severity above this count as high risk in the overview.
    pub high_risk_severity: f64,
    /// Patients with severity below this count as low risk in the overview.
    pub low_risk_severity: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            percentiles: vec![5.0, 25.0, 50.0, 75.0, 90.0, 95.0],
            confidence_levels: vec![0.50, 0.75, 0.90, 0.95, 0.99],
            var_levels: vec![0.95],
            severity_bands: vec![
                SeverityBand::new("Low", 0.0, 30.0),
                SeverityBand::new("Moderate", 30.0, 50.0),
                SeverityBand::new("High", 50.0, 70.0),
                SeverityBand::new("Very High", 70.0, 100.0),
            ],
            high_risk_severity: 70.0,
            low_risk_severity: 30.0,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if let Some(p) = self
            .percentiles
            .iter()
            .find(|p| !(p.is_finite() && **p > 0.0 && **p < 100.0))
        {
            return Err(SimError::config(format!(
                "percentile must lie in (0, 100) (got {p})"
            )));
        }
        for (name, levels) in [
            ("confidence level", &self.confidence_levels),
            ("VaR level", &self.var_levels),
        ] {
            if let Some(c) = levels
                .iter()
                .find(|c| !(c.is_finite() && **c > 0.0 && **c < 1.0))
            {
                return Err(SimError::config(format!(
                    "{name} must lie in (0, 1) (got {c})"
                )));
            }
        }
        if self.severity_bands.is_empty() {
            return Err(SimError::config("at least one severity band is required"));
        }
        for (i, b) in self.severity_bands.iter().enumerate() {
            if !(b.lower.is_finite() && b.upper.is_finite() && b.lower < b.upper) {
                return Err(SimError::config(format!(
                    "severity band `{}` must have finite lower < upper",
                    b.label
                )));
            }
            if i > 0 && b.lower < self.severity_bands[i - 1].upper {
                return Err(SimError::config(format!(
                    "severity band `{}` overlaps its predecessor",
                    b.label
                )));
            }
        }
        if !(self.high_risk_severity.is_finite() && self.low_risk_severity.is_finite()) {
            return Err(SimError::config("risk thresholds must be finite"));
        }
        Ok(())
    }

    /// Index of the band containing `severity`, if any.
    ///
    /// Bands are right-inclusive. A band is also left-inclusive unless its lower bound is
    /// shared with the previous band's upper bound.
    pub fn band_index(&self, severity: f64) -> Option<usize> {
        let bands = &self.severity_bands;
        bands.iter().enumerate().position(|(i, b)| {
            let shares_edge = i > 0 && bands[i - 1].upper == b.lower;
            let above_lower = if shares_edge {
                severity > b.lower
            } else {
                severity >= b.lower
            };
            above_lower && severity <= b.upper
        })
    }
}

/// Statistics for one trial sequence (or a pooled set of them).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SummaryStatistics {
    /// Completed trials the statistics were computed from.
    pub sample_size: usize,
    /// Trials that failed and were excluded.
    pub failed_trials: usize,
    pub success: ProportionEstimate,
    pub complication: ProportionEstimate,
    pub recovery_days: DistributionSummary,
    pub cost: DistributionSummary,
    pub cost_value_at_risk: Vec<ValueAtRisk>,
    /// Severity points removed per trial (`baseline · efficacy`).
    pub severity_reduction: DistributionSummary,
    /// Severity left after each trial.
    pub final_severity: DistributionSummary,
    /// Upper percentile of final severity at each configured VaR level.
    pub severity_value_at_risk: Vec<ValueAtRisk>,
}

impl SummaryStatistics {
    pub fn success_probability(&self) -> f64 {
        self.success.estimate
    }

    pub fn complication_probability(&self) -> f64 {
        self.complication.estimate
    }

    /// Cost VaR at exactly `confidence`, if it was requested.
    pub fn value_at_risk(&self, confidence: f64) -> Option<f64> {
        find_level(&self.cost_value_at_risk, confidence)
    }

    /// Final-severity VaR at exactly `confidence`, if it was requested.
    pub fn severity_at_risk(&self, confidence: f64) -> Option<f64> {
        find_level(&self.severity_value_at_risk, confidence)
    }
}

fn find_level(levels: &[ValueAtRisk], confidence: f64) -> Option<f64> {
    levels
        .iter()
        .find(|v| v.confidence == confidence)
        .map(|v| v.value)
}

/// Reduce one trial sequence. `failed_trials` is carried through, never dropped.
pub fn summarize_outcomes(
    outcomes: &[TrialOutcome],
    failed_trials: usize,
    cfg: &AggregationConfig,
) -> Result<SummaryStatistics, SimError> {
    let n = outcomes.len();
    let successes = outcomes.iter().filter(|o| o.success).count();
    let complications = outcomes.iter().filter(|o| o.complication).count();
    let recovery: Vec<f64> = outcomes.iter().map(|o| o.recovery_days).collect();
    let cost = sorted_copy(&outcomes.iter().map(|o| o.cost).collect::<Vec<_>>());
    let reduction: Vec<f64> = outcomes.iter().map(|o| o.severity_reduction).collect();
    let remaining = sorted_copy(&outcomes.iter().map(|o| o.final_severity).collect::<Vec<_>>());
    let at_levels = |sorted: &[f64]| -> Vec<ValueAtRisk> {
        cfg.var_levels
            .iter()
            .map(|&c| value_at_risk(sorted, c))
            .collect()
    };

    Ok(SummaryStatistics {
        sample_size: n,
        failed_trials,
        success: ProportionEstimate::from_counts(successes, n, &cfg.confidence_levels)?,
        complication: ProportionEstimate::from_counts(complications, n, &cfg.confidence_levels)?,
        recovery_days: DistributionSummary::from_values(&recovery, &cfg.percentiles),
        cost_value_at_risk: at_levels(&cost),
        cost: DistributionSummary::from_sorted(&cost, &cfg.percentiles),
        severity_reduction: DistributionSummary::from_values(&reduction, &cfg.percentiles),
        severity_value_at_risk: at_levels(&remaining),
        final_severity: DistributionSummary::from_sorted(&remaining, &cfg.percentiles),
    })
}

/// Summary for one (patient, treatment) pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairSummary {
    pub patient: Patient,
    pub treatment: TreatmentId,
    pub stats: SummaryStatistics,
    /// Adjusted mean efficacy the batch was sampled under.
    pub expected_efficacy: f64,
    /// Adjusted complication probability the batch was sampled under.
    pub adjusted_complication_probability: f64,
    /// Clamp events recorded while adjusting parameters for this pair.
    pub clamp_events: usize,
}

impl PairSummary {
    /// Baseline severity minus the final-severity VaR at `confidence`: the improvement the
    /// patient keeps in all but the worst `1 - confidence` share of trials.
    pub fn expected_improvement(&self, confidence: f64) -> Option<f64> {
        self.stats
            .severity_at_risk(confidence)
            .map(|v| self.patient.severity - v)
    }
}

/// Summaries for every (patient, treatment) pair of a cohort run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CohortResult {
    /// Treatments in declaration order.
    pub treatments: Vec<TreatmentId>,
    /// Patient ids in processing order.
    pub patient_ids: Vec<String>,
    /// Patient-major rows, treatments in declaration order.
    pub rows: Vec<PairSummary>,
}

impl CohortResult {
    pub fn get(&self, patient_id: &str, treatment: TreatmentId) -> Option<&PairSummary> {
        self.rows
            .iter()
            .find(|r| r.treatment == treatment && r.patient.id == patient_id)
    }

    /// One patient's rows, in treatment declaration order.
    pub fn for_patient(&self, patient_id: &str) -> Vec<&PairSummary> {
        self.rows
            .iter()
            .filter(|r| r.patient.id == patient_id)
            .collect()
    }

    pub fn total_failed_trials(&self) -> usize {
        self.rows.iter().map(|r| r.stats.failed_trials).sum()
    }

    pub fn total_clamp_events(&self) -> usize {
        self.rows.iter().map(|r| r.clamp_events).sum()
    }
}

impl CohortRun {
    /// Summarize every stored pair. Pure: same run + config → same result.
    pub fn summarize(&self, cfg: &AggregationConfig) -> Result<CohortResult, SimError> {
        cfg.validate()?;
        let mut rows = Vec::with_capacity(self.pairs.len());
        let mut patient_ids: Vec<String> = Vec::new();
        for pair in &self.pairs {
            if patient_ids.last() != Some(&pair.patient.id) {
                patient_ids.push(pair.patient.id.clone());
            }
            let stats = summarize_outcomes(&pair.batch.outcomes, pair.batch.failed_trials, cfg)?;
            rows.push(PairSummary {
                patient: pair.patient.clone(),
                treatment: pair.treatment,
                stats,
                expected_efficacy: pair.batch.adjusted.efficacy_mean,
                adjusted_complication_probability: pair.batch.adjusted.complication_probability,
                clamp_events: pair.batch.adjusted.clamps.len(),
            });
        }
        Ok(CohortResult {
            treatments: self.treatments.clone(),
            patient_ids,
            rows,
        })
    }

    /// Pooled statistics over all stored trials of `treatment`, restricted to patients
    /// accepted by `include`.
    fn pooled<F>(
        &self,
        treatment: TreatmentId,
        cfg: &AggregationConfig,
        include: F,
    ) -> Result<SummaryStatistics, SimError>
    where
        F: Fn(&Patient) -> bool,
    {
        let mut outcomes = Vec::new();
        let mut failed = 0usize;
        for pair in self
            .pairs
            .iter()
            .filter(|p| p.treatment == treatment && include(&p.patient))
        {
            outcomes.extend_from_slice(&pair.batch.outcomes);
            failed += pair.batch.failed_trials;
        }
        summarize_outcomes(&outcomes, failed, cfg)
    }
}

/// One row of the treatment comparison table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreatmentComparison {
    /// 1-based rank.
    pub rank: usize,
    pub treatment: TreatmentId,
    pub n_patients: usize,
    /// Statistics over all trials of this treatment, pooled across patients.
    pub pooled: SummaryStatistics,
    /// Spread of per-patient success probabilities.
    pub patient_success: DistributionSummary,
    pub mean_patient_complication: f64,
    pub mean_patient_recovery_days: f64,
    /// Mean over patients of each patient's mean severity reduction.
    pub mean_patient_severity_reduction: f64,
}

/// Rank treatments by pooled success probability (descending), then complication probability
/// (ascending), then declaration order.
pub fn compare_treatments(
    run: &CohortRun,
    cfg: &AggregationConfig,
) -> Result<Vec<TreatmentComparison>, SimError> {
    cfg.validate()?;
    let mut rows = Vec::with_capacity(run.treatments.len());
    for &t in &run.treatments {
        let pairs: Vec<_> = run.pairs.iter().filter(|p| p.treatment == t).collect();
        let per_patient = |f: fn(&TrialOutcome) -> f64| -> Vec<f64> {
            pairs
                .iter()
                .map(|p| {
                    let o = &p.batch.outcomes;
                    if o.is_empty() {
                        0.0
                    } else {
                        o.iter().map(f).sum::<f64>() / o.len() as f64
                    }
                })
                .collect()
        };
        let success = per_patient(|o| f64::from(u8::from(o.success)));
        let complication = per_patient(|o| f64::from(u8::from(o.complication)));
        let recovery = per_patient(|o| o.recovery_days);
        let reduction = per_patient(|o| o.severity_reduction);
        rows.push(TreatmentComparison {
            rank: 0,
            treatment: t,
            n_patients: pairs.len(),
            pooled: run.pooled(t, cfg, |_| true)?,
            patient_success: DistributionSummary::from_values(&success, &cfg.percentiles),
            mean_patient_complication: mean_std(&complication).0,
            mean_patient_recovery_days: mean_std(&recovery).0,
            mean_patient_severity_reduction: mean_std(&reduction).0,
        });
    }
    // Stable sort keeps declaration order on exact ties.
    rows.sort_by(|a, b| {
        b.pooled
            .success_probability()
            .total_cmp(&a.pooled.success_probability())
            .then_with(|| {
                a.pooled
                    .complication_probability()
                    .total_cmp(&b.pooled.complication_probability())
            })
    });
    for (i, r) in rows.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    Ok(rows)
}

/// Statistics for one treatment within a severity band.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StratumTreatment {
    pub treatment: TreatmentId,
    pub stats: SummaryStatistics,
}

/// One non-empty severity band.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskStratum {
    pub band: SeverityBand,
    pub n_patients: usize,
    pub mean_baseline_severity: f64,
    pub treatments: Vec<StratumTreatment>,
}

/// Cohort split into severity bands.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskStratification {
    /// Bands containing at least one patient, in band order.
    pub strata: Vec<RiskStratum>,
    /// Patients whose severity fell outside every band.
    pub unbanded_patients: usize,
}

/// Recompute per-treatment statistics within each configured severity band.
pub fn stratify_by_severity(
    run: &CohortRun,
    cfg: &AggregationConfig,
) -> Result<RiskStratification, SimError> {
    cfg.validate()?;
    let patients = run.patients();
    let mut unbanded_patients = 0usize;
    let mut members: Vec<Vec<&Patient>> = vec![Vec::new(); cfg.severity_bands.len()];
    for &p in &patients {
        match cfg.band_index(p.severity) {
            Some(i) => members[i].push(p),
            None => unbanded_patients += 1,
        }
    }

    let mut strata = Vec::new();
    for (i, band) in cfg.severity_bands.iter().enumerate() {
        let in_band = &members[i];
        if in_band.is_empty() {
            continue;
        }
        let severities: Vec<f64> = in_band.iter().map(|p| p.severity).collect();
        let treatments = run
            .treatments
            .iter()
            .map(|&t| {
                Ok(StratumTreatment {
                    treatment: t,
                    stats: run.pooled(t, cfg, |p| cfg.band_index(p.severity) == Some(i))?,
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        strata.push(RiskStratum {
            band: band.clone(),
            n_patients: in_band.len(),
            mean_baseline_severity: mean_std(&severities).0,
            treatments,
        });
    }
    if unbanded_patients > 0 {
        tracing::warn!(unbanded_patients, "patients outside every severity band");
    }
    Ok(RiskStratification {
        strata,
        unbanded_patients,
    })
}

/// Spread of per-patient success probabilities for one treatment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreatmentSuccessSpread {
    pub treatment: TreatmentId,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
}

/// Cohort-level headline numbers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CohortOverview {
    pub total_patients: usize,
    pub high_risk_patients: usize,
    pub low_risk_patients: usize,
    /// Mean over (patient, treatment) rows.
    pub mean_success_probability: f64,
    /// Mean over (patient, treatment) rows.
    pub mean_complication_probability: f64,
    pub total_trials: usize,
    pub total_failed_trials: usize,
    pub total_clamp_events: usize,
    pub per_treatment: Vec<TreatmentSuccessSpread>,
}

/// Headline numbers from summarized rows.
pub fn cohort_overview(result: &CohortResult, cfg: &AggregationConfig) -> CohortOverview {
    let severities: Vec<f64> = result
        .patient_ids
        .iter()
        .filter_map(|id| result.for_patient(id).first().map(|r| r.patient.severity))
        .collect();
    let success: Vec<f64> = result.rows.iter().map(|r| r.stats.success_probability()).collect();
    let complication: Vec<f64> = result
        .rows
        .iter()
        .map(|r| r.stats.complication_probability())
        .collect();

    let per_treatment = result
        .treatments
        .iter()
        .map(|&t| {
            let sorted = sorted_copy(
                &result
                    .rows
                    .iter()
                    .filter(|r| r.treatment == t)
                    .map(|r| r.stats.success_probability())
                    .collect::<Vec<_>>(),
            );
            let (mean, std_dev) = mean_std(&sorted);
            TreatmentSuccessSpread {
                treatment: t,
                mean,
                std_dev,
                median: percentile_sorted(&sorted, 50.0),
            }
        })
        .collect();

    CohortOverview {
        total_patients: result.patient_ids.len(),
        high_risk_patients: severities
            .iter()
            .filter(|&&s| s > cfg.high_risk_severity)
            .count(),
        low_risk_patients: severities
            .iter()
            .filter(|&&s| s < cfg.low_risk_severity)
            .count(),
        mean_success_probability: mean_std(&success).0,
        mean_complication_probability: mean_std(&complication).0,
        total_trials: result
            .rows
            .iter()
            .map(|r| r.stats.sample_size + r.stats.failed_trials)
            .sum(),
        total_failed_trials: result.total_failed_trials(),
        total_clamp_events: result.total_clamp_events(),
        per_treatment,
    }
}
