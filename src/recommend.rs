//! Recommendation scorer: one patient's per-treatment statistics → a ranked recommendation.
//!
//! Score (default weights sum to 100):
//!
//! ```text
//! score = success * w_success + (1 - min(1, mean_recovery / ceiling)) * w_recovery
//!       + (1 - complication) * w_complication
//! ```
//!
//! Override rules win over the score, in this order:
//! 1. age above `age_override` or comorbidities above `comorbidity_override`
//!    → lowest complication probability goes first;
//! 2. severity above `severity_override` → highest success probability goes first;
//! 3. otherwise the highest score goes first.
//!
//! Every tie is broken by treatment declaration order. Treatments without a completed trial
//! never win a rule or a highlight and are ranked last.

use std::cmp::Ordering;

use crate::{Patient, SimError, SummaryStatistics, TreatmentId};

/// Scorer weights and override thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScoringConfig {
    pub success_weight: f64,
    pub recovery_weight: f64,
    pub complication_weight: f64,
    /// Mean recovery time (days) that normalizes to 1.
    pub recovery_ceiling_days: f64,
    pub age_override: f64,
    pub comorbidity_override: u32,
    pub severity_override: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            success_weight: 50.0,
            recovery_weight: 25.0,
            complication_weight: 25.0,
            recovery_ceiling_days: 180.0,
            age_override: 75.0,
            comorbidity_override: 3,
            severity_override: 70.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        for (name, w) in [
            ("success_weight", self.success_weight),
            ("recovery_weight", self.recovery_weight),
            ("complication_weight", self.complication_weight),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(SimError::config(format!(
                    "{name} must be finite and >= 0 (got {w})"
                )));
            }
        }
        if !(self.recovery_ceiling_days.is_finite() && self.recovery_ceiling_days > 0.0) {
            return Err(SimError::config("recovery_ceiling_days must be finite and > 0"));
        }
        if !(self.age_override.is_finite() && self.severity_override.is_finite()) {
            return Err(SimError::config("override thresholds must be finite"));
        }
        Ok(())
    }
}

/// Score of one treatment for one patient.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreatmentScore {
    pub treatment: TreatmentId,
    pub score: f64,
    pub success_probability: f64,
    pub complication_probability: f64,
    pub mean_recovery_days: f64,
    /// `mean_recovery_days / recovery_ceiling_days`, clamped to `[0, 1]`.
    pub normalized_recovery: f64,
    /// Completed trials behind the score; 0 means every trial failed.
    pub sample_size: usize,
}

/// Which patient attribute triggered the lowest-complication override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OverrideTrigger {
    Age,
    Comorbidities,
    AgeAndComorbidities,
}

/// The rule that chose the top treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecommendationRule {
    LowestComplicationOverride { trigger: OverrideTrigger },
    HighestSuccessOverride,
    HighestScore,
}

/// Per-metric winners, reported alongside the recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreatmentHighlights {
    pub highest_success: TreatmentId,
    pub lowest_complication: TreatmentId,
    /// Smallest median recovery time.
    pub fastest_recovery: TreatmentId,
}

/// Ranked treatments for one patient.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Recommendation {
    pub patient_id: String,
    /// Top treatment first; the rest by score descending.
    pub ranking: Vec<TreatmentScore>,
    pub rule: RecommendationRule,
    pub highlights: TreatmentHighlights,
}

impl Recommendation {
    pub fn top(&self) -> TreatmentId {
        self.ranking[0].treatment
    }
}

pub fn score_treatment(
    treatment: TreatmentId,
    stats: &SummaryStatistics,
    cfg: &ScoringConfig,
) -> TreatmentScore {
    let success = stats.success_probability();
    let complication = stats.complication_probability();
    let mean_recovery_days = stats.recovery_days.mean;
    let normalized_recovery = (mean_recovery_days / cfg.recovery_ceiling_days).clamp(0.0, 1.0);
    TreatmentScore {
        treatment,
        score: success * cfg.success_weight
            + (1.0 - normalized_recovery) * cfg.recovery_weight
            + (1.0 - complication) * cfg.complication_weight,
        success_probability: success,
        complication_probability: complication,
        mean_recovery_days,
        normalized_recovery,
        sample_size: stats.sample_size,
    }
}

/// First candidate whose key is strictly better than every earlier one.
/// `candidates` must be non-empty.
fn best_by<F>(candidates: &[usize], key: F, better: Ordering) -> usize
where
    F: Fn(usize) -> f64,
{
    let mut best = candidates[0];
    for &i in &candidates[1..] {
        if key(i).total_cmp(&key(best)) == better {
            best = i;
        }
    }
    best
}

/// Recommend a treatment for `patient` from statistics given in treatment declaration order.
///
/// Errors with [`SimError::InvalidConfiguration`] if `summaries` is empty, no treatment has a
/// completed trial, or `cfg` is invalid.
pub fn recommend(
    patient: &Patient,
    summaries: &[(TreatmentId, SummaryStatistics)],
    cfg: &ScoringConfig,
) -> Result<Recommendation, SimError> {
    cfg.validate()?;
    if summaries.is_empty() {
        return Err(SimError::config(format!(
            "patient `{}`: no treatment statistics to rank",
            patient.id
        )));
    }

    let scores: Vec<TreatmentScore> = summaries
        .iter()
        .map(|(t, s)| score_treatment(*t, s, cfg))
        .collect();
    let candidates: Vec<usize> = (0..scores.len())
        .filter(|&i| scores[i].sample_size > 0)
        .collect();
    if candidates.is_empty() {
        return Err(SimError::config(format!(
            "patient `{}`: every trial failed for every treatment",
            patient.id
        )));
    }
    let best = |key: fn(&TreatmentScore) -> f64, better| {
        best_by(&candidates, |i| key(&scores[i]), better)
    };

    let old = patient.age > cfg.age_override;
    let comorbid = patient.comorbidities > cfg.comorbidity_override;
    let trigger = match (old, comorbid) {
        (true, true) => Some(OverrideTrigger::AgeAndComorbidities),
        (true, false) => Some(OverrideTrigger::Age),
        (false, true) => Some(OverrideTrigger::Comorbidities),
        (false, false) => None,
    };
    let (forced, rule) = match trigger {
        Some(trigger) => (
            best(|s| s.complication_probability, Ordering::Less),
            RecommendationRule::LowestComplicationOverride { trigger },
        ),
        None if patient.severity > cfg.severity_override => (
            best(|s| s.success_probability, Ordering::Greater),
            RecommendationRule::HighestSuccessOverride,
        ),
        None => (
            best(|s| s.score, Ordering::Greater),
            RecommendationRule::HighestScore,
        ),
    };

    let highlights = TreatmentHighlights {
        highest_success: scores[best(|s| s.success_probability, Ordering::Greater)].treatment,
        lowest_complication: scores[best(|s| s.complication_probability, Ordering::Less)]
            .treatment,
        fastest_recovery: summaries[best_by(
            &candidates,
            |i| summaries[i].1.recovery_days.median,
            Ordering::Less,
        )]
        .0,
    };

    let mut rest: Vec<TreatmentScore> = candidates
        .iter()
        .filter(|&&i| i != forced)
        .map(|&i| scores[i])
        .collect();
    // Stable: equal scores keep declaration order.
    rest.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut ranking = Vec::with_capacity(scores.len());
    ranking.push(scores[forced]);
    ranking.extend(rest);
    ranking.extend(scores.iter().filter(|s| s.sample_size == 0).copied());

    tracing::debug!(
        patient = %patient.id,
        top = %ranking[0].treatment,
        ?rule,
        "recommendation"
    );

    Ok(Recommendation {
        patient_id: patient.id.clone(),
        ranking,
        rule,
        highlights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{summarize_outcomes, AggregationConfig, TrialOutcome};
    use proptest::prelude::*;

    /// Statistics with exact success/complication rates out of 100 trials and a fixed recovery.
    fn stats(success: usize, complication: usize, recovery_days: f64) -> SummaryStatistics {
        let outcomes: Vec<TrialOutcome> = (0..100)
            .map(|i| TrialOutcome {
                efficacy: if i < success { 0.8 } else { 0.4 },
                success: i < success,
                severity_reduction: 0.0,
                final_severity: 0.0,
                recovery_days,
                complication: i < complication,
                cost: 1000.0,
            })
            .collect();
        summarize_outcomes(&outcomes, 0, &AggregationConfig::default()).unwrap()
    }

    fn table() -> Vec<(TreatmentId, SummaryStatistics)> {
        vec![
            (TreatmentId::StandardCare, stats(60, 10, 60.0)),
            (TreatmentId::IntensiveTherapy, stats(75, 18, 45.0)),
            (TreatmentId::ExperimentalTreatment, stats(80, 25, 40.0)),
        ]
    }

    #[test]
    fn score_formula() {
        let s = score_treatment(TreatmentId::StandardCare, &stats(60, 10, 90.0), &ScoringConfig::default());
        // 0.6 * 50 + (1 - 0.5) * 25 + 0.9 * 25
        assert!((s.score - 65.0).abs() < 1e-9);
        assert_eq!(s.normalized_recovery, 0.5);
        let slow = score_treatment(TreatmentId::StandardCare, &stats(60, 10, 400.0), &ScoringConfig::default());
        assert_eq!(slow.normalized_recovery, 1.0);
    }

    #[test]
    fn highest_score_without_overrides() {
        let p = Patient::new("P", 50.0, 40.0, 1, 25.0);
        let r = recommend(&p, &table(), &ScoringConfig::default()).unwrap();
        assert_eq!(r.rule, RecommendationRule::HighestScore);
        assert_eq!(r.top(), TreatmentId::ExperimentalTreatment);
        assert!(r.ranking.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn elderly_comorbid_patient_gets_lowest_complication() {
        let p = Patient::new("P", 90.0, 40.0, 5, 25.0);
        let r = recommend(&p, &table(), &ScoringConfig::default()).unwrap();
        assert_eq!(
            r.rule,
            RecommendationRule::LowestComplicationOverride {
                trigger: OverrideTrigger::AgeAndComorbidities
            }
        );
        assert_eq!(r.top(), TreatmentId::StandardCare);
        assert_eq!(r.ranking.len(), 3);
    }

    #[test]
    fn age_override_beats_severity_override() {
        let p = Patient::new("P", 80.0, 95.0, 0, 25.0);
        let r = recommend(&p, &table(), &ScoringConfig::default()).unwrap();
        assert_eq!(
            r.rule,
            RecommendationRule::LowestComplicationOverride { trigger: OverrideTrigger::Age }
        );
    }

    #[test]
    fn severe_patient_gets_highest_success() {
        // Highest success has the worst score here.
        let summaries = vec![
            (TreatmentId::StandardCare, stats(70, 5, 30.0)),
            (TreatmentId::IntensiveTherapy, stats(72, 90, 170.0)),
        ];
        let p = Patient::new("P", 50.0, 85.0, 1, 25.0);
        let r = recommend(&p, &summaries, &ScoringConfig::default()).unwrap();
        assert_eq!(r.rule, RecommendationRule::HighestSuccessOverride);
        assert_eq!(r.top(), TreatmentId::IntensiveTherapy);
        assert_eq!(r.ranking[1].treatment, TreatmentId::StandardCare);
    }

    #[test]
    fn ties_go_to_declaration_order() {
        let summaries = vec![
            (TreatmentId::IntensiveTherapy, stats(70, 10, 50.0)),
            (TreatmentId::StandardCare, stats(70, 10, 50.0)),
        ];
        for p in [
            Patient::new("P", 50.0, 40.0, 1, 25.0),
            Patient::new("P", 90.0, 40.0, 1, 25.0),
            Patient::new("P", 50.0, 90.0, 1, 25.0),
        ] {
            let r = recommend(&p, &summaries, &ScoringConfig::default()).unwrap();
            assert_eq!(r.top(), TreatmentId::IntensiveTherapy);
        }
    }

    #[test]
    fn highlights_pick_per_metric_winners() {
        let p = Patient::new("P", 50.0, 40.0, 1, 25.0);
        let h = recommend(&p, &table(), &ScoringConfig::default()).unwrap().highlights;
        assert_eq!(h.highest_success, TreatmentId::ExperimentalTreatment);
        assert_eq!(h.lowest_complication, TreatmentId::StandardCare);
        assert_eq!(h.fastest_recovery, TreatmentId::ExperimentalTreatment);
    }

    #[test]
    fn empty_input_is_rejected() {
        let p = Patient::new("P", 50.0, 40.0, 1, 25.0);
        assert!(recommend(&p, &[], &ScoringConfig::default())
            .unwrap_err()
            .is_invalid_configuration());
        let bad = ScoringConfig { recovery_ceiling_days: 0.0, ..Default::default() };
        assert!(recommend(&p, &table(), &bad).is_err());
    }

    #[test]
    fn treatment_without_completed_trials_never_wins() {
        let all_failed = summarize_outcomes(&[], 100, &AggregationConfig::default()).unwrap();
        let summaries = vec![
            (TreatmentId::StandardCare, all_failed.clone()),
            (TreatmentId::IntensiveTherapy, stats(70, 20, 50.0)),
            (TreatmentId::ExperimentalTreatment, stats(65, 30, 40.0)),
        ];
        for p in [
            Patient::new("P", 50.0, 40.0, 1, 25.0),
            Patient::new("P", 90.0, 40.0, 5, 25.0),
            Patient::new("P", 50.0, 90.0, 1, 25.0),
        ] {
            let r = recommend(&p, &summaries, &ScoringConfig::default()).unwrap();
            assert_ne!(r.top(), TreatmentId::StandardCare, "{:?}", r.rule);
            assert_eq!(r.ranking.len(), 3);
            assert_eq!(r.ranking[2].treatment, TreatmentId::StandardCare);
            assert_eq!(r.ranking[2].sample_size, 0);
            assert_eq!(r.highlights.lowest_complication, TreatmentId::IntensiveTherapy);
            assert_eq!(r.highlights.fastest_recovery, TreatmentId::ExperimentalTreatment);
        }

        let nothing = vec![
            (TreatmentId::StandardCare, all_failed.clone()),
            (TreatmentId::IntensiveTherapy, all_failed),
        ];
        let p = Patient::new("P", 50.0, 40.0, 1, 25.0);
        assert!(recommend(&p, &nothing, &ScoringConfig::default())
            .unwrap_err()
            .is_invalid_configuration());
    }

    proptest! {
        #[test]
        fn ranking_is_a_permutation_with_override_on_top(
            rates in prop::collection::vec((0usize..=100, 0usize..=100, 1.0f64..300.0), 3),
            age in 1.0f64..110.0,
            severity in 0.0f64..100.0,
            comorbidities in 0u32..8,
        ) {
            let summaries: Vec<_> = TreatmentId::ALL
                .iter()
                .zip(&rates)
                .map(|(&t, &(s, c, r))| (t, stats(s, c, r)))
                .collect();
            let p = Patient::new("P", age, severity, comorbidities, 25.0);
            let r = recommend(&p, &summaries, &ScoringConfig::default()).unwrap();
            let mut ids: Vec<_> = r.ranking.iter().map(|s| s.treatment).collect();
            ids.sort();
            prop_assert_eq!(ids, TreatmentId::ALL.to_vec());
            let top = r.ranking[0];
            match r.rule {
                RecommendationRule::LowestComplicationOverride { .. } => {
                    prop_assert!(r.ranking.iter().all(|s| top.complication_probability <= s.complication_probability));
                }
                RecommendationRule::HighestSuccessOverride => {
                    prop_assert!(r.ranking.iter().all(|s| top.success_probability >= s.success_probability));
                }
                RecommendationRule::HighestScore => {
                    prop_assert!(r.ranking.iter().all(|s| top.score >= s.score));
                }
            }
        }
    }
}
