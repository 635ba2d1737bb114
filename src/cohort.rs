//! Cohort driver: every selected patient × every catalog treatment.
//!
//! Each (patient, treatment) pair gets its own `StdRng` seeded with [`pair_seed`], so
//! - treatments for one patient draw from independent streams,
//! - a pair's trials do not depend on which other patients or treatments were run,
//! - the `parallel` feature changes scheduling only; results are bit-identical.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    cohort_overview, compare_treatments, pair_seed, recommend, run_trials, stable_hash64,
    stratify_by_severity, AdjustmentConfig, CohortOverview, CohortResult, PairSummary, Patient,
    Recommendation, RiskStratification, ScoringConfig, SimError, SimulationConfig,
    TreatmentCatalog, TreatmentComparison, TreatmentEntry, TreatmentId, TrialBatch,
};

/// Trial volume, subsetting and seeding for one cohort run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CohortConfig {
    /// Trials per (patient, treatment) pair.
    pub trial_count: usize,
    /// Process only a seed-determined subset of this many patients.
    pub sample_size: Option<usize>,
    pub seed: u64,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            trial_count: 10_000,
            sample_size: None,
            seed: 42,
        }
    }
}

impl CohortConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.trial_count == 0 {
            return Err(SimError::config("trial_count must be > 0"));
        }
        if self.sample_size == Some(0) {
            return Err(SimError::config("sample_size must be > 0 when given"));
        }
        Ok(())
    }
}

/// Stored trials for one (patient, treatment) pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairRun {
    pub patient: Patient,
    pub treatment: TreatmentId,
    pub batch: TrialBatch,
}

/// Raw output of [`run_cohort`]: every pair's trial sequence, patient-major, treatments in
/// declaration order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CohortRun {
    pub seed: u64,
    pub trial_count: usize,
    pub treatments: Vec<TreatmentId>,
    pub pairs: Vec<PairRun>,
}

impl CohortRun {
    /// Processed patients, in processing order.
    pub fn patients(&self) -> Vec<&Patient> {
        let mut out: Vec<&Patient> = Vec::new();
        for pair in &self.pairs {
            if out.last().map(|p| &p.id) != Some(&pair.patient.id) {
                out.push(&pair.patient);
            }
        }
        out
    }

    pub fn total_failed_trials(&self) -> usize {
        self.pairs.iter().map(|p| p.batch.failed_trials).sum()
    }
}

/// Seed-determined subset of `patients`, returned in input order.
///
/// Patients are ranked by `stable_hash64(seed, id)` and the first `sample_size` kept, so the
/// subset depends only on the seed and the ids, not on input order.
pub fn select_patients(patients: &[Patient], sample_size: Option<usize>, seed: u64) -> Vec<&Patient> {
    let k = match sample_size {
        Some(k) if k < patients.len() => k,
        _ => return patients.iter().collect(),
    };
    let mut ranked: Vec<(u64, usize)> = patients
        .iter()
        .enumerate()
        .map(|(i, p)| (stable_hash64(seed, &p.id), i))
        .collect();
    ranked.sort_unstable();
    let mut keep: Vec<usize> = ranked[..k].iter().map(|&(_, i)| i).collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| &patients[i]).collect()
}

fn validate_inputs(
    patients: &[Patient],
    catalog: &TreatmentCatalog,
    adjustment: &AdjustmentConfig,
    cfg: &CohortConfig,
) -> Result<(), SimError> {
    if patients.is_empty() {
        return Err(SimError::config("patient set is empty"));
    }
    if catalog.is_empty() {
        return Err(SimError::config("treatment set is empty"));
    }
    cfg.validate()?;
    adjustment.validate()?;
    let mut seen = HashSet::with_capacity(patients.len());
    for p in patients {
        p.validate()?;
        if !seen.insert(p.id.as_str()) {
            return Err(SimError::config(format!("duplicate patient id `{}`", p.id)));
        }
    }
    for e in catalog.entries() {
        e.profile.validate()?;
    }
    Ok(())
}

fn run_pair(
    patient: &Patient,
    entry: &TreatmentEntry,
    adjustment: &AdjustmentConfig,
    cfg: &CohortConfig,
) -> Result<PairRun, SimError> {
    let mut rng = StdRng::seed_from_u64(pair_seed(cfg.seed, &patient.id, entry.id));
    let batch = run_trials(patient, entry, adjustment, cfg.trial_count, &mut rng)?;
    Ok(PairRun {
        patient: patient.clone(),
        treatment: entry.id,
        batch,
    })
}

/// Run every selected patient against every catalog treatment.
///
/// All inputs are validated before any sampling; on error no partial run is returned.
pub fn run_cohort(
    patients: &[Patient],
    catalog: &TreatmentCatalog,
    adjustment: &AdjustmentConfig,
    cfg: &CohortConfig,
) -> Result<CohortRun, SimError> {
    validate_inputs(patients, catalog, adjustment, cfg)?;
    let selected = select_patients(patients, cfg.sample_size, cfg.seed);
    let jobs: Vec<(&Patient, &TreatmentEntry)> = selected
        .iter()
        .flat_map(|&p| catalog.entries().iter().map(move |e| (p, e)))
        .collect();

    tracing::info!(
        patients = selected.len(),
        treatments = catalog.len(),
        trials = cfg.trial_count,
        seed = cfg.seed,
        "cohort run starting"
    );

    #[cfg(feature = "parallel")]
    let pairs = jobs
        .par_iter()
        .map(|&(p, e)| run_pair(p, e, adjustment, cfg))
        .collect::<Result<Vec<_>, SimError>>()?;
    #[cfg(not(feature = "parallel"))]
    let pairs = jobs
        .iter()
        .map(|&(p, e)| run_pair(p, e, adjustment, cfg))
        .collect::<Result<Vec<_>, SimError>>()?;

    let run = CohortRun {
        seed: cfg.seed,
        trial_count: cfg.trial_count,
        treatments: catalog.ids().collect(),
        pairs,
    };
    tracing::info!(
        pairs = run.pairs.len(),
        failed_trials = run.total_failed_trials(),
        clamp_events = run.pairs.iter().map(|p| p.batch.adjusted.clamps.len()).sum::<usize>(),
        "cohort run finished"
    );
    Ok(run)
}

impl CohortResult {
    /// One recommendation per patient, in processing order.
    pub fn recommendations(&self, cfg: &ScoringConfig) -> Result<Vec<Recommendation>, SimError> {
        self.patient_ids
            .iter()
            .map(|id| {
                let rows = self.for_patient(id);
                let patient = rows
                    .first()
                    .map(|r| &r.patient)
                    .ok_or_else(|| SimError::config(format!("no rows for patient `{id}`")))?;
                let summaries: Vec<_> = rows.iter().map(|r| (r.treatment, r.stats.clone())).collect();
                recommend(patient, &summaries, cfg)
            })
            .collect()
    }
}

/// Every catalog treatment for one patient, with its recommendation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatientComparison {
    pub patient_id: String,
    /// One row per treatment, in declaration order.
    pub summaries: Vec<PairSummary>,
    pub recommendation: Recommendation,
}

/// Run and rank every catalog treatment for a single patient.
///
/// Uses the same per-pair seeding as [`run_cohort`], so the rows match that patient's rows in
/// a cohort run with the same seed and trial count.
pub fn compare_treatments_for_patient(
    patient: &Patient,
    catalog: &TreatmentCatalog,
    cfg: &SimulationConfig,
) -> Result<PatientComparison, SimError> {
    cfg.validate()?;
    let cohort = CohortConfig {
        sample_size: None,
        ..cfg.cohort
    };
    let run = run_cohort(std::slice::from_ref(patient), catalog, &cfg.adjustment, &cohort)?;
    let result = run.summarize(&cfg.aggregation)?;
    let summaries: Vec<PairSummary> = result.for_patient(&patient.id).into_iter().cloned().collect();
    let ranked: Vec<_> = summaries.iter().map(|r| (r.treatment, r.stats.clone())).collect();
    Ok(PatientComparison {
        patient_id: patient.id.clone(),
        recommendation: recommend(patient, &ranked, &cfg.scoring)?,
        summaries,
    })
}

/// Everything one cohort simulation produces.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CohortReport {
    /// Stored trials; every other field can be re-derived from it.
    pub run: CohortRun,
    pub result: CohortResult,
    pub comparison: Vec<TreatmentComparison>,
    pub stratification: RiskStratification,
    pub overview: CohortOverview,
    pub recommendations: Vec<Recommendation>,
}

/// Run the cohort and derive every report from the stored trials.
pub fn simulate_cohort(
    patients: &[Patient],
    catalog: &TreatmentCatalog,
    cfg: &SimulationConfig,
) -> Result<CohortReport, SimError> {
    cfg.validate()?;
    let run = run_cohort(patients, catalog, &cfg.adjustment, &cfg.cohort)?;
    let result = run.summarize(&cfg.aggregation)?;
    Ok(CohortReport {
        comparison: compare_treatments(&run, &cfg.aggregation)?,
        stratification: stratify_by_severity(&run, &cfg.aggregation)?,
        overview: cohort_overview(&result, &cfg.aggregation),
        recommendations: result.recommendations(&cfg.scoring)?,
        result,
        run,
    })
}
