//! Simulate a small cohort against the reference catalog and print the headline numbers.
//!
//! ```text
//! RUST_LOG=carecast=debug cargo run --example cohort_quickstart
//! ```

use carecast::{simulate_cohort, Patient, SimError, SimulationConfig, TreatmentCatalog};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), SimError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let patients = vec![
        Patient::new("PT000001", 45.0, 5.0, 1, 27.0),
        Patient::new("PT000002", 68.0, 55.0, 2, 31.5),
        Patient::new("PT000003", 90.0, 40.0, 5, 24.0),
        Patient::new("PT000004", 52.0, 82.0, 0, 29.0),
        Patient::new("PT000005", 33.0, 18.0, 0, 22.0),
        Patient::new("PT000006", 59.0, 64.0, 3, 35.0),
    ];
    let mut cfg = SimulationConfig::default();
    cfg.cohort.trial_count = 5_000;

    let report = simulate_cohort(&patients, &TreatmentCatalog::reference(), &cfg)?;

    println!("treatment comparison");
    for c in &report.comparison {
        let ci = c.pooled.success.interval(0.95);
        println!(
            "  #{} {:<24} success {:.3} [{:.3}, {:.3}]  complication {:.3}  median recovery {:.1}d  severity -{:.1}  VaR95 {:.0}",
            c.rank,
            c.treatment,
            c.pooled.success_probability(),
            ci.map_or(0.0, |ci| ci.lower),
            ci.map_or(1.0, |ci| ci.upper),
            c.pooled.complication_probability(),
            c.pooled.recovery_days.median,
            c.mean_patient_severity_reduction,
            c.pooled.value_at_risk(0.95).unwrap_or(f64::NAN),
        );
    }

    println!("risk strata");
    for s in &report.stratification.strata {
        println!(
            "  {:<10} patients {:>2}  mean severity {:.1}",
            s.band.label, s.n_patients, s.mean_baseline_severity
        );
        for t in &s.treatments {
            println!(
                "    {:<24} success {:.3}",
                t.treatment,
                t.stats.success_probability()
            );
        }
    }

    println!("recommendations");
    for r in &report.recommendations {
        println!(
            "  {}  {:<24} score {:.1}  ({:?})",
            r.patient_id,
            r.top(),
            r.ranking[0].score,
            r.rule
        );
    }

    let o = &report.overview;
    println!(
        "overview: {} patients ({} high risk, {} low risk), {} trials, {} failed, {} clamp events",
        o.total_patients,
        o.high_risk_patients,
        o.low_risk_patients,
        o.total_trials,
        o.total_failed_trials,
        o.total_clamp_events
    );
    Ok(())
}
