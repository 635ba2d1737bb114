#![cfg(feature = "serde")]

use carecast::{SimError, SimulationConfig, TreatmentCatalog, TreatmentId};

#[test]
fn partial_config_falls_back_to_defaults() {
    let cfg: SimulationConfig = serde_json::from_str(
        r#"{
            "cohort": { "trial_count": 2500, "seed": 7 },
            "adjustment": { "severity_penalty": 0.3 },
            "scoring": { "age_override": 80.0 }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.cohort.trial_count, 2500);
    assert_eq!(cfg.cohort.seed, 7);
    assert_eq!(cfg.cohort.sample_size, None);
    assert_eq!(cfg.adjustment.severity_penalty, 0.3);
    assert_eq!(cfg.adjustment.age_scale, 100.0);
    assert_eq!(cfg.scoring.age_override, 80.0);
    assert_eq!(cfg.scoring.success_weight, 50.0);
    assert_eq!(cfg.aggregation.severity_bands.len(), 4);
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_round_trips() {
    let cfg = SimulationConfig::default();
    let json = serde_json::to_string(&cfg).unwrap();
    let back: SimulationConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn catalog_loads_by_name() {
    let catalog: TreatmentCatalog = serde_json::from_str(
        r#"[
            { "name": "Standard Care", "profile": {
                "efficacy_alpha": 6.5, "efficacy_beta": 3.5,
                "recovery_optimistic": 30.0, "recovery_likely": 60.0, "recovery_pessimistic": 120.0,
                "complication_probability": 0.10, "base_cost": 5000.0, "complication_cost": 8000.0 } },
            { "name": "experimental_treatment", "profile": {
                "efficacy_alpha": 7.2, "efficacy_beta": 2.8,
                "recovery_optimistic": 15.0, "recovery_likely": 40.0, "recovery_pessimistic": 100.0,
                "complication_probability": 0.25, "base_cost": 20000.0, "complication_cost": 18000.0 } }
        ]"#,
    )
    .unwrap();
    let ids: Vec<TreatmentId> = catalog.ids().collect();
    assert_eq!(
        ids,
        vec![TreatmentId::StandardCare, TreatmentId::ExperimentalTreatment]
    );
    assert!(matches!(
        catalog.profile(TreatmentId::IntensiveTherapy),
        Err(SimError::UnknownTreatment { .. })
    ));

    let back: TreatmentCatalog =
        serde_json::from_str(&serde_json::to_string(&catalog).unwrap()).unwrap();
    assert_eq!(back, catalog);
}

#[test]
fn unknown_or_invalid_catalog_entries_fail_at_load() {
    let unknown = r#"[{ "name": "Bloodletting", "profile": {
        "efficacy_alpha": 1.0, "efficacy_beta": 1.0,
        "recovery_optimistic": 1.0, "recovery_likely": 2.0, "recovery_pessimistic": 3.0,
        "complication_probability": 0.5, "base_cost": 1.0, "complication_cost": 1.0 } }]"#;
    let err = serde_json::from_str::<TreatmentCatalog>(unknown).unwrap_err();
    assert!(err.to_string().contains("Bloodletting"), "{err}");

    let zero_alpha = r#"[{ "name": "Standard Care", "profile": {
        "efficacy_alpha": 0.0, "efficacy_beta": 1.0,
        "recovery_optimistic": 1.0, "recovery_likely": 2.0, "recovery_pessimistic": 3.0,
        "complication_probability": 0.5, "base_cost": 1.0, "complication_cost": 1.0 } }]"#;
    assert!(serde_json::from_str::<TreatmentCatalog>(zero_alpha).is_err());

    assert!(serde_json::from_str::<TreatmentCatalog>("[]").is_err());
}
