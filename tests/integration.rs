//! Integration tests for the reimburse engine.
//!
//! These tests verify end-to-end workflows: loading cases, building,
//! predicting, persisting and validating held out.

use reimburse::config::EngineConfig;
use reimburse::diagnostics::{DiagnosticEvent, RecordingSink, Verbosity};
use reimburse::model_selection::{cross_validate, train_test_split, KFold};
use reimburse::neighbors::{KSelection, KnnConfig, SimilarityIndex, SimilarityMetric, Weighting};
use reimburse::prelude::*;

const CASES: &str = r#"[
  {"input": {"trip_duration_days": 1, "miles_traveled": 55, "total_receipts_amount": 3.6}, "expected_output": 126.06},
  {"input": {"trip_duration_days": 1, "miles_traveled": 1082, "total_receipts_amount": 1809.49}, "expected_output": 446.94},
  {"input": {"trip_duration_days": 2, "miles_traveled": 13, "total_receipts_amount": 4.67}, "expected_output": 203.52},
  {"input": {"trip_duration_days": 3, "miles_traveled": 93, "total_receipts_amount": 1.42}, "expected_output": 364.51},
  {"input": {"trip_duration_days": 3, "miles_traveled": 121, "total_receipts_amount": 21.17}, "expected_output": 464.07},
  {"input": {"trip_duration_days": 4, "miles_traveled": 84, "total_receipts_amount": 1162.0}, "expected_output": 1207.16},
  {"input": {"trip_duration_days": 5, "miles_traveled": 130, "total_receipts_amount": 306.9}, "expected_output": 574.1},
  {"input": {"trip_duration_days": 5, "miles_traveled": 1000, "total_receipts_amount": 700.0}, "expected_output": 1800.0},
  {"input": {"trip_duration_days": 6, "miles_traveled": 204, "total_receipts_amount": 818.99}, "expected_output": 628.4},
  {"input": {"trip_duration_days": 8, "miles_traveled": 795, "total_receipts_amount": 1645.99}, "expected_output": 644.69},
  {"input": {"trip_duration_days": 8, "miles_traveled": 482, "total_receipts_amount": 1411.49}, "expected_output": 631.81},
  {"input": {"trip_duration_days": 9, "miles_traveled": 700, "total_receipts_amount": 1700.0}, "expected_output": 1050.12},
  {"input": {"trip_duration_days": 11, "miles_traveled": 740, "total_receipts_amount": 1171.99}, "expected_output": 902.09},
  {"input": {"trip_duration_days": 14, "miles_traveled": 1020, "total_receipts_amount": 1201.75}, "expected_output": 2337.73}
]"#;

fn cases() -> TrainingSet {
    TrainingSet::from_json_str(CASES).expect("fixture parses")
}

fn quick_config() -> EngineConfig {
    EngineConfig::default().with_trainer(TrainerConfig::default().with_max_iterations(300))
}

fn is_cent_rounded(v: f64) -> bool {
    (v * 100.0 - (v * 100.0).round()).abs() < 1e-6
}

#[test]
fn test_build_predict_workflow() {
    let data = cases();
    let sink = RecordingSink::new(Verbosity::Verbose);
    let engine = Engine::build(&data, quick_config(), &sink).expect("build");

    assert_eq!(
        sink.count(|e| matches!(e, DiagnosticEvent::BuildStarted { examples: 14 })),
        1
    );
    assert_eq!(sink.count(|e| matches!(e, DiagnosticEvent::BuildFinished)), 1);

    for ex in &data {
        let p = engine.predict_trip(ex.trip());
        assert!(p.is_finite() && p >= 0.0);
        assert!(is_cent_rounded(p));
    }

    let eval = Evaluation::evaluate(&engine, &data, 3);
    assert_eq!(eval.n, 14);
    assert_eq!(eval.worst.len(), 3);
    assert!(eval.mae.is_finite());
}

#[test]
fn test_long_overspending_trip_gets_category_minimum() {
    let engine = Engine::build(&cases(), quick_config(), &SilentSink).expect("build");
    let p = engine.explain(&Trip::new(8, 795.0, 1645.99).expect("valid"));
    assert_eq!(p.lookup_rule.as_deref(), Some("long_trip_overspend"));
    assert_eq!(p.components.lookup, 644.69);
}

#[test]
fn test_single_day_trips_route_differently() {
    let engine = Engine::build(&cases(), quick_config(), &SilentSink).expect("build");
    let far = engine.explain(&Trip::new(1, 1082.0, 1809.49).expect("valid"));
    let near = engine.explain(&Trip::new(1, 50.0, 10.0).expect("valid"));
    assert_ne!(far.ensemble_rule, near.ensemble_rule);
}

#[test]
fn test_save_load_preserves_predictions() {
    let engine = Engine::build(&cases(), quick_config(), &SilentSink).expect("build");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("engine.json");
    engine.save(&path).expect("save");

    let loaded = Engine::load(&path).expect("load");
    for (d, m, r) in [(1, 20.0, 5.0), (4, 300.0, 420.5), (12, 900.0, 2100.0)] {
        assert_eq!(
            loaded.predict(d, m, r).expect("valid"),
            engine.predict(d, m, r).expect("valid")
        );
    }
}

#[test]
fn test_config_file_drives_build() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"trainer": {"max_iterations": 100}, "corrections": [{"kind": "clamp", "min": 0.0, "max": 500.0}]}"#,
    )
    .expect("write");
    let config = EngineConfig::from_json_file(&path).expect("config");
    let engine = Engine::build(&cases(), config, &SilentSink).expect("build");
    assert!(engine.predict(14, 1020.0, 1201.75).expect("valid") <= 500.0);
}

#[test]
fn test_knn_with_all_neighbors_uniform_is_mean() {
    let data = cases();
    let index = SimilarityIndex::new(&data);
    let config = KnnConfig::single(SimilarityMetric::Euclidean, data.len())
        .with_weighting(Weighting::Uniform);
    let mean = data.targets().iter().sum::<f64>() / data.len() as f64;
    let p = index.predict_with(&Trip::new(3, 100.0, 100.0).expect("valid"), &config);
    assert!((p - mean).abs() < 0.006);
}

#[test]
fn test_held_out_validation() {
    let data = cases();
    let (train, test) = train_test_split(&data, 0.25, Some(9)).expect("split");
    assert_eq!(train.len() + test.len(), data.len());

    let engine = Engine::build(&train, quick_config(), &SilentSink).expect("build");
    let eval = Evaluation::evaluate(&engine, &test, 0);
    assert_eq!(eval.n, test.len());

    let config = quick_config().with_knn(KnnConfig::default().with_k(KSelection::Fixed { k: 3 }));
    let cv = cross_validate(&data, &config, &KFold::new(4).with_random_state(1), &SilentSink)
        .expect("cross-validate");
    assert_eq!(cv.total_cases(), data.len());
    assert!(cv.mean_mae().is_finite());
}

#[test]
fn test_training_data_errors() {
    assert!(TrainingSet::from_json_str("[]").is_err());
    assert!(TrainingSet::from_json_str("not json").is_err());
    let bad = r#"[{"input": {"trip_duration_days": 0, "miles_traveled": 1, "total_receipts_amount": 1}, "expected_output": 1}]"#;
    let err = TrainingSet::from_json_str(bad).expect_err("zero days");
    assert!(err.to_string().contains("record 0"));
}
