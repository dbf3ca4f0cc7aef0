//! Configuration tests.
//!
//! Tests cover: production defaults and partial overrides from JSON.

use mixtrace_core::config::AnalysisConfig;
use rust_decimal_macros::dec;

#[test]
fn defaults_match_production_constants() {
    let c = AnalysisConfig::default();

    assert_eq!(c.fixed_amount.window_secs, 300);
    assert_eq!(c.fixed_amount.tolerance, dec!(0.02));
    assert_eq!(c.fixed_amount.min_repeats, 3);
    assert_eq!(c.fixed_amount.denominations, vec![dec!(0.1), dec!(1), dec!(10)]);
    assert_eq!(c.multi_io.max_output_cv, Some(0.30));
    assert_eq!(c.looping.max_depth, 5);
    assert_eq!(c.looping.causal_max_depth, 4);
    assert_eq!(c.relayer.max_amount_ratio, dec!(1.02));
    assert_eq!(c.peel_chain.max_gap_secs, 86_400);
    assert_eq!(c.trace.detect_depth, 2);
    assert_eq!(c.trace.detect_history, 10);
}

#[test]
fn partial_file_overrides_only_named_values() {
    let path = std::env::temp_dir().join(format!("mixtrace-config-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{ "looping": { "retain_on_loop": 10 }, "relayer": { "threshold": 0.8 } }"#,
    )
    .expect("write config");

    let c = AnalysisConfig::load(&path).expect("load config");
    std::fs::remove_file(&path).ok();

    assert_eq!(c.looping.retain_on_loop, Some(10));
    assert_eq!(c.looping.max_depth, 5, "Unnamed fields keep their defaults");
    assert_eq!(c.relayer.threshold, 0.8);
    assert_eq!(c.relayer.window_secs, 300);
    assert_eq!(c.peel_chain.min_length, 4, "Missing sections keep their defaults");
}

#[test]
fn missing_file_is_an_error() {
    assert!(AnalysisConfig::load("/nonexistent/mixtrace.json").is_err());
}
