use anyhow::Result;
use repspec_schema::SchemaRegistry;
use repspec_validation::prune::rs_at;
use repspec_validation::{Error, ValidationEngine, prune};
use serde_json::Value;
use std::path::{Path, PathBuf};

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::new(repo_root().join("testdata/schema"))
}

fn load(relative: &str) -> Result<Value> {
    let text = std::fs::read_to_string(repo_root().join(relative))?;
    if Path::new(relative).extension().is_some_and(|e| e == "yaml") {
        Ok(serde_yaml::from_str(&text)?)
    } else {
        Ok(serde_json::from_str(&text)?)
    }
}

fn failure_messages(rs: &str, relative: &str) -> Result<Vec<String>> {
    let index = registry().get_or_load(rs)?;
    let doc = load(relative)?;
    match ValidationEngine::new(&index).validate(&doc, relative) {
        Ok(report) => panic!("{relative} unexpectedly valid: {report}"),
        Err(Error::Validation(failure)) => {
            assert_eq!(failure.rs, rs);
            assert!(!failure.fallback);
            Ok(failure.messages)
        }
        Err(other) => Err(other.into()),
    }
}

#[test]
fn test_examples_are_valid() -> Result<()> {
    let registry = registry();
    for (rs, relative) in [
        ("RS0001", "testdata/examples/RS0001/chiller.RS0001.json"),
        ("RS0002", "testdata/examples/RS0002/unitary.RS0002.json"),
        ("RS0003", "testdata/examples/RS0003/fan_discrete.RS0003.json"),
        ("RS0004", "testdata/examples/RS0004/blower.RS0004.yaml"),
    ] {
        let index = registry.get_or_load(rs)?;
        let report = ValidationEngine::new(&index).validate(&load(relative)?, relative)?;
        assert_eq!(report.rs, rs);
    }
    Ok(())
}

#[test]
fn test_short_lookup_is_schema_valid() -> Result<()> {
    let index = registry().get_or_load("RS0003")?;
    let doc = load("testdata/invalid/fan_short_lookup.RS0003.json")?;
    ValidationEngine::new(&index).validate(&doc, "fan_short_lookup")?;
    Ok(())
}

#[test]
fn test_nested_fan_errors_are_attributed_to_its_rs() -> Result<()> {
    let messages = failure_messages("RS0002", "testdata/invalid/unitary_bad_fan.RS0002.json")?;
    assert_eq!(messages.len(), 2, "{messages:?}");
    for expected in [
        "\"nominal_standard_air_volumetric_flow_rate\" is a required property \
         (performance.indoor_fan_representation.performance)",
        "\"yes\" is not of type \"boolean\" \
         (performance.indoor_fan_representation.performance.is_enclosed)",
    ] {
        assert!(messages.iter().any(|m| m == expected), "{expected} not in {messages:?}");
    }
    Ok(())
}

#[test]
fn test_value_errors_are_numbered_once() -> Result<()> {
    let messages = failure_messages("RS0001", "testdata/invalid/chiller_bad_values.RS0001.json")?;
    assert_eq!(messages.len(), 2, "{messages:?}");
    for expected in [
        "\"VARIABLE\" is not one of \"DISCRETE\" or \"CONTINUOUS\" \
         (performance.compressor_speed_control_type)",
        "1.5 is greater than the maximum of 1.0 (performance.cycling_degradation_coefficient)",
    ] {
        assert!(messages.iter().any(|m| m == expected), "{expected} not in {messages:?}");
    }
    Ok(())
}

#[test]
fn test_reported_paths_stay_inside_selected_branches() -> Result<()> {
    let index = registry().get_or_load("RS0002")?;
    let doc = load("testdata/invalid/unitary_bad_fan.RS0002.json")?;
    let violations = ValidationEngine::new(&index).violations(&doc)?;
    let kept = prune(&index, &violations, &doc, "RS0002")?;
    assert!(!kept.is_empty());
    for violation in &kept {
        assert!(!violation.is_alternative());
        let rs = rs_at(&doc, &violation.path).unwrap_or("RS0002");
        assert_eq!(rs, "RS0003", "{} at {:?}", violation.message, violation.path);
    }
    Ok(())
}

#[test]
fn test_missing_metadata_reports_unknown_rs() -> Result<()> {
    let index = registry().get_or_load("RS0004")?;
    let doc = serde_json::json!({"performance": {"rated_power": 1.0}});
    let err = ValidationEngine::new(&index)
        .validate(&doc, "bare.json")
        .unwrap_err();
    let failure = err.failure().expect("validation failure");
    assert_eq!(failure.rs, "unknown");
    assert_eq!(failure.description, "bare.json");
    assert!(failure
        .messages
        .contains(&"\"metadata\" is a required property (root)".to_string()));
    Ok(())
}
