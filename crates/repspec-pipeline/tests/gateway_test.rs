use anyhow::Result;
use repspec_ir::compare::DEFAULT_REL_TOL;
use repspec_ir::values_near_equal;
use repspec_pipeline::{
    generate_templates, translate_directory, validate_directory, Error, Format, Gateway, GatewayConfig,
    TemplateSet, TemplateSpec,
};
use std::path::{Path, PathBuf};

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

fn gateway() -> Gateway {
    Gateway::new(GatewayConfig::new().schema_dir(repo_root().join("testdata/schema")))
}

const EXAMPLES: [&str; 4] = [
    "testdata/examples/RS0001/chiller.RS0001.json",
    "testdata/examples/RS0002/unitary.RS0002.json",
    "testdata/examples/RS0003/fan_discrete.RS0003.json",
    "testdata/examples/RS0004/blower.RS0004.yaml",
];

fn file_names(failures: &[repspec_pipeline::FileFailure]) -> Vec<String> {
    failures
        .iter()
        .filter_map(|f| f.path.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_examples_survive_every_container() -> Result<()> {
    let gateway = gateway();
    let dir = tempfile::tempdir()?;
    for example in EXAMPLES {
        let source = repo_root().join(example);
        let original = gateway.load(&source)?;
        for format in Format::ALL {
            let stem = source.file_stem().unwrap_or_default().to_string_lossy();
            let target = dir.path().join(format!("{stem}.{}", format.extension()));
            gateway.translate(&source, &target)?;
            let back = gateway.load(&target)?;
            assert!(
                values_near_equal(&back, &original, DEFAULT_REL_TOL, 0.0),
                "{example} changed through {format}"
            );
        }
    }
    Ok(())
}

#[test]
fn test_translate_directory_keeps_layout() -> Result<()> {
    let gateway = gateway();
    let out = tempfile::tempdir()?;
    let written = translate_directory(
        &gateway,
        &repo_root().join("testdata/examples"),
        out.path(),
        Format::Cbor,
    )?;
    assert_eq!(written.len(), 4);
    assert!(out.path().join("RS0001/chiller.RS0001.cbor").is_file());
    assert!(out.path().join("RS0004/blower.RS0004.cbor").is_file());
    Ok(())
}

#[test]
fn test_translate_directory_reports_structural_failures() {
    let gateway = gateway();
    let out = tempfile::tempdir().unwrap();
    let err = translate_directory(
        &gateway,
        &repo_root().join("testdata/invalid"),
        out.path(),
        Format::Xlsx,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Batch { .. }));
    assert!(file_names(err.failures()).contains(&"fan_short_lookup.RS0003.json".to_string()));
    assert!(!out.path().join("fan_short_lookup.RS0003.xlsx").exists());
}

#[test]
fn test_validate_directory() -> Result<()> {
    let gateway = gateway();
    let reports = validate_directory(&gateway, &repo_root().join("testdata/examples"))?;
    assert_eq!(reports.len(), 4);

    let err = validate_directory(&gateway, &repo_root().join("testdata/invalid")).unwrap_err();
    assert_eq!(
        file_names(err.failures()),
        vec!["chiller_bad_values.RS0001.json", "unitary_bad_fan.RS0002.json"]
    );
    assert!(err.to_string().starts_with("validate failed for 2 file(s):"));
    Ok(())
}

#[test]
fn test_validation_failure_is_aggregated() {
    let err = gateway()
        .validate(&repo_root().join("testdata/invalid/chiller_bad_values.RS0001.json"))
        .unwrap_err();
    let Error::Validation(inner) = &err else {
        panic!("expected a validation error, got {err}");
    };
    let failure = inner.failure().unwrap();
    assert_eq!(failure.rs, "RS0001");
    assert_eq!(failure.messages.len(), 2);
}

#[test]
fn test_generate_templates_from_config() -> Result<()> {
    let gateway = gateway();
    let set = TemplateSet::from_file(&repo_root().join("testdata/config/templates.json"))?;
    let out = tempfile::tempdir()?;
    let written = generate_templates(&gateway, out.path(), &set.templates)?;
    let names: Vec<_> = written
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "RS0001-template.xlsx",
            "RS0002-continuous-fan-template.xlsx",
            "RS0003-discrete-template.xlsx"
        ]
    );
    assert!(written.iter().all(|p| p.is_file()));
    Ok(())
}

#[test]
fn test_template_without_selector_fails_and_names_file() {
    let gateway = gateway();
    let out = tempfile::tempdir().unwrap();
    let specs = [TemplateSpec::new("RS0002"), TemplateSpec::new("RS0004")];
    let err = generate_templates(&gateway, out.path(), &specs).unwrap_err();
    assert_eq!(file_names(err.failures()), vec!["RS0002-template.xlsx"]);
    assert!(out.path().join("RS0004-template.xlsx").is_file());
    assert!(!out.path().join("RS0002-template.xlsx").exists());
}

#[test]
fn test_template_as_json() -> Result<()> {
    let out = tempfile::tempdir()?;
    let path = out.path().join("blower.json");
    gateway().template(&TemplateSpec::new("RS0004").template_config(), &path)?;
    let content: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(content["metadata"]["schema"], "RS0004");
    Ok(())
}

#[test]
fn test_unsupported_output_is_rejected() {
    let err = gateway()
        .translate(
            &repo_root().join(EXAMPLES[3]),
            Path::new("blower.txt"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "txt"));
}
