use anyhow::Result;
use repspec_schema::{SchemaIndex, SchemaLoader, SchemaRegistry, Shape};
use serde_json::Value;
use std::path::PathBuf;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

fn load_example(relative: &str) -> Result<Value> {
    let text = std::fs::read_to_string(repo_root().join(relative))?;
    Ok(serde_json::from_str(&text)?)
}

/// Collect every (lineage, selectors) pair of a document, deriving selectors from content.
fn lineages(
    index: &SchemaIndex,
    value: &Value,
    lineage: &mut Vec<String>,
    selectors: &mut Vec<Option<usize>>,
    out: &mut Vec<(Vec<String>, Vec<Option<usize>>)>,
) -> Result<()> {
    if let Value::Object(map) = value {
        for (key, child) in map {
            lineage.push(key.clone());
            selectors.push(None);
            let node = index.resolve(lineage.as_slice(), selectors.as_slice())?;
            let selector = index.selector_for_content(&node, child)?;
            *selectors.last_mut().unwrap() = selector;
            out.push((lineage.clone(), selectors.clone()));
            let next = match child {
                Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
                other => other.clone(),
            };
            lineages(index, &next, lineage, selectors, out)?;
            lineage.pop();
            selectors.pop();
        }
    }
    Ok(())
}

#[test]
fn every_example_lineage_resolves() -> Result<()> {
    let registry = SchemaRegistry::new(repo_root().join("testdata/schema"));
    for (rs, example) in [
        ("RS0001", "testdata/examples/RS0001/chiller.RS0001.json"),
        ("RS0002", "testdata/examples/RS0002/unitary.RS0002.json"),
        ("RS0003", "testdata/examples/RS0003/fan_discrete.RS0003.json"),
    ] {
        let index = registry.get_or_load(rs)?;
        let content = load_example(example)?;
        let mut found = Vec::new();
        lineages(&index, &content, &mut Vec::new(), &mut Vec::new(), &mut found)?;
        assert!(!found.is_empty());

        for (lineage, selectors) in &found {
            let first = index.resolve(lineage.as_slice(), selectors.as_slice())?;
            let second = index.resolve(lineage.as_slice(), selectors.as_slice())?;
            assert!(first.same_location(&second), "unstable resolution for {lineage:?}");
        }
    }
    Ok(())
}

#[test]
fn nested_representation_selects_its_own_fields() -> Result<()> {
    let loader = SchemaLoader::new(repo_root().join("testdata/schema"));
    let index = loader.load_rs("RS0002")?;
    let outer = ["performance", "indoor_fan_representation"];
    let alternatives = index.resolve(&outer, &[])?;
    assert_eq!(alternatives.shape(), Shape::Alternatives);

    let fan = index
        .branch_index(&alternatives, "RS0003")?
        .expect("RS0003 branch");
    let lineage = [
        "performance",
        "indoor_fan_representation",
        "performance",
        "operation_speed_control_type",
    ];
    let node = index.resolve(&lineage, &[None, Some(fan), None, None])?;
    assert_eq!(node.representation(), "RS0003");
    assert_eq!(
        node.enumerants(),
        Some(vec!["CONTINUOUS".to_string(), "DISCRETE".to_string()])
    );

    let blower = index
        .branch_index(&alternatives, "RS0004")?
        .expect("RS0004 branch");
    let missing = index.try_resolve(&lineage, &[None, Some(blower), None, None])?;
    assert!(missing.is_none());
    Ok(())
}
