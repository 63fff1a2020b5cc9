//! RS pruning of alternative-branch violations
//!
//! A failed `oneOf`/`anyOf` carries the violations of every branch. Only the
//! branch the document actually selected is worth reporting: it is picked by
//! the nearest `metadata.schema` above (or at) the failing value, and by the
//! content itself when that RS is not one of the branch keys.

use crate::engine::Violation;
use crate::Result;
use repspec_schema::SchemaIndex;
use serde_json::Value;
use tracing::trace;

/// Reduce `violations` to those inside the branches `instance` selects.
///
/// `document_rs` is the RS of the whole document, used when no nested
/// `metadata.schema` is found along a violation path.
pub fn prune(
    index: &SchemaIndex,
    violations: &[Violation],
    instance: &Value,
    document_rs: &str,
) -> Result<Vec<Violation>> {
    let mut kept = Vec::new();
    prune_within(index, violations, instance, document_rs, 0, &mut kept)?;
    Ok(kept)
}

fn prune_within(
    index: &SchemaIndex,
    violations: &[Violation],
    instance: &Value,
    document_rs: &str,
    boundary: usize,
    kept: &mut Vec<Violation>,
) -> Result<()> {
    for violation in violations {
        let Some(schema) = violation.schema.as_ref().filter(|_| violation.is_alternative()) else {
            if violation.path.len() >= boundary {
                kept.push(violation.clone());
            }
            continue;
        };

        let rs = rs_at(instance, &violation.path).unwrap_or(document_rs);
        let mut selected = index.branch_index(schema, rs)?;
        if selected.is_none() {
            if let Some(content) = value_at(instance, &violation.path) {
                selected = index.selector_for_content(schema, content)?;
            }
        }

        match selected.and_then(|i| violation.branches.get(i)) {
            Some(branch) => {
                trace!(
                    "Keeping branch {} at {} ({} violations)",
                    branch.key,
                    violation.path.join("."),
                    branch.violations.len()
                );
                prune_within(
                    index,
                    &branch.violations,
                    instance,
                    document_rs,
                    violation.path.len(),
                    kept,
                )?;
            }
            None => kept.push(violation.without_branches()),
        }
    }
    Ok(())
}

/// Value at `path`, where array positions are decimal segments.
pub fn value_at<'v, S: AsRef<str>>(instance: &'v Value, path: &[S]) -> Option<&'v Value> {
    path.iter().try_fold(instance, |current, segment| {
        let segment = segment.as_ref();
        match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

/// Innermost `metadata.schema` declared along `path`, the value at `path`
/// included.
pub fn rs_at<'v, S: AsRef<str>>(instance: &'v Value, path: &[S]) -> Option<&'v str> {
    let mut current = instance;
    let mut rs = declared_rs(current);
    for segment in path {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return rs,
        };
        rs = declared_rs(current).or(rs);
    }
    rs
}

fn declared_rs(value: &Value) -> Option<&str> {
    value.get("metadata")?.get("schema")?.as_str()
}
