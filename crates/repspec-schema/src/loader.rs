//! Schema file loading and `$ref` crawling

use crate::index::SchemaIndex;
use crate::model::SchemaFile;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Loads RS schema file sets from a schema directory
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    schema_dir: PathBuf,
}

impl SchemaLoader {
    /// Create a loader rooted at `schema_dir`.
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Locate the schema file for an RS id (`<id>.schema.json`, `.yaml` or `.yml`).
    pub fn find_schema_file(&self, rs_id: &str) -> Result<PathBuf> {
        ["json", "yaml", "yml"]
            .iter()
            .map(|ext| self.schema_dir.join(format!("{rs_id}.schema.{ext}")))
            .find(|candidate| candidate.exists())
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "{rs_id} has no schema file in {}",
                    self.schema_dir.display()
                ))
            })
    }

    /// Load the schema of one RS together with every file it references.
    pub fn load_rs(&self, rs_id: &str) -> Result<SchemaIndex> {
        let path = self.find_schema_file(rs_id)?;
        info!("Loading schema for {}: {}", rs_id, path.display());
        self.load_index(&path)
    }

    /// Load the schema rooted at `path`, crawling `$ref`s eagerly so every
    /// reference resolves to a loaded file.
    pub fn load_index(&self, path: &Path) -> Result<SchemaIndex> {
        let root_path = normalize(path)?;
        let mut files: HashMap<PathBuf, Arc<SchemaFile>> = HashMap::new();
        let mut queue = VecDeque::from([root_path.clone()]);

        while let Some(next) = queue.pop_front() {
            if files.contains_key(&next) {
                continue;
            }
            let file = Arc::new(SchemaFile::new(next.clone(), Self::load_from_file(&next)?));

            for reference in collect_references(&file.root) {
                let Some(target) = reference_file(&reference) else {
                    continue;
                };
                let target_path = normalize(&file.dir().join(target))?;
                if !target_path.exists() {
                    return Err(Error::resolution(
                        reference,
                        format!(
                            "{} (referenced from {}) does not exist",
                            target_path.display(),
                            file.file_name()
                        ),
                    ));
                }
                if !files.contains_key(&target_path) && !queue.contains(&target_path) {
                    trace!("Queueing {} from {}", target_path.display(), file.file_name());
                    queue.push_back(target_path);
                }
            }

            debug!("Loaded schema file {}", file.path.display());
            files.insert(next, file);
        }

        let root = files
            .get(&root_path)
            .cloned()
            .ok_or_else(|| Error::NotFound(root_path.display().to_string()))?;
        Ok(SchemaIndex::new(root, files))
    }

    /// Read a JSON or YAML schema document, chosen by extension.
    pub fn load_from_file(path: &Path) -> Result<Value> {
        trace!("Loading schema from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::load_from_yaml(&content)
                .map_err(|e| Error::invalid_format(path.display().to_string(), e.to_string()))
        } else {
            Self::load_from_json(&content)
                .map_err(|e| Error::invalid_format(path.display().to_string(), e.to_string()))
        }
    }

    /// Parse a schema document from JSON text.
    pub fn load_from_json(json: &str) -> Result<Value> {
        serde_json::from_str(json)
            .map_err(|e| Error::invalid_format("<string>", format!("JSON parse error: {e}")))
    }

    /// Parse a schema document from YAML text.
    pub fn load_from_yaml(yaml: &str) -> Result<Value> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::invalid_format("<string>", format!("YAML parse error: {e}")))
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

/// File part of a reference, if the reference leaves the current file.
pub(crate) fn reference_file(reference: &str) -> Option<&str> {
    let file = reference.split('#').next().unwrap_or_default();
    (!file.is_empty()).then_some(file)
}

/// Every `$ref` string in a document.
fn collect_references(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![value];
    while let Some(current) = stack.pop() {
        match current {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    found.push(reference.clone());
                }
                stack.extend(map.values());
            }
            Value::Array(items) => stack.extend(items),
            _ => {}
        }
    }
    found
}

/// Absolute, lexically normalized form of `path`.
pub(crate) fn normalize(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
