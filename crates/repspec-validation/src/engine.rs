//! Validation engine
//!
//! Instances are checked by a `jsonschema` validator compiled from the RS root
//! file. Every file of the [`SchemaIndex`] is handed to the validator from
//! memory under its `file://` URI, so relative references land on the files
//! the loader already resolved.

use crate::prune::prune;
use crate::reporter::{ValidationFailure, ValidationReport};
use crate::{Error, Result};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Retrieve, Uri, ValidationError, Validator};
use repspec_schema::{SchemaIndex, SchemaNode, Shape};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, trace, warn};
use url::Url;

/// RS reported when a document does not name its own
pub const UNKNOWN_RS: &str = "unknown";

/// Validation configuration
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Drop violations from alternative branches the document did not select
    pub prune: bool,
    /// Report every violation when pruning leaves none
    pub fallback_to_all: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            prune: true,
            fallback_to_all: true,
        }
    }
}

/// One schema violation.
///
/// Violations of an alternative set (`oneOf`/`anyOf` with no valid branch)
/// keep the violations of every branch, keyed like the branch itself, along
/// with the schema node declaring the set.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Error message
    pub message: String,
    /// Path of the offending value in the document
    pub path: Vec<String>,
    /// Keyword that failed
    pub keyword: String,
    /// Alternative set the branches belong to
    pub schema: Option<SchemaNode>,
    /// Per-branch violations of a failed alternative set
    pub branches: Vec<BranchViolations>,
}

/// Violations raised inside one alternative branch
#[derive(Debug, Clone)]
pub struct BranchViolations {
    pub key: String,
    pub violations: Vec<Violation>,
}

impl Violation {
    /// Whether this violation carries per-branch violations.
    pub fn is_alternative(&self) -> bool {
        self.schema.is_some() && !self.branches.is_empty()
    }

    /// Copy without the branch breakdown.
    #[must_use]
    pub fn without_branches(&self) -> Self {
        Self {
            schema: None,
            branches: Vec::new(),
            ..self.clone()
        }
    }
}

/// Schema files served to the validator, keyed by `file://` URI
struct LoadedFiles {
    documents: HashMap<String, Value>,
}

impl Retrieve for LoadedFiles {
    fn retrieve(
        &self,
        uri: &Uri<String>,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let key = uri.as_str().split('#').next().unwrap_or_default();
        self.documents
            .get(key)
            .cloned()
            .ok_or_else(|| format!("{key} is not part of the loaded schema set").into())
    }
}

fn file_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}

/// Main validation engine
pub struct ValidationEngine<'a> {
    index: &'a SchemaIndex,
    config: ValidationConfig,
}

/// RS id named by the document's `metadata.schema`.
pub fn document_rs(instance: &Value) -> Option<&str> {
    instance.get("metadata")?.get("schema")?.as_str()
}

/// Description named by the document's `metadata.description`.
pub fn document_description(instance: &Value) -> Option<&str> {
    instance.get("metadata")?.get("description")?.as_str()
}

impl<'a> ValidationEngine<'a> {
    /// Create a new validation engine
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self::with_config(index, ValidationConfig::default())
    }

    /// Create with specific configuration
    pub fn with_config(index: &'a SchemaIndex, config: ValidationConfig) -> Self {
        Self { index, config }
    }

    /// Validate a document, reporting only violations of the branches it selects.
    ///
    /// `fallback_description` names the document when it carries no
    /// `metadata.description`.
    pub fn validate(&self, instance: &Value, fallback_description: &str) -> Result<ValidationReport> {
        let rs = document_rs(instance).unwrap_or(UNKNOWN_RS).to_string();
        let description = document_description(instance)
            .unwrap_or(fallback_description)
            .to_string();

        let violations = self.violations(instance)?;
        if violations.is_empty() {
            info!("Validation successful for {}", description);
            return Ok(ValidationReport { rs, description });
        }
        debug!("{} raw violations for {}", violations.len(), description);

        let mut fallback = false;
        let reported = if self.config.prune {
            let kept = prune(self.index, &violations, instance, &rs)?;
            if kept.is_empty() && self.config.fallback_to_all {
                warn!(
                    "Every violation of {} lies in unselected branches; reporting all of them",
                    description
                );
                fallback = true;
                violations
            } else {
                kept
            }
        } else {
            violations
        };

        Err(Error::Validation(ValidationFailure::from_violations(
            rs,
            description,
            &reported,
            fallback,
        )))
    }

    /// Compile the RS schema into a validator.
    pub fn compile(&self) -> Result<Validator> {
        let rs = self.index.rs_id();
        let root = self.index.root();
        let base = file_uri(&root.file().path).ok_or_else(|| {
            Error::compile(rs, format!("{} has no file URI", root.file().path.display()))
        })?;

        let mut documents = HashMap::new();
        for file in self.index.files() {
            if let Some(uri) = file_uri(&file.path) {
                documents.insert(uri.to_string(), file.root.clone());
            }
        }
        debug!("Compiling {} with {} schema files", rs, documents.len());

        jsonschema::options()
            .with_base_uri(base.to_string())
            .with_retriever(LoadedFiles { documents })
            .build(&root.file().root)
            .map_err(|e| Error::compile(rs, e))
    }

    /// Every violation of `instance` against the RS schema, unpruned.
    pub fn violations(&self, instance: &Value) -> Result<Vec<Violation>> {
        let validator = self.compile()?;
        let violations = validator
            .iter_errors(instance)
            .map(|error| self.violation(&error))
            .collect::<Result<Vec<_>>>()?;
        trace!("{} violations before pruning", violations.len());
        Ok(violations)
    }

    fn violation(&self, error: &ValidationError<'_>) -> Result<Violation> {
        let mut violation = Violation {
            message: error.to_string(),
            path: error
                .instance_path()
                .segments()
                .map(|segment| segment.to_string())
                .collect(),
            keyword: error.kind().keyword().to_string(),
            schema: None,
            branches: Vec::new(),
        };

        let context = match error.kind() {
            ValidationErrorKind::AnyOf { context } | ValidationErrorKind::OneOfNotValid { context } => {
                context
            }
            _ => return Ok(violation),
        };
        let Some(schema) = self.alternatives_at(error, &violation.path)? else {
            trace!("No alternative set found for {}", violation.path.join("."));
            return Ok(violation);
        };

        let keys = self.index.branch_keys(&schema)?;
        for (key, errors) in keys.into_iter().zip(context) {
            let violations = errors
                .iter()
                .map(|e| self.violation(e))
                .collect::<Result<Vec<_>>>()?;
            violation.branches.push(BranchViolations { key, violations });
        }
        violation.schema = Some(schema);
        Ok(violation)
    }

    /// Schema node declaring the failed alternative set.
    ///
    /// Taken from the keyword location the validator reports; the document
    /// lineage of the failing value is the fallback.
    fn alternatives_at(&self, error: &ValidationError<'_>, path: &[String]) -> Result<Option<SchemaNode>> {
        if let Some(node) = error
            .absolute_keyword_location()
            .and_then(|location| self.node_at(location.as_str()))
        {
            return Ok(Some(node));
        }
        let lineage: Vec<&str> = path
            .iter()
            .map(String::as_str)
            .filter(|segment| segment.parse::<usize>().is_err())
            .collect();
        let node = self.index.try_resolve(&lineage, &[])?;
        Ok(node.filter(|n| n.shape() == Shape::Alternatives))
    }

    fn node_at(&self, location: &str) -> Option<SchemaNode> {
        let url = Url::parse(location).ok()?;
        let path = url.to_file_path().ok()?;
        let fragment = url.fragment().unwrap_or_default();
        let pointer = fragment
            .strip_suffix("/oneOf")
            .or_else(|| fragment.strip_suffix("/anyOf"))?;
        self.index
            .node_at(&path, pointer)
            .filter(|n| n.shape() == Shape::Alternatives)
    }
}
