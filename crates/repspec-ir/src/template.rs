//! Selector configuration for schema-only template generation

use crate::builder::TreeBuilder;
use crate::Result;
use repspec_schema::SchemaIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Choices needed to turn an RS schema into one empty document.
///
/// Keys name either an alternative field (value: a branch key such as an RS
/// id or a branch title) or a conditional selector field (value: one of the
/// constants its `if` clauses test). Every key must be consumed by the walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// RS id the template is generated for
    pub rs: String,

    /// Selector key to accepted value
    #[serde(default)]
    pub selectors: BTreeMap<String, String>,
}

impl TemplateConfig {
    pub fn new(rs: impl Into<String>) -> Self {
        Self {
            rs: rs.into(),
            selectors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.selectors.insert(key.into(), value.into());
        self
    }

    pub fn selector(&self, key: &str) -> Option<&str> {
        self.selectors.get(key).map(String::as_str)
    }

    /// Check the configuration against `index` by walking the schema once.
    ///
    /// Fails on a missing or unaccepted selector and on selectors nothing uses.
    pub fn check(&self, index: &SchemaIndex) -> Result<()> {
        TreeBuilder::new(index).build_from_schema(self).map(drop)
    }
}
