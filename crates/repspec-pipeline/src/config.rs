//! Gateway and template-batch configuration
//!
//! Both are read from JSON or YAML files, chosen by extension.

use crate::format::Format;
use crate::{Error, Result};
use repspec_ir::TemplateConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

fn read_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io("read configuration", path, &e))?;
    match Format::from_path(path)? {
        Format::Json => serde_json::from_str(&text).map_err(|e| Error::config(path, e)),
        Format::Yaml => serde_yaml::from_str(&text).map_err(|e| Error::config(path, e)),
        other => Err(Error::config(
            path,
            format!("configuration must be JSON or YAML, not {other}"),
        )),
    }
}

/// Settings of the format gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Directory holding `<RS>.schema.json` files (default: `schema`)
    pub schema_dir: PathBuf,
    /// Indent JSON output (default: true)
    pub pretty: bool,
    /// File-name prefixes skipped by directory batches
    pub lock_patterns: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from("schema"),
            pretty: true,
            lock_patterns: vec!["~$".to_string(), ".~lock.".to_string(), ".DS_Store".to_string()],
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file; absent fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = read_config(path)?;
        debug!("Loaded gateway configuration from {}", path.display());
        Ok(config)
    }

    /// Set the schema directory
    #[must_use]
    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = dir.into();
        self
    }

    /// Set JSON indentation
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Add a lock-file prefix
    #[must_use]
    pub fn lock_pattern(mut self, prefix: impl Into<String>) -> Self {
        self.lock_patterns.push(prefix.into());
        self
    }

    /// Whether `path` names an editor lock file or similar clutter.
    pub fn is_lock_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.lock_patterns.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// One template workbook to generate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// RS id of the template
    pub rs: String,
    /// Distinguishes templates of the same RS in the file name
    #[serde(default)]
    pub suffix: Option<String>,
    /// Selector keywords, see [`TemplateConfig`]
    #[serde(default)]
    pub selectors: BTreeMap<String, String>,
}

impl TemplateSpec {
    pub fn new(rs: impl Into<String>) -> Self {
        Self {
            rs: rs.into(),
            suffix: None,
            selectors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    #[must_use]
    pub fn with_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.selectors.insert(key.into(), value.into());
        self
    }

    /// `<RS>[-<suffix>]-template.xlsx`
    pub fn file_name(&self) -> String {
        let mut parts = vec![self.rs.as_str()];
        if let Some(suffix) = self.suffix.as_deref().filter(|s| !s.is_empty()) {
            parts.push(suffix);
        }
        parts.push("template.xlsx");
        parts.join("-")
    }

    /// Selector configuration for the tree builder.
    pub fn template_config(&self) -> TemplateConfig {
        TemplateConfig {
            rs: self.rs.clone(),
            selectors: self.selectors.clone(),
        }
    }
}

/// Template batch configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSet {
    pub templates: Vec<TemplateSpec>,
}

impl TemplateSet {
    pub fn from_file(path: &Path) -> Result<Self> {
        let set: Self = read_config(path)?;
        debug!("Loaded {} template specs from {}", set.templates.len(), path.display());
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
    }

    #[test]
    fn test_gateway_config_file() {
        let config = GatewayConfig::from_file(&repo_root().join("testdata/config/gateway.json")).unwrap();
        assert_eq!(config.schema_dir, PathBuf::from("testdata/schema"));
        assert!(config.pretty);
        assert_eq!(config.lock_patterns, GatewayConfig::default().lock_patterns);
    }

    #[test]
    fn test_gateway_config_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        std::fs::write(&path, "schema_dir: /opt/schema\npretty: false\n").unwrap();
        let config = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(config, GatewayConfig::new().schema_dir("/opt/schema").pretty(false));
    }

    #[test]
    fn test_config_rejects_binary_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.cbor");
        std::fs::write(&path, [0xa0]).unwrap();
        assert!(matches!(GatewayConfig::from_file(&path), Err(Error::Config { .. })));
    }

    #[test]
    fn test_lock_files() {
        let config = GatewayConfig::default().lock_pattern("#");
        assert!(config.is_lock_file(Path::new("dir/~$chiller.xlsx")));
        assert!(config.is_lock_file(Path::new(".~lock.chiller.xlsx#")));
        assert!(config.is_lock_file(Path::new(".DS_Store")));
        assert!(config.is_lock_file(Path::new("#scratch.json")));
        assert!(!config.is_lock_file(Path::new("chiller.RS0001.json")));
    }

    #[test]
    fn test_template_set_file() {
        let set = TemplateSet::from_file(&repo_root().join("testdata/config/templates.json")).unwrap();
        assert_eq!(set.templates.len(), 3);
        assert_eq!(set.templates[0].file_name(), "RS0001-template.xlsx");
        assert_eq!(set.templates[1].file_name(), "RS0002-continuous-fan-template.xlsx");
        assert_eq!(
            set.templates[2].template_config(),
            TemplateConfig::new("RS0003").with_selector("operation_speed_control_type", "DISCRETE")
        );
    }
}
