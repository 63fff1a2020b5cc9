//! Load, dump, translate and validate single documents
//!
//! Text and binary-map containers go straight through serde. Workbooks go
//! through the spreadsheet codec, which needs the RS schema: on load it is
//! named by the root sheet, on dump by the document's `metadata.schema`.

use crate::config::GatewayConfig;
use crate::format::Format;
use crate::{Error, Result};
use repspec_adapter_xlsx::{
    is_rs_id, read_xlsx, root_sheet, write_xlsx, CodecConfig, WorkbookReader, WorkbookWriter,
};
use repspec_ir::{DocumentTree, TemplateConfig, TreeBuilder};
use repspec_schema::{SchemaIndex, SchemaRegistry};
use repspec_validation::engine::document_rs;
use repspec_validation::{ValidationEngine, ValidationReport};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Indentation of pretty JSON output
const JSON_INDENT: &[u8] = b"    ";

/// Format gateway over one schema directory
pub struct Gateway {
    config: GatewayConfig,
    codec: CodecConfig,
    registry: SchemaRegistry,
}

impl Gateway {
    /// Create a gateway loading schemas from `config.schema_dir`
    pub fn new(config: GatewayConfig) -> Self {
        let registry = SchemaRegistry::new(config.schema_dir.clone());
        Self {
            config,
            codec: CodecConfig::default(),
            registry,
        }
    }

    /// Set the spreadsheet layout options
    #[must_use]
    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Schema index of `rs`, loaded once per gateway.
    pub fn schema(&self, rs: &str) -> Result<Arc<SchemaIndex>> {
        Ok(self.registry.get_or_load(rs)?)
    }

    /// RS a document follows: its `metadata.schema`, else an RS id among the
    /// dot-separated parts of its file name (`fan.RS0003.json`).
    pub fn document_rs(content: &Value, path: &Path) -> Result<String> {
        if let Some(rs) = document_rs(content) {
            return Ok(rs.to_string());
        }
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('.').find(|part| is_rs_id(part)))
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownRs {
                path: path.display().to_string(),
            })
    }

    /// Read the document stored at `path`.
    pub fn load(&self, path: &Path) -> Result<Value> {
        let format = Format::from_path(path)?;
        debug!("Loading {} as {}", path.display(), format);
        let content = match format {
            Format::Xlsx => self.load_workbook(path)?.collect_content()?,
            Format::Json => {
                serde_json::from_slice(&read_bytes(path)?).map_err(|e| Error::encoding("parse", path, e))?
            }
            Format::Yaml => {
                serde_yaml::from_slice(&read_bytes(path)?).map_err(|e| Error::encoding("parse", path, e))?
            }
            Format::Cbor => ciborium::from_reader(read_bytes(path)?.as_slice())
                .map_err(|e| Error::encoding("decode", path, e))?,
        };
        Ok(content)
    }

    /// Read a workbook into a tree built against the RS its root sheet names.
    pub fn load_workbook(&self, path: &Path) -> Result<DocumentTree> {
        let book = read_xlsx(path)?;
        let rs = root_sheet(&book)?.to_string();
        let index = self.schema(&rs)?;
        let tree = WorkbookReader::new()
            .with_config(self.codec.clone())
            .read(&book, &index)?;
        Ok(tree)
    }

    /// Store `content` at `path`.
    ///
    /// Everything is encoded in memory first; nothing is written when encoding
    /// fails.
    pub fn dump(&self, content: &Value, path: &Path) -> Result<()> {
        let format = Format::from_path(path)?;
        debug!("Dumping {} as {}", path.display(), format);
        let bytes = match format {
            Format::Json => self.encode_json(content, path)?,
            Format::Yaml => serde_yaml::to_string(content)
                .map_err(|e| Error::encoding("encode", path, e))?
                .into_bytes(),
            Format::Cbor => {
                let mut buf = Vec::new();
                ciborium::into_writer(content, &mut buf).map_err(|e| Error::encoding("encode", path, e))?;
                buf
            }
            Format::Xlsx => {
                let rs = Self::document_rs(content, path)?;
                let index = self.schema(&rs)?;
                let tree = TreeBuilder::new(&index)
                    .sheet_name_limit(self.codec.max_sheet_name_len)
                    .build_from_content(content)?;
                return self.dump_workbook(&tree, path);
            }
        };
        ensure_parent(path)?;
        std::fs::write(path, bytes).map_err(|e| Error::io("write", path, &e))
    }

    /// Lay out `tree` as a workbook at `path`.
    pub fn dump_workbook(&self, tree: &DocumentTree, path: &Path) -> Result<()> {
        let book = WorkbookWriter::new().with_config(self.codec.clone()).write(tree)?;
        ensure_parent(path)?;
        write_xlsx(&book, path)?;
        Ok(())
    }

    fn encode_json(&self, content: &Value, path: &Path) -> Result<Vec<u8>> {
        if !self.config.pretty {
            return serde_json::to_vec(content).map_err(|e| Error::encoding("encode", path, e));
        }
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        content
            .serialize(&mut serializer)
            .map_err(|e| Error::encoding("encode", path, e))?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Convert the document at `input` into the format of `output`.
    pub fn translate(&self, input: &Path, output: &Path) -> Result<()> {
        Format::from_path(output)?;
        let content = self.load(input)?;
        self.dump(&content, output)?;
        info!("Translated {} -> {}", input.display(), output.display());
        Ok(())
    }

    /// Validate the document at `path` against the RS it follows.
    pub fn validate(&self, path: &Path) -> Result<ValidationReport> {
        let content = self.load(path)?;
        self.validate_content(&content, path)
    }

    /// Validate loaded `content`; `path` names it in the report.
    pub fn validate_content(&self, content: &Value, path: &Path) -> Result<ValidationReport> {
        let rs = Self::document_rs(content, path)?;
        let index = self.schema(&rs)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(ValidationEngine::new(&index).validate(content, &name)?)
    }

    /// Generate the empty document `config` describes and store it at `output`.
    ///
    /// Workbooks keep the full layout (units, required marks, options); other
    /// formats receive the empty content.
    pub fn template(&self, config: &TemplateConfig, output: &Path) -> Result<()> {
        let format = Format::from_path(output)?;
        let index = self.schema(&config.rs)?;
        let tree = TreeBuilder::new(&index)
            .sheet_name_limit(self.codec.max_sheet_name_len)
            .build_from_schema(config)?;
        if format == Format::Xlsx {
            self.dump_workbook(&tree, output)?;
        } else {
            self.dump(&tree.collect_content()?, output)?;
        }
        info!("Wrote {} template to {}", config.rs, output.display());
        Ok(())
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::io("read", path, &e))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, &e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn repo_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
    }

    fn gateway() -> Gateway {
        Gateway::new(GatewayConfig::new().schema_dir(repo_root().join("testdata/schema")))
    }

    #[test]
    fn test_document_rs_sources() {
        let named = json!({"metadata": {"schema": "RS0002"}});
        assert_eq!(Gateway::document_rs(&named, Path::new("x.json")).unwrap(), "RS0002");

        let bare = json!({"performance": {}});
        assert_eq!(Gateway::document_rs(&bare, Path::new("dir/fan.RS0003.json")).unwrap(), "RS0003");
        assert!(matches!(
            Gateway::document_rs(&bare, Path::new("fan.json")),
            Err(Error::UnknownRs { .. })
        ));
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        gateway().dump(&json!({"a": [1]}), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n    \"a\": [\n        1\n    ]\n}\n");
    }

    #[test]
    fn test_compact_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        let gateway = Gateway::new(GatewayConfig::new().pretty(false));
        gateway.dump(&json!({"a": 1}), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_dump_rejects_unknown_extension_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let err = gateway().dump(&json!({}), &path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_cbor_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.cbor");
        let content = json!({"metadata": {"schema": "RS0004"}, "performance": {"rated_power": 350.5, "count": 3}});
        let gateway = gateway();
        gateway.dump(&content, &path).unwrap();
        assert_eq!(gateway.load(&path).unwrap(), content);
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let err = gateway().load(Path::new("/no/such/file.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
