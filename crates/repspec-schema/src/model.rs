//! Schema model definitions

use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static NULL: Value = Value::Null;

/// One loaded schema file
#[derive(Debug)]
pub struct SchemaFile {
    /// Absolute, normalized path of the file
    pub path: PathBuf,
    /// File-name stem before the first `.` (`RS0003.schema.json` gives `RS0003`)
    pub rs_id: String,
    /// Parsed document
    pub root: Value,
}

impl SchemaFile {
    /// Wrap a parsed schema document loaded from `path`.
    pub fn new(path: PathBuf, root: Value) -> Self {
        let rs_id = rs_id_from_path(&path);
        Self { path, rs_id, root }
    }

    /// A representation file declares top-level `properties`; a base file only
    /// carries shared definitions.
    pub fn is_representation(&self) -> bool {
        self.root.get("properties").is_some()
    }

    /// File name used when printing locations.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory that relative references resolve against.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Declared `title`, if any.
    pub fn title(&self) -> Option<&str> {
        self.root.get("title").and_then(Value::as_str)
    }
}

/// Derive the RS identifier from a schema file path.
pub fn rs_id_from_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .and_then(|n| n.split('.').next().map(str::to_string))
        .unwrap_or_default()
}

/// Structural classification of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Named child properties
    Record,
    /// One item schema
    Array,
    /// Ordered candidate branches (`oneOf`/`anyOf`)
    Alternatives,
    /// Scalar value
    Leaf,
}

/// Location inside a schema file, plus the representation it belongs to.
///
/// Nodes are cheap to clone: the file is shared and the location is a JSON
/// pointer into it. Accessors read the raw node only and never follow `$ref`;
/// dereferencing goes through [`crate::SchemaIndex`].
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub(crate) file: Arc<SchemaFile>,
    pub(crate) pointer: String,
    pub(crate) representation: String,
    pub(crate) rs: Option<String>,
}

impl SchemaNode {
    pub(crate) fn new(
        file: Arc<SchemaFile>,
        pointer: impl Into<String>,
        representation: impl Into<String>,
    ) -> Self {
        Self {
            file,
            pointer: pointer.into(),
            representation: representation.into(),
            rs: None,
        }
    }

    /// Raw node at `segments` below this one, in the same file. Not dereferenced.
    pub(crate) fn descend(&self, segments: &[&str]) -> Self {
        let mut pointer = self.pointer.clone();
        for segment in segments {
            pointer.push('/');
            pointer.push_str(&escape_pointer(segment));
        }
        Self {
            file: Arc::clone(&self.file),
            pointer,
            representation: self.representation.clone(),
            rs: None,
        }
    }

    /// Raw JSON of this node. Dangling pointers read as `null`.
    pub fn raw(&self) -> &Value {
        self.file.root.pointer(&self.pointer).unwrap_or(&NULL)
    }

    /// File this node lives in.
    pub fn file(&self) -> &Arc<SchemaFile> {
        &self.file
    }

    /// JSON pointer of this node inside its file.
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    /// RS the node belongs to in document terms.
    pub fn representation(&self) -> &str {
        &self.representation
    }

    /// RS identity carried by a reference that crossed into another
    /// representation file; `None` when the RS is inherited from the parent.
    pub fn rs(&self) -> Option<&str> {
        self.rs.as_deref()
    }

    /// Whether this node is the root of a representation file.
    pub fn is_representation_root(&self) -> bool {
        self.pointer.is_empty() && self.file.is_representation()
    }

    /// Classify the node.
    pub fn shape(&self) -> Shape {
        let raw = self.raw();
        if raw.get("oneOf").is_some() || raw.get("anyOf").is_some() {
            Shape::Alternatives
        } else if raw.get("type").and_then(Value::as_str) == Some("array")
            || raw.get("items").is_some()
        {
            Shape::Array
        } else if raw.get("properties").is_some()
            || raw.get("type").and_then(Value::as_str) == Some("object")
        {
            Shape::Record
        } else {
            Shape::Leaf
        }
    }

    /// Whether the raw node is a `$ref`.
    pub fn is_reference(&self) -> bool {
        self.reference().is_some()
    }

    /// Raw `$ref` target, if any.
    pub fn reference(&self) -> Option<&str> {
        self.raw().get("$ref").and_then(Value::as_str)
    }

    /// Declared property names in declaration order.
    pub fn property_names(&self) -> Vec<String> {
        self.raw()
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a property is declared (without dereferencing).
    pub fn has_property(&self, name: &str) -> bool {
        self.raw()
            .get("properties")
            .and_then(|p| p.get(name))
            .is_some()
    }

    /// Names listed under `required`.
    pub fn required(&self) -> Vec<&str> {
        self.raw()
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required().contains(&name)
    }

    pub fn units(&self) -> Option<&str> {
        self.raw().get("units").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.raw().get("description").and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.raw().get("title").and_then(Value::as_str)
    }

    /// Enumerated choices rendered as text.
    pub fn enumerants(&self) -> Option<Vec<String>> {
        self.raw().get("enum").and_then(Value::as_array).map(|values| {
            values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
    }

    /// Declared scalar type (`string`, `number`, `integer`, `boolean`).
    pub fn leaf_type(&self) -> Option<&str> {
        self.raw().get("type").and_then(Value::as_str)
    }

    pub fn min_items(&self) -> Option<usize> {
        self.raw()
            .get("minItems")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }

    pub fn max_items(&self) -> Option<usize> {
        self.raw()
            .get("maxItems")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Printable location, e.g. `RS0003.schema.json#/definitions/Performance`.
    pub fn location(&self) -> String {
        format!("{}#{}", self.file.file_name(), self.pointer)
    }

    /// Identity of the underlying schema location.
    pub fn same_location(&self, other: &SchemaNode) -> bool {
        self.file.path == other.file.path && self.pointer == other.pointer
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location())
    }
}

/// Escape one JSON pointer token.
pub fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(root: Value, pointer: &str) -> SchemaNode {
        let file = Arc::new(SchemaFile::new(PathBuf::from("/schemas/RS0009.schema.json"), root));
        SchemaNode::new(file, pointer, "RS0009")
    }

    #[test]
    fn test_rs_id_from_path() {
        assert_eq!(rs_id_from_path(Path::new("a/RS0003.schema.json")), "RS0003");
        assert_eq!(rs_id_from_path(Path::new("ASHRAE205.schema.yaml")), "ASHRAE205");
    }

    #[test]
    fn test_shape_classification() {
        let root = json!({
            "properties": {
                "a": {"type": "array", "items": {"type": "number"}},
                "b": {"oneOf": [{"type": "string"}]},
                "c": {"type": "object"},
                "d": {"type": "number", "units": "W", "enum": [1, 2]}
            }
        });
        assert_eq!(node(root.clone(), "").shape(), Shape::Record);
        assert_eq!(node(root.clone(), "/properties/a").shape(), Shape::Array);
        assert_eq!(node(root.clone(), "/properties/b").shape(), Shape::Alternatives);
        assert_eq!(node(root.clone(), "/properties/c").shape(), Shape::Record);
        let leaf = node(root, "/properties/d");
        assert_eq!(leaf.shape(), Shape::Leaf);
        assert_eq!(leaf.units(), Some("W"));
        assert_eq!(leaf.enumerants(), Some(vec!["1".to_string(), "2".to_string()]));
    }

    #[test]
    fn test_property_order_and_required() {
        let root = json!({
            "properties": {"zeta": {}, "alpha": {}, "mid": {}},
            "required": ["mid"]
        });
        let n = node(root, "");
        assert_eq!(n.property_names(), vec!["zeta", "alpha", "mid"]);
        assert!(n.is_required("mid"));
        assert!(!n.is_required("zeta"));
        assert!(n.is_representation_root());
    }

    #[test]
    fn test_descend_escapes_tokens() {
        let root = json!({"definitions": {"a/b": {"title": "slash"}}});
        let n = node(root, "").descend(&["definitions", "a/b"]);
        assert_eq!(n.pointer(), "/definitions/a~1b");
        assert_eq!(n.title(), Some("slash"));
        assert_eq!(n.location(), "RS0009.schema.json#/definitions/a~1b");
    }

    #[test]
    fn test_dangling_pointer_reads_null() {
        let n = node(json!({}), "/nope");
        assert!(n.raw().is_null());
        assert_eq!(n.shape(), Shape::Leaf);
    }
}
