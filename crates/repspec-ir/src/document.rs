//! Document tree container

use crate::node::Node;
use crate::traversal::Cursor;
use crate::Result;
use serde_json::Value;

/// A document tree together with its RS and the sheets it occupies
#[derive(Debug, Clone)]
pub struct DocumentTree {
    /// RS id of the root schema
    pub rs_id: String,

    /// Display title of the RS, if the schema declares one
    pub title: Option<String>,

    /// Root node of the document
    pub root: Node,

    /// Sheet names in allocation order; the root sheet comes first
    pub sheets: Vec<String>,
}

impl DocumentTree {
    /// Create a tree whose only sheet is the root's.
    pub fn new(rs_id: impl Into<String>, root: Node) -> Self {
        let sheets = vec![root.sheet.clone()];
        Self {
            rs_id: rs_id.into(),
            title: None,
            root,
            sheets,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    #[must_use]
    pub fn with_sheets(mut self, sheets: Vec<String>) -> Self {
        self.sheets = sheets;
        self
    }

    /// Name of the sheet holding the root node.
    pub fn root_sheet(&self) -> &str {
        &self.root.sheet
    }

    /// Cursor positioned at the root.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.root)
    }

    /// Node at a dotted path such as `performance.performance_map`.
    pub fn find(&self, path: &str) -> Result<&Node> {
        self.cursor().navigate(path).map(|c| c.node())
    }

    /// Rebuild the document content.
    pub fn collect_content(&self) -> Result<Value> {
        self.root.collect_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use serde_json::json;

    #[test]
    fn test_document_creation() {
        let root = Node::root("RS0001");
        let doc = DocumentTree::new("RS0001", root).with_title(Some("Chiller".to_string()));

        assert_eq!(doc.rs_id, "RS0001");
        assert_eq!(doc.root_sheet(), "RS0001");
        assert_eq!(doc.sheets, vec!["RS0001"]);
        assert_eq!(doc.title.as_deref(), Some("Chiller"));
    }

    #[test]
    fn test_document_find() {
        let mut root = Node::root("RS0001");
        let mut metadata = root.spawn("metadata", NodeType::Group);
        let mut schema = metadata.spawn("schema", NodeType::Element);
        schema.value = Some(json!("RS0001"));
        metadata.add_child(schema);
        root.add_child(metadata);

        let doc = DocumentTree::new("RS0001", root);
        assert_eq!(doc.find("metadata.schema").unwrap().value, Some(json!("RS0001")));
        assert!(doc.find("metadata.missing").is_err());
        assert_eq!(
            doc.collect_content().unwrap(),
            json!({"metadata": {"schema": "RS0001"}})
        );
    }
}
