//! Node types for the document tree

use crate::grid::GridSet;
use crate::{Error, Result};
use repspec_schema::{dotted, SchemaNode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Group holding the independent variables of a performance map
pub const GRID_VARIABLES: &str = "grid_variables";
/// Group holding the dependent variables of a performance map
pub const LOOKUP_VARIABLES: &str = "lookup_variables";

/// A node in the document tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Field name (empty for the root)
    pub name: String,

    /// Node type
    pub node_type: NodeType,

    /// Scalar or array value of an element
    pub value: Option<Value>,

    /// Child nodes, in schema declaration order
    pub children: Vec<Node>,

    /// Field names from the document root to this node
    pub lineage: Vec<String>,

    /// Branch choices parallel to `lineage`
    pub selectors: Vec<Option<usize>>,

    /// Whether the enclosing record lists this field as required
    pub required: bool,

    /// Governing schema node; `None` for fields unknown to the schema
    pub schema: Option<SchemaNode>,

    /// Sheet this node is written on
    pub sheet: String,

    /// Layout of `sheet`
    pub sheet_kind: SheetKind,

    /// Sheet holding this node's contents when they are not inline
    pub sheet_ref: Option<String>,

    /// Layout inherited by the children
    pub child_sheet_kind: SheetKind,

    /// Expanded grid of a `grid_variables` group
    pub grid_set: Option<GridSet>,
}

/// Types of nodes in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// Root of the document
    Root,

    /// Nested record
    Group,

    /// Array of records, stored column-wise
    Table,

    /// Scalar or scalar-array field
    Element,
}

/// Sheet layout classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetKind {
    /// Label/value rows with units and required marks
    Flat,

    /// Grid-variable and lookup-variable columns
    PerformanceMap,

    /// One column per field, one row per element
    Array,
}

impl SheetKind {
    /// Layout of a sheet holding a record with the given members.
    pub fn for_record<'m>(members: impl IntoIterator<Item = &'m str>) -> Self {
        if members
            .into_iter()
            .any(|m| m == GRID_VARIABLES || m == LOOKUP_VARIABLES)
        {
            Self::PerformanceMap
        } else {
            Self::Flat
        }
    }
}

impl Node {
    /// Create a detached node
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            value: None,
            children: Vec::new(),
            lineage: Vec::new(),
            selectors: Vec::new(),
            required: false,
            schema: None,
            sheet: String::new(),
            sheet_kind: SheetKind::Flat,
            sheet_ref: None,
            child_sheet_kind: SheetKind::Flat,
            grid_set: None,
        }
    }

    /// Root node living on `sheet`
    pub fn root(sheet: impl Into<String>) -> Self {
        let mut root = Self::new("", NodeType::Root);
        root.sheet = sheet.into();
        root
    }

    /// Create a node with a value
    pub fn with_value(name: impl Into<String>, node_type: NodeType, value: Value) -> Self {
        let mut node = Self::new(name, node_type);
        node.value = Some(value);
        node
    }

    /// New child of this node: lineage extended, sheet and layout inherited.
    pub fn spawn(&self, name: &str, node_type: NodeType) -> Self {
        let mut child = Self::new(name, node_type);
        child.lineage = self.lineage.clone();
        child.lineage.push(name.to_string());
        child.selectors = self.selectors.clone();
        child.selectors.push(None);
        child.sheet = self.child_sheet().to_string();
        child.sheet_kind = self.child_sheet_kind;
        child.child_sheet_kind = self.child_sheet_kind;
        child
    }

    /// Move this node's contents onto `sheet`, laid out as `kind`.
    pub fn open_sheet(&mut self, sheet: impl Into<String>, kind: SheetKind) {
        self.sheet_ref = Some(sheet.into());
        self.child_sheet_kind = kind;
    }

    /// Sheet the children are written on.
    pub fn child_sheet(&self) -> &str {
        self.sheet_ref.as_deref().unwrap_or(&self.sheet)
    }

    /// Record the branch chosen at this node's own lineage segment.
    pub fn set_selector(&mut self, selector: Option<usize>) {
        if let Some(last) = self.selectors.last_mut() {
            *last = selector;
        }
    }

    /// Lineage joined with `.`.
    pub fn path(&self) -> String {
        dotted(&self.lineage)
    }

    /// Add a child node
    pub fn add_child(&mut self, child: Node) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Find a child by name
    pub fn find_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Find all children by name
    pub fn find_children(&self, name: &str) -> Vec<&Node> {
        self.children.iter().filter(|c| c.name == name).collect()
    }

    /// Whether this node is written as a group row rather than a value row.
    pub fn is_group(&self) -> bool {
        !matches!(self.node_type, NodeType::Element)
    }

    /// Rebuild document content from this subtree.
    ///
    /// Records become objects; tables are transposed from per-column arrays
    /// into one object per row.
    pub fn collect_content(&self) -> Result<Value> {
        match self.node_type {
            NodeType::Root | NodeType::Group => {
                let mut map = Map::new();
                for child in &self.children {
                    map.insert(child.name.clone(), child.collect_content()?);
                }
                Ok(Value::Object(map))
            }
            NodeType::Table => self.collect_rows(),
            NodeType::Element => Ok(self.value.clone().unwrap_or(Value::Null)),
        }
    }

    fn collect_rows(&self) -> Result<Value> {
        let mut columns = Vec::with_capacity(self.children.len());
        for column in &self.children {
            let values = match &column.value {
                Some(Value::Array(values)) => values.as_slice(),
                None | Some(Value::Null) => &[],
                Some(_) => {
                    return Err(Error::structure(
                        column.path(),
                        "table column does not hold a list of values",
                    ));
                }
            };
            columns.push((column.name.as_str(), values));
        }

        let rows = columns.first().map_or(0, |(_, values)| values.len());
        if let Some((name, values)) = columns.iter().find(|(_, values)| values.len() != rows) {
            return Err(Error::structure(
                self.path(),
                format!("column '{name}' has {} rows, expected {rows}", values.len()),
            ));
        }

        let records = (0..rows)
            .map(|row| {
                let record: Map<String, Value> = columns
                    .iter()
                    .map(|(name, values)| ((*name).to_string(), values[row].clone()))
                    .collect();
                Value::Object(record)
            })
            .collect();
        Ok(Value::Array(records))
    }
}
