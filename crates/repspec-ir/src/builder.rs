//! Document tree construction
//!
//! Trees are built in one of two directions: mirroring existing content
//! (decode) or walking the schema alone to produce an empty template. Both
//! annotate every node with its governing schema node and allocate sheets for
//! subtrees that the spreadsheet layout cannot hold inline.

use crate::document::DocumentTree;
use crate::grid::{expand, unique_sheet_name, GridSet, GridVariableSet};
use crate::node::{Node, NodeType, SheetKind, GRID_VARIABLES, LOOKUP_VARIABLES};
use crate::template::TemplateConfig;
use crate::{Error, Result};
use repspec_schema::{SchemaIndex, SchemaNode, Shape};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, info, trace};

/// Default maximum sheet-name length of spreadsheet containers
pub const DEFAULT_SHEET_NAME_LIMIT: usize = 31;

/// Builds [`DocumentTree`]s against one RS schema
pub struct TreeBuilder<'a> {
    index: &'a SchemaIndex,
    sheets: Vec<String>,
    sheet_name_limit: usize,
}

/// State of one template walk
struct TemplateWalk<'c> {
    config: &'c TemplateConfig,
    used: BTreeSet<String>,
    ancestors: Vec<String>,
}

impl<'c> TemplateWalk<'c> {
    fn take(&mut self, key: &str) -> Option<&'c str> {
        let value = self.config.selector(key)?;
        self.used.insert(key.to_string());
        Some(value)
    }
}

/// Whether a field of this name always gets a sheet of its own.
fn opens_sheet(name: &str) -> bool {
    name.contains("performance_map") || name.ends_with("_representation")
}

/// Keys of `map`, declared properties first in declaration order.
fn ordered_keys<'m>(record: Option<&SchemaNode>, map: &'m Map<String, Value>) -> Vec<&'m String> {
    let declared = record.map(SchemaNode::property_names).unwrap_or_default();
    let mut keys: Vec<&String> = declared
        .iter()
        .filter_map(|name| map.get_key_value(name.as_str()).map(|(k, _)| k))
        .collect();
    keys.extend(map.keys().filter(|k| !declared.contains(k)));
    keys
}

fn const_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<'a> TreeBuilder<'a> {
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self {
            index,
            sheets: Vec::new(),
            sheet_name_limit: DEFAULT_SHEET_NAME_LIMIT,
        }
    }

    /// Maximum length of generated sheet names.
    #[must_use]
    pub fn sheet_name_limit(mut self, limit: usize) -> Self {
        self.sheet_name_limit = limit;
        self
    }

    fn allocate_sheet(&mut self, base: &str) -> String {
        let name = unique_sheet_name(base, &self.sheets, self.sheet_name_limit);
        debug!("Allocated sheet '{}' for '{}'", name, base);
        self.sheets.push(name.clone());
        name
    }

    /// Layout of the sheet opened for a field described by `schema`.
    ///
    /// Unselected alternatives take the layout of their first branch.
    fn sheet_kind(&self, schema: &SchemaNode) -> Result<SheetKind> {
        Ok(match schema.shape() {
            Shape::Array => SheetKind::Array,
            Shape::Alternatives => match self.index.branches(schema)?.first() {
                Some(branch) => self.sheet_kind(branch)?,
                None => SheetKind::Flat,
            },
            Shape::Record | Shape::Leaf => {
                SheetKind::for_record(schema.property_names().iter().map(String::as_str))
            }
        })
    }

    fn start(&mut self) -> Node {
        let index = self.index;
        let mut root = Node::root(self.allocate_sheet(index.rs_id()));
        root.schema = Some(index.root());
        root
    }

    fn finish(self, root: Node) -> DocumentTree {
        DocumentTree::new(self.index.rs_id(), root)
            .with_title(self.index.title().map(str::to_string))
            .with_sheets(self.sheets)
    }

    /// Record schema whose properties are the children of `node`.
    fn record_of(&self, node: &Node) -> Result<Option<SchemaNode>> {
        let Some(schema) = &node.schema else {
            return Ok(None);
        };
        let record = match schema.shape() {
            Shape::Record => Some(schema.clone()),
            Shape::Array => self
                .index
                .items(schema)?
                .filter(|items| items.shape() == Shape::Record),
            Shape::Alternatives | Shape::Leaf => None,
        };
        Ok(record)
    }

    /// Mirror `content` into a tree.
    pub fn build_from_content(mut self, content: &Value) -> Result<DocumentTree> {
        info!("Building {} tree from content", self.index.rs_id());
        let Value::Object(map) = content else {
            return Err(Error::structure("", "document content must be a record"));
        };
        let mut root = self.start();
        self.add_members(&mut root, map)?;
        Ok(self.finish(root))
    }

    fn add_members(&mut self, parent: &mut Node, map: &Map<String, Value>) -> Result<()> {
        let record = self.record_of(parent)?;
        for key in ordered_keys(record.as_ref(), map) {
            let child = self.content_node(parent, record.as_ref(), key, &map[key.as_str()])?;
            parent.add_child(child);
        }
        Ok(())
    }

    fn content_node(
        &mut self,
        parent: &Node,
        record: Option<&SchemaNode>,
        key: &str,
        value: &Value,
    ) -> Result<Node> {
        let mut node = parent.spawn(key, NodeType::Element);
        node.required = record.is_some_and(|r| r.is_required(key));
        node.schema = self.index.try_resolve(&node.lineage, &node.selectors)?;
        if node.schema.is_none() {
            debug!("'{}' is not described by the {} schema", node.path(), self.index.rs_id());
        }

        if node.sheet_kind == SheetKind::PerformanceMap {
            if parent.sheet_ref.is_some() {
                if key != GRID_VARIABLES && key != LOOKUP_VARIABLES {
                    return Err(Error::structure(
                        parent.path(),
                        format!("a performance map holds only {GRID_VARIABLES} and {LOOKUP_VARIABLES}, found '{key}'"),
                    ));
                }
            } else if !value.is_array() {
                return Err(Error::structure(
                    node.path(),
                    "performance map variables must be lists of values",
                ));
            }
        }

        match value {
            Value::Object(fields) => {
                node.node_type = NodeType::Group;
                if let Some(schema) = node.schema.clone() {
                    let selector = self.index.selector_for_content(&schema, value)?;
                    if selector.is_some() {
                        node.set_selector(selector);
                        node.schema = self.index.try_resolve(&node.lineage, &node.selectors)?;
                        trace!("Branch {:?} selected for '{}'", selector, node.path());
                    }
                }
                if opens_sheet(key) {
                    let kind = match &node.schema {
                        Some(schema) => self.sheet_kind(schema)?,
                        None => SheetKind::for_record(fields.keys().map(String::as_str)),
                    };
                    node.open_sheet(self.allocate_sheet(key), kind);
                }
                self.add_members(&mut node, fields)?;
                if key == GRID_VARIABLES {
                    node.grid_set = Some(self.grid_set(&node)?);
                }
            }
            Value::Array(items) if items.iter().any(Value::is_object) => {
                if node.sheet_kind != SheetKind::Flat {
                    return Err(Error::structure(
                        node.path(),
                        "lists of records are only supported on flat sheets",
                    ));
                }
                node.node_type = NodeType::Table;
                node.open_sheet(self.allocate_sheet(key), SheetKind::Array);
                self.add_columns(&mut node, items)?;
            }
            Value::Array(items) => {
                if items.iter().any(Value::is_array) {
                    return Err(Error::structure(
                        node.path(),
                        "nested arrays deeper than one level are not supported",
                    ));
                }
                node.value = Some(value.clone());
                if node.sheet_kind == SheetKind::Flat {
                    node.open_sheet(self.allocate_sheet(key), SheetKind::Array);
                }
            }
            scalar => node.value = Some(scalar.clone()),
        }
        Ok(node)
    }

    /// Turn a list of records into one column node per field.
    fn add_columns(&mut self, table: &mut Node, items: &[Value]) -> Result<()> {
        let record = self.record_of(table)?;
        let Some(Value::Object(first)) = items.first() else {
            return Err(Error::structure(table.path(), "element 0 is not a record"));
        };
        let names = ordered_keys(record.as_ref(), first);

        for (row, item) in items.iter().enumerate() {
            let Value::Object(fields) = item else {
                return Err(Error::structure(table.path(), format!("element {row} is not a record")));
            };
            if fields.len() != names.len() || names.iter().any(|n| !fields.contains_key(n.as_str())) {
                return Err(Error::structure(
                    table.path(),
                    format!("element {row} does not have the same fields as element 0"),
                ));
            }
            if let Some((name, _)) = fields.iter().find(|(_, v)| v.is_object() || v.is_array()) {
                return Err(Error::structure(
                    table.path(),
                    format!("field '{name}' of element {row} nests deeper than one level"),
                ));
            }
        }

        for name in names {
            let mut column = table.spawn(name, NodeType::Element);
            column.required = record.as_ref().is_some_and(|r| r.is_required(name));
            column.schema = self.index.try_resolve(&column.lineage, &column.selectors)?;
            column.value = Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.get(name.as_str()).cloned().unwrap_or(Value::Null))
                    .collect(),
            ));
            table.add_child(column);
        }
        Ok(())
    }

    /// Expanded grid of a populated `grid_variables` group.
    fn grid_set(&self, group: &Node) -> Result<GridSet> {
        let observed: Vec<String> = group.children.iter().map(|c| c.name.clone()).collect();
        let order: Vec<String> = self
            .index
            .grid_variable_order(&group.selectors, &group.lineage, &observed)?
            .into_iter()
            .filter(|name| observed.contains(name))
            .collect();

        let mut axes = GridVariableSet::new();
        for child in &group.children {
            let not_numeric = || Error::structure(child.path(), "grid variable must be a list of numbers");
            let values = child
                .value
                .as_ref()
                .and_then(Value::as_array)
                .ok_or_else(not_numeric)?
                .iter()
                .map(|v| v.as_f64().ok_or_else(not_numeric))
                .collect::<Result<Vec<f64>>>()?;
            axes.insert(child.name.clone(), values);
        }
        let grid = expand(&axes, &order).map_err(|e| Error::grid(group.path(), e))?;
        trace!("Grid at '{}' expands to {} points", group.path(), grid.len());
        Ok(grid)
    }

    /// Walk the schema to produce an empty document.
    ///
    /// Every alternative met on the way must be decided by `config`, either
    /// directly (keyed by the field name) or through a conditional selector.
    pub fn build_from_schema(mut self, config: &TemplateConfig) -> Result<DocumentTree> {
        let index = self.index;
        let rs = index.rs_id();
        if config.rs != rs {
            return Err(Error::template_selection(
                "",
                format!("configuration is for {} but the schema is {rs}", config.rs),
            ));
        }
        info!("Building {} template", rs);

        let mut walk = TemplateWalk {
            config,
            used: BTreeSet::new(),
            ancestors: Vec::new(),
        };
        let mut root = self.start();
        self.template_node(&mut root, index.root(), &mut walk)?;

        if let Some(unused) = config.selectors.keys().find(|k| !walk.used.contains(*k)) {
            return Err(Error::template_selection(
                "",
                format!("selector '{unused}' is not used by the {rs} schema"),
            ));
        }
        Ok(self.finish(root))
    }

    fn template_node(&mut self, node: &mut Node, schema: SchemaNode, walk: &mut TemplateWalk<'_>) -> Result<()> {
        let schema = if schema.shape() == Shape::Alternatives {
            self.choose_branch(node, &schema, walk)?
        } else {
            schema
        };

        match schema.shape() {
            Shape::Record => {
                if node.node_type != NodeType::Root {
                    node.node_type = NodeType::Group;
                }
                let location = schema.location();
                if walk.ancestors.contains(&location) {
                    return Err(Error::structure(
                        node.path(),
                        format!("schema recursion through {location}"),
                    ));
                }
                walk.ancestors.push(location);
                self.template_members(node, &schema, walk)?;
                walk.ancestors.pop();
            }
            Shape::Array => {
                let items = self
                    .index
                    .items(&schema)?
                    .filter(|items| items.shape() == Shape::Record);
                if let Some(items) = items {
                    node.node_type = NodeType::Table;
                    self.template_columns(node, &items)?;
                }
            }
            Shape::Alternatives | Shape::Leaf => {}
        }
        node.schema = Some(schema);
        Ok(())
    }

    fn choose_branch(&self, node: &mut Node, alternatives: &SchemaNode, walk: &mut TemplateWalk<'_>) -> Result<SchemaNode> {
        let keys = self.index.branch_keys(alternatives)?;
        let Some(wanted) = walk.take(&node.name) else {
            return Err(Error::template_selection(
                node.path(),
                format!(
                    "'{}' has alternatives and needs a selector; accepted values: {}",
                    node.name,
                    keys.join(", ")
                ),
            ));
        };
        let choice = keys.iter().position(|k| k == wanted).ok_or_else(|| {
            Error::template_selection(
                node.path(),
                format!(
                    "'{wanted}' is not accepted for '{}'; accepted values: {}",
                    node.name,
                    keys.join(", ")
                ),
            )
        })?;
        debug!("Template uses branch '{}' for '{}'", wanted, node.path());
        node.set_selector(Some(choice));
        Ok(self.index.branch(alternatives, choice)?)
    }

    fn template_members(&mut self, node: &mut Node, record: &SchemaNode, walk: &mut TemplateWalk<'_>) -> Result<()> {
        let conditionals = self.index.conditionals(record)?;
        let mut preset: Vec<(String, Value)> = Vec::new();
        let mut pins: Vec<(String, SchemaNode)> = Vec::new();

        let mut keys: Vec<&str> = Vec::new();
        for conditional in &conditionals {
            if !keys.contains(&conditional.key.as_str()) {
                keys.push(&conditional.key);
            }
        }
        for key in keys {
            let candidates: Vec<_> = conditionals.iter().filter(|c| c.key == key).collect();
            let accepted = candidates
                .iter()
                .map(|c| const_text(&c.value))
                .collect::<Vec<_>>()
                .join(", ");
            let Some(wanted) = walk.take(key) else {
                return Err(Error::template_selection(
                    node.path(),
                    format!("'{key}' selects the structure here and needs a selector; accepted values: {accepted}"),
                ));
            };
            let conditional = candidates
                .iter()
                .find(|c| const_text(&c.value) == wanted)
                .ok_or_else(|| {
                    Error::template_selection(
                        node.path(),
                        format!("'{wanted}' is not accepted for '{key}'; accepted values: {accepted}"),
                    )
                })?;
            preset.push((key.to_string(), conditional.value.clone()));
            pins.extend(conditional.overrides.iter().cloned());
        }

        for name in record.property_names() {
            let Some(declared) = self.index.child(record, &name)? else {
                continue;
            };
            let mut child = node.spawn(&name, NodeType::Element);
            child.required = record.is_required(&name);

            let schema = match pins.iter().find(|(pinned, _)| *pinned == name) {
                Some((_, pinned)) => {
                    if declared.shape() == Shape::Alternatives {
                        let branches = self.index.branches(&declared)?;
                        child.set_selector(branches.iter().position(|b| b.same_location(pinned)));
                    }
                    pinned.clone()
                }
                None => declared,
            };

            child.value = self.template_value(node, &name, &schema, &preset, walk);
            if opens_sheet(&name) || (schema.shape() == Shape::Array && child.sheet_kind == SheetKind::Flat) {
                let kind = self.sheet_kind(&schema)?;
                child.open_sheet(self.allocate_sheet(&name), kind);
            }
            self.template_node(&mut child, schema, walk)?;
            node.add_child(child);
        }
        Ok(())
    }

    /// Value a template pre-fills for field `name` of `parent`, if any.
    fn template_value(
        &self,
        parent: &Node,
        name: &str,
        schema: &SchemaNode,
        preset: &[(String, Value)],
        walk: &mut TemplateWalk<'_>,
    ) -> Option<Value> {
        if let Some((_, value)) = preset.iter().find(|(key, _)| key == name) {
            return Some(value.clone());
        }
        if parent.name == "metadata" {
            match name {
                "schema" => return Some(Value::String(schema.representation().to_string())),
                "schema_version" => return self.index.version().map(|v| Value::String(v.to_string())),
                _ => {}
            }
        }
        if schema.shape() == Shape::Leaf {
            return walk.take(name).map(|v| Value::String(v.to_string()));
        }
        None
    }

    fn template_columns(&self, table: &mut Node, items: &SchemaNode) -> Result<()> {
        for name in items.property_names() {
            let Some(field) = self.index.child(items, &name)? else {
                continue;
            };
            if matches!(field.shape(), Shape::Record | Shape::Array) {
                return Err(Error::structure(
                    table.path(),
                    format!("field '{name}' nests deeper than one level"),
                ));
            }
            let mut column = table.spawn(&name, NodeType::Element);
            column.required = items.is_required(&name);
            column.schema = Some(field);
            table.add_child(column);
        }
        Ok(())
    }
}
