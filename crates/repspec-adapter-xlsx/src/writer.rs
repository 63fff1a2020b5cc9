//! Workbook writer
//!
//! Walks a [`DocumentTree`] once, placing every node on the sheet the tree
//! assigned to it. Flat sheets grow downwards one row per node; performance
//! map and array sheets grow rightwards one column per element.

use crate::config::CodecConfig;
use crate::errors::{CodecError, CodecResult};
use crate::workbook::{CellStyle, CellValue, Sheet, Workbook};
use repspec_ir::traversal::walk;
use repspec_ir::{DocumentTree, GridSet, Node, NodeType, SheetKind, Traversal, GRID_VARIABLES};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Column headings of flat sheets
pub const FLAT_HEADINGS: [&str; 7] = [
    "Data Group",
    "Data Element",
    "Value",
    "Units",
    "Required",
    "Options",
    "Description",
];

/// First data row of flat sheets
pub const FLAT_FIRST_ROW: u32 = 3;
/// First value row of array sheets
pub const ARRAY_FIRST_ROW: u32 = 4;
/// First value row of performance map sheets
pub const MAP_FIRST_ROW: u32 = 5;

/// Marker in the Required column
pub const REQUIRED_MARK: &str = "\u{2713}";
/// Separator of enumerated options
pub const OPTION_SEPARATOR: &str = "|";
/// Prefix of a cell that points at another sheet
pub const SHEET_REF_PREFIX: char = '$';
/// Description written for fields the schema does not describe
pub const NOT_IN_SCHEMA: &str = "Not found in schema";

/// Writes document trees into workbooks
#[derive(Debug, Clone, Default)]
pub struct WorkbookWriter {
    config: CodecConfig,
}

/// Column state of the performance map sheet being filled
#[derive(Default)]
struct MapFrame {
    group: String,
    group_started: bool,
    grid: Option<GridSet>,
}

/// Traversal state of one write
struct SheetWriter<'c> {
    config: &'c CodecConfig,
    book: Workbook,
    next_row: HashMap<String, u32>,
    next_col: HashMap<String, u32>,
    maps: HashMap<String, MapFrame>,
    table_rows: HashMap<String, usize>,
    error: Option<CodecError>,
}

impl WorkbookWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    #[must_use]
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// Lay out `tree` in a new workbook.
    ///
    /// Sheets appear in the tree's allocation order, the root sheet first.
    pub fn write(&self, tree: &DocumentTree) -> CodecResult<Workbook> {
        let mut book = Workbook::new();
        for name in &tree.sheets {
            if name.chars().count() > self.config.max_sheet_name_len {
                return Err(CodecError::structural(
                    name.clone(),
                    format!("sheet name exceeds {} characters", self.config.max_sheet_name_len),
                ));
            }
            book.sheet_or_insert(name);
        }

        let title = match &tree.title {
            Some(title) => format!("{}: {title}", tree.rs_id),
            None => tree.rs_id.clone(),
        };
        write_flat_header(book.sheet_or_insert(tree.root_sheet()), &title);

        let mut writer = SheetWriter {
            config: &self.config,
            book,
            next_row: HashMap::new(),
            next_col: HashMap::new(),
            maps: HashMap::new(),
            table_rows: HashMap::new(),
            error: None,
        };
        walk(&tree.root, &mut writer);
        if let Some(err) = writer.error {
            return Err(err);
        }
        debug!("Wrote {} sheets for {}", writer.book.len(), tree.rs_id);
        Ok(writer.book)
    }
}

fn write_title(sheet: &mut Sheet, title: &str) {
    sheet.put(1, 1, title, CellStyle::Title);
}

fn write_flat_header(sheet: &mut Sheet, title: &str) {
    write_title(sheet, title);
    for (col, heading) in (1..).zip(FLAT_HEADINGS) {
        sheet.put(2, col, heading, CellStyle::Heading);
    }
}

fn label_style(node: &Node) -> CellStyle {
    if node.schema.is_some() {
        CellStyle::Label
    } else {
        CellStyle::Unknown
    }
}

fn to_row(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl SheetWriter<'_> {
    fn sheet(&mut self, name: &str) -> &mut Sheet {
        self.book.sheet_or_insert(name)
    }

    fn take_row(&mut self, sheet: &str) -> u32 {
        let next = self.next_row.entry(sheet.to_string()).or_insert(FLAT_FIRST_ROW);
        let row = *next;
        *next += 1;
        row
    }

    fn take_col(&mut self, sheet: &str) -> u32 {
        let next = self.next_col.entry(sheet.to_string()).or_insert(1);
        let col = *next;
        *next += 1;
        col
    }

    fn write_node(&mut self, node: &Node) -> CodecResult<()> {
        match node.sheet_kind {
            SheetKind::Flat => self.write_flat_row(node)?,
            SheetKind::PerformanceMap => self.write_map_node(node)?,
            SheetKind::Array => self.write_array_column(node)?,
        }
        if let Some(target) = &node.sheet_ref {
            self.open_sheet(node, target)?;
        }
        Ok(())
    }

    /// Header of the sheet `node` moves its contents to.
    fn open_sheet(&mut self, node: &Node, target: &str) -> CodecResult<()> {
        let title = node.path();
        match (node.node_type, node.child_sheet_kind) {
            (NodeType::Element, _) => self.write_scalar_array(node, target)?,
            (_, SheetKind::Flat) => write_flat_header(self.sheet(target), &title),
            (NodeType::Table, _) => {
                write_title(self.sheet(target), &title);
                let rows = node
                    .schema
                    .as_ref()
                    .and_then(repspec_schema::SchemaNode::max_items)
                    .unwrap_or(self.config.blank_rows);
                self.table_rows.insert(target.to_string(), rows);
            }
            (_, SheetKind::PerformanceMap) => {
                write_title(self.sheet(target), &title);
                self.maps.insert(target.to_string(), MapFrame::default());
            }
            (_, SheetKind::Array) => write_title(self.sheet(target), &title),
        }
        trace!("Sheet '{}' holds '{}'", target, title);
        Ok(())
    }

    fn write_flat_row(&mut self, node: &Node) -> CodecResult<()> {
        let sheet_name = node.sheet.clone();
        let row = self.take_row(&sheet_name);
        let style = label_style(node);
        let indent = self.config.indent(node.lineage.len().saturating_sub(1));
        let schema = node.schema.as_ref();

        let value = match (&node.sheet_ref, &node.value) {
            (Some(target), _) => Some(CellValue::Text(format!("{SHEET_REF_PREFIX}{target}"))),
            (None, Some(value)) => Some(CellValue::from_json(value).ok_or_else(|| {
                CodecError::structural(
                    sheet_name.clone(),
                    format!("'{}' holds a list but has no sheet of its own", node.path()),
                )
            })?),
            (None, None) => None,
        };

        let sheet = self.sheet(&sheet_name);
        if node.is_group() {
            sheet.put(row, 1, node.path(), style);
            sheet.style(row, 2, CellStyle::Label);
        } else {
            sheet.style(row, 1, CellStyle::Label);
            sheet.put(row, 2, format!("{indent}{}", node.name), style);
            if let Some(options) = schema.and_then(repspec_schema::SchemaNode::enumerants) {
                sheet.put(row, 6, options.join(OPTION_SEPARATOR), CellStyle::Label);
            }
        }
        match value {
            Some(value) => sheet.put(row, 3, value, CellStyle::Value),
            None => sheet.style(row, 3, CellStyle::Value),
        }
        if let Some(units) = schema.and_then(|s| s.units()) {
            sheet.put(row, 4, units, CellStyle::Label);
        }
        if node.required {
            sheet.put(row, 5, REQUIRED_MARK, CellStyle::Label);
        }
        let description = match schema {
            Some(schema) => schema.description().unwrap_or_default(),
            None => NOT_IN_SCHEMA,
        };
        if !description.is_empty() {
            sheet.put(row, 7, description, style);
        }
        Ok(())
    }

    /// One-column sheet holding the values of a scalar list.
    fn write_scalar_array(&mut self, node: &Node, target: &str) -> CodecResult<()> {
        let blank = node
            .schema
            .as_ref()
            .and_then(repspec_schema::SchemaNode::max_items)
            .unwrap_or(self.config.blank_rows);
        let title = node.path();
        let sheet = self.sheet(target);
        write_title(sheet, &title);
        write_column(sheet, 1, 2, node, None, ARRAY_FIRST_ROW, blank)
    }

    fn write_map_node(&mut self, node: &Node) -> CodecResult<()> {
        let sheet_name = node.sheet.clone();
        let frame = self.maps.entry(sheet_name.clone()).or_default();

        if node.node_type != NodeType::Element {
            frame.group.clone_from(&node.name);
            frame.group_started = false;
            if node.name == GRID_VARIABLES {
                frame.grid.clone_from(&node.grid_set);
            }
            return Ok(());
        }

        let group = frame.group.clone();
        let first_in_group = !frame.group_started;
        frame.group_started = true;
        let blank = self.config.blank_rows;
        let is_grid = group == GRID_VARIABLES;
        let grid_column = if is_grid {
            match &frame.grid {
                Some(grid) => Some(grid.column(&node.name).map(<[f64]>::to_vec).ok_or_else(|| {
                    CodecError::structural(
                        sheet_name.clone(),
                        format!("grid variable '{}' is missing from the grid set", node.name),
                    )
                })?),
                None => None,
            }
        } else {
            if let (Some(grid), Some(Value::Array(values))) = (&frame.grid, &node.value) {
                if values.len() != grid.len() {
                    return Err(CodecError::structural(
                        sheet_name,
                        format!(
                            "lookup variable '{}' has {} values but the grid has {} points",
                            node.name,
                            values.len(),
                            grid.len()
                        ),
                    ));
                }
            }
            None
        };

        let col = self.take_col(&sheet_name);
        let label = if is_grid { CellStyle::GridLabel } else { CellStyle::Label };
        let sheet = self.sheet(&sheet_name);
        if first_in_group {
            sheet.put(2, col, group, label);
        } else {
            sheet.style(2, col, label);
        }
        write_column(sheet, col, 3, node, grid_column.as_deref(), MAP_FIRST_ROW, blank)
    }

    fn write_array_column(&mut self, node: &Node) -> CodecResult<()> {
        let sheet_name = node.sheet.clone();
        if node.node_type != NodeType::Element {
            return Err(CodecError::structural(
                sheet_name,
                format!("'{}' nests deeper than one level in a list", node.path()),
            ));
        }
        let blank = self
            .table_rows
            .get(&sheet_name)
            .copied()
            .unwrap_or(self.config.blank_rows);
        let col = self.take_col(&sheet_name);
        let sheet = self.sheet(&sheet_name);
        write_column(sheet, col, 2, node, None, ARRAY_FIRST_ROW, blank)
    }
}

/// Name at `name_row`, units below it, then the values from `first_row`.
///
/// `numbers` overrides the node's own value; with neither, `blank` empty
/// value cells are styled for data entry.
fn write_column(
    sheet: &mut Sheet,
    col: u32,
    name_row: u32,
    node: &Node,
    numbers: Option<&[f64]>,
    first_row: u32,
    blank: usize,
) -> CodecResult<()> {
    let label = label_style(node);
    sheet.put(name_row, col, node.name.as_str(), label);
    match node.schema.as_ref().and_then(|s| s.units()) {
        Some(units) => sheet.put(name_row + 1, col, units, CellStyle::Label),
        None => sheet.style(name_row + 1, col, CellStyle::Label),
    }

    let values: Vec<CellValue> = match (numbers, &node.value) {
        (Some(numbers), _) => numbers.iter().map(|n| CellValue::Number(*n)).collect(),
        (None, Some(Value::Array(items))) => items
            .iter()
            .map(|item| {
                CellValue::from_json(item).ok_or_else(|| {
                    CodecError::structural(
                        sheet.name.clone(),
                        format!("'{}' nests deeper than one level", node.path()),
                    )
                })
            })
            .collect::<CodecResult<_>>()?,
        (None, Some(Value::Null) | None) => {
            for offset in 0..blank {
                sheet.style(first_row + to_row(offset), col, CellStyle::Value);
            }
            return Ok(());
        }
        (None, Some(_)) => {
            return Err(CodecError::structural(
                sheet.name.clone(),
                format!("'{}' must hold a list of values", node.path()),
            ));
        }
    };
    for (row, value) in (first_row..).zip(values) {
        sheet.put(row, col, value, CellStyle::Value);
    }
    Ok(())
}

impl Traversal for SheetWriter<'_> {
    fn visit(&mut self, node: &Node, _path: &[String]) {
        if node.node_type == NodeType::Root {
            return;
        }
        if let Err(err) = self.write_node(node) {
            self.error = Some(err);
        }
    }

    fn should_continue(&self) -> bool {
        self.error.is_none()
    }
}
