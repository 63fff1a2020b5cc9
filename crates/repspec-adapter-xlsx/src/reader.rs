//! Workbook reader
//!
//! Inverse of the writer: starting from the root sheet it scans each sheet
//! by fixed anchors (rows on flat sheets, columns elsewhere) until an empty
//! anchor ends the region, following `$sheet` references into nested sheets.

use crate::config::CodecConfig;
use crate::errors::{CodecError, CodecResult};
use crate::workbook::{CellValue, Sheet, Workbook};
use crate::writer::{ARRAY_FIRST_ROW, FLAT_FIRST_ROW, FLAT_HEADINGS, MAP_FIRST_ROW, SHEET_REF_PREFIX};
use repspec_ir::grid::{compress, expand};
use repspec_ir::{
    DocumentTree, GridSet, Node, NodeType, SheetKind, TreeBuilder, GRID_VARIABLES, LOOKUP_VARIABLES,
};
use repspec_schema::SchemaIndex;
use serde_json::Value;
use tracing::{debug, trace};

/// Reads document content back out of workbooks
#[derive(Debug, Clone, Default)]
pub struct WorkbookReader {
    config: CodecConfig,
}

/// One populated row of a flat sheet
#[derive(Debug)]
struct FlatRow {
    row: u32,
    depth: usize,
    name: String,
    group: bool,
    value: CellValue,
}

/// Whether `name` has the form of an RS id (`RS` and four digits).
pub fn is_rs_id(name: &str) -> bool {
    name.len() == 6 && name.starts_with("RS") && name[2..].chars().all(|c| c.is_ascii_digit())
}

/// Name of the root sheet: the first one named like an RS id, else the first.
pub fn root_sheet(book: &Workbook) -> CodecResult<&str> {
    let names = book.sheet_names();
    names
        .iter()
        .find(|name| is_rs_id(name))
        .or_else(|| names.first())
        .copied()
        .ok_or_else(|| CodecError::MissingSheet("<root>".to_string()))
}

impl WorkbookReader {
    /// Create a new reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    #[must_use]
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// Read the workbook and rebuild its tree against `index`.
    pub fn read(&self, book: &Workbook, index: &SchemaIndex) -> CodecResult<DocumentTree> {
        let content = self.read_content(book)?;
        let tree = TreeBuilder::new(index)
            .sheet_name_limit(self.config.max_sheet_name_len)
            .build_from_content(&content)?;
        Ok(tree)
    }

    /// Document content of the workbook, without schema annotations.
    pub fn read_content(&self, book: &Workbook) -> CodecResult<Value> {
        let root_name = root_sheet(book)?;
        debug!("Reading workbook from root sheet '{}'", root_name);
        let mut root = Node::root(root_name);
        self.read_flat(book, root_name, &mut root)?;
        Ok(root.collect_content()?)
    }

    fn sheet<'b>(book: &'b Workbook, name: &str) -> CodecResult<&'b Sheet> {
        book.sheet(name)
            .ok_or_else(|| CodecError::MissingSheet(name.to_string()))
    }

    /// Target of a `$sheet` cell, when it names a sheet of the workbook.
    fn sheet_ref<'v>(book: &Workbook, value: &'v CellValue) -> Option<&'v str> {
        let target = value.as_text()?.strip_prefix(SHEET_REF_PREFIX)?;
        book.sheet(target).is_some().then_some(target)
    }

    fn flat_rows(&self, sheet: &Sheet) -> CodecResult<Vec<FlatRow>> {
        let mut rows = Vec::new();
        for row in FLAT_FIRST_ROW.. {
            let group = sheet.text(row, 1);
            let element = sheet.get(row, 2).as_text();
            let entry = match (group, element) {
                (Some(path), _) => {
                    let lineage: Vec<&str> = path.split('.').collect();
                    FlatRow {
                        row,
                        depth: lineage.len(),
                        name: lineage.last().copied().unwrap_or_default().to_string(),
                        group: true,
                        value: sheet.get(row, 3).clone(),
                    }
                }
                (None, Some(label)) => FlatRow {
                    row,
                    depth: self.config.level_of(label) + 1,
                    name: label.trim().to_string(),
                    group: false,
                    value: sheet.get(row, 3).clone(),
                },
                (None, None) => break,
            };
            if entry.name.is_empty() {
                return Err(CodecError::structural(
                    sheet.name.clone(),
                    format!("row {row} has an empty label"),
                ));
            }
            rows.push(entry);
        }
        Ok(rows)
    }

    fn read_flat(&self, book: &Workbook, sheet_name: &str, owner: &mut Node) -> CodecResult<()> {
        let sheet = Self::sheet(book, sheet_name)?;
        let rows = self.flat_rows(sheet)?;
        trace!("Sheet '{}' has {} rows", sheet_name, rows.len());
        let mut position = 0;
        self.attach(book, sheet_name, owner, &rows, &mut position)?;
        if let Some(stray) = rows.get(position) {
            return Err(CodecError::structural(
                sheet_name,
                format!("row {} does not belong under '{}'", stray.row, owner.path()),
            ));
        }
        Ok(())
    }

    /// Attach the rows nested directly below `parent`, consuming them.
    fn attach(
        &self,
        book: &Workbook,
        sheet_name: &str,
        parent: &mut Node,
        rows: &[FlatRow],
        position: &mut usize,
    ) -> CodecResult<()> {
        let depth = parent.lineage.len() + 1;
        while let Some(entry) = rows.get(*position) {
            if entry.depth < depth {
                break;
            }
            if entry.depth > depth {
                return Err(CodecError::structural(
                    sheet_name,
                    format!("row {} skips a nesting level below '{}'", entry.row, parent.path()),
                ));
            }
            *position += 1;

            let target = Self::sheet_ref(book, &entry.value);
            let child = if entry.group {
                let mut child = parent.spawn(&entry.name, NodeType::Group);
                match target {
                    Some(target) => self.read_referenced(book, target, &mut child)?,
                    None => self.attach(book, sheet_name, &mut child, rows, position)?,
                }
                child
            } else {
                let value = match target {
                    Some(target) => Value::Array(Self::read_list(Self::sheet(book, target)?, 1)),
                    None => entry.value.to_json(),
                };
                let mut child = parent.spawn(&entry.name, NodeType::Element);
                child.value = Some(value);
                child
            };
            parent.add_child(child);
        }
        Ok(())
    }

    fn read_referenced(&self, book: &Workbook, target: &str, node: &mut Node) -> CodecResult<()> {
        let sheet = Self::sheet(book, target)?;
        let kind = layout_of(sheet);
        node.open_sheet(target, kind);
        match kind {
            SheetKind::Flat => self.read_flat(book, target, node),
            SheetKind::PerformanceMap => Self::read_map(sheet, node),
            SheetKind::Array => {
                node.node_type = NodeType::Table;
                Self::read_table(sheet, node)
            }
        }
    }

    /// Values of column `col` of an array sheet.
    fn read_list(sheet: &Sheet, col: u32) -> Vec<Value> {
        sheet
            .column_from(col, ARRAY_FIRST_ROW)
            .into_iter()
            .map(CellValue::to_json)
            .collect()
    }

    fn read_table(sheet: &Sheet, table: &mut Node) -> CodecResult<()> {
        let mut rows = None;
        for col in 1.. {
            let Some(name) = sheet.text(2, col) else {
                break;
            };
            let values = Self::read_list(sheet, col);
            let expected = *rows.get_or_insert(values.len());
            if values.len() != expected {
                return Err(CodecError::structural(
                    sheet.name.clone(),
                    format!("column '{name}' has {} rows, expected {expected}", values.len()),
                ));
            }
            let mut column = table.spawn(name, NodeType::Element);
            column.value = Some(Value::Array(values));
            table.add_child(column);
        }
        Ok(())
    }

    fn read_map(sheet: &Sheet, map: &mut Node) -> CodecResult<()> {
        let structural = |message: String| CodecError::structural(sheet.name.clone(), message);

        let mut grid: Vec<(String, Vec<Value>)> = Vec::new();
        let mut lookup: Vec<(String, Vec<Value>)> = Vec::new();
        let mut group: Option<&str> = None;
        for col in 1.. {
            let Some(name) = sheet.text(3, col) else {
                break;
            };
            if let Some(label) = sheet.text(2, col) {
                group = Some(label);
            }
            let values = sheet
                .column_from(col, MAP_FIRST_ROW)
                .into_iter()
                .map(CellValue::to_json)
                .collect();
            match group {
                Some(GRID_VARIABLES) => grid.push((name.to_string(), values)),
                Some(LOOKUP_VARIABLES) => lookup.push((name.to_string(), values)),
                Some(other) => {
                    return Err(structural(format!(
                        "data group '{other}' of '{}' should be {GRID_VARIABLES} or {LOOKUP_VARIABLES}",
                        map.path()
                    )));
                }
                None => return Err(structural(format!("column {col} has no data group"))),
            }
        }

        // Blank template maps carry no data to rebuild.
        if grid.iter().chain(&lookup).all(|(_, values)| values.is_empty()) {
            trace!("Map sheet '{}' is blank", sheet.name);
            return Ok(());
        }
        let columns = grid
            .iter()
            .map(|(name, values)| {
                values
                    .iter()
                    .map(|v| {
                        v.as_f64().ok_or_else(|| {
                            structural(format!("grid variable '{name}' holds a non-numeric value"))
                        })
                    })
                    .collect::<CodecResult<Vec<f64>>>()
                    .map(|numbers| (name.clone(), numbers))
            })
            .collect::<CodecResult<Vec<_>>>()?;
        if let Some((name, _)) = columns.iter().find(|(_, numbers)| !ascending_on_first_use(numbers)) {
            return Err(structural(format!(
                "grid variable '{name}' of '{}' is not sorted ascending",
                map.path()
            )));
        }
        let order: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let set = GridSet::from_columns(columns).map_err(|e| structural(e.to_string()))?;
        let axes = compress(&set);
        let expanded = expand(&axes, &order).map_err(|e| structural(e.to_string()))?;
        if expanded != set {
            return Err(structural(format!(
                "grid variables of '{}' do not form a complete grid, last variable varying fastest",
                map.path()
            )));
        }
        if let Some((name, values)) = lookup.iter().find(|(_, values)| values.len() != set.len()) {
            return Err(structural(format!(
                "lookup variable '{name}' has {} values but the grid has {} points",
                values.len(),
                set.len()
            )));
        }
        for (name, values) in &mut grid {
            if let Some(axis) = axes.get(name) {
                *values = axis.iter().map(|n| CellValue::Number(*n).to_json()).collect();
            }
        }
        let mut grid_set = Some(set);

        for (group_name, columns) in [(GRID_VARIABLES, grid), (LOOKUP_VARIABLES, lookup)] {
            if columns.is_empty() {
                continue;
            }
            let mut group = map.spawn(group_name, NodeType::Group);
            for (name, values) in columns {
                let mut element = group.spawn(&name, NodeType::Element);
                element.value = Some(Value::Array(values));
                group.add_child(element);
            }
            if group_name == GRID_VARIABLES {
                group.grid_set = grid_set.take();
            }
            map.add_child(group);
        }
        Ok(())
    }
}

/// Layout of a referenced sheet, read from its heading row.
fn layout_of(sheet: &Sheet) -> SheetKind {
    match sheet.text(2, 1) {
        Some(heading) if heading == FLAT_HEADINGS[0] => SheetKind::Flat,
        Some(GRID_VARIABLES | LOOKUP_VARIABLES) => SheetKind::PerformanceMap,
        _ => SheetKind::Array,
    }
}

/// Whether the distinct values of a grid column rise in order of first use.
fn ascending_on_first_use(numbers: &[f64]) -> bool {
    let mut seen: Vec<f64> = Vec::new();
    for &n in numbers {
        if seen.contains(&n) {
            continue;
        }
        if seen.last().is_some_and(|&last| n < last) {
            return false;
        }
        seen.push(n);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellStyle;
    use crate::writer::WorkbookWriter;
    use repspec_ir::compare::{values_near_equal, DEFAULT_REL_TOL};
    use repspec_schema::SchemaLoader;
    use serde_json::json;
    use std::path::PathBuf;

    fn load(rs: &str) -> SchemaIndex {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../testdata/schema");
        SchemaLoader::new(dir).load_rs(rs).unwrap()
    }

    fn map_sheet(columns: &[(&str, &str, Vec<f64>)]) -> Workbook {
        let mut book = Workbook::new();
        let root = book.sheet_or_insert("RS0003");
        root.put(3, 1, "performance", CellStyle::Label);
        root.put(4, 1, "performance.performance_map", CellStyle::Label);
        root.put(4, 3, "$performance_map", CellStyle::Value);

        let map = book.sheet_or_insert("performance_map");
        let mut last_group = "";
        for (col, (group, name, values)) in (1..).zip(columns) {
            if *group != last_group {
                map.set(2, col, *group);
                last_group = *group;
            }
            map.set(3, col, *name);
            for (row, value) in (MAP_FIRST_ROW..).zip(values.iter()) {
                map.set(row, col, CellValue::Number(*value));
            }
        }
        book
    }

    #[test]
    fn test_root_sheet_detection() {
        let mut book = Workbook::new();
        book.sheet_or_insert("Notes");
        book.sheet_or_insert("RS0002");
        assert_eq!(root_sheet(&book).unwrap(), "RS0002");

        let mut plain = Workbook::new();
        plain.sheet_or_insert("Sheet1");
        assert_eq!(root_sheet(&plain).unwrap(), "Sheet1");
        assert!(root_sheet(&Workbook::new()).is_err());
        assert!(!is_rs_id("RS12"));
    }

    #[test]
    fn test_read_flat_nesting() {
        let mut book = Workbook::new();
        let sheet = book.sheet_or_insert("RS0004");
        sheet.set(3, 1, "metadata");
        sheet.set(4, 2, "    schema");
        sheet.set(4, 3, "RS0004");
        sheet.set(5, 1, "performance");
        sheet.set(6, 2, "    rated_power");
        sheet.set(6, 3, CellValue::Number(350.0));
        sheet.set(7, 2, "    ratio");
        sheet.set(7, 3, CellValue::Number(0.5));

        let content = WorkbookReader::new().read_content(&book).unwrap();
        assert_eq!(
            content,
            json!({
                "metadata": {"schema": "RS0004"},
                "performance": {"rated_power": 350, "ratio": 0.5}
            })
        );
    }

    #[test]
    fn test_read_flat_rejects_skipped_level() {
        let mut book = Workbook::new();
        let sheet = book.sheet_or_insert("RS0004");
        sheet.set(3, 1, "performance");
        sheet.set(4, 2, "        rated_power");
        let err = WorkbookReader::new().read_content(&book).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_unknown_reference_is_plain_text() {
        let mut book = Workbook::new();
        let sheet = book.sheet_or_insert("RS0004");
        sheet.set(3, 2, "note");
        sheet.set(3, 3, "$5 per unit");
        let content = WorkbookReader::new().read_content(&book).unwrap();
        assert_eq!(content, json!({"note": "$5 per unit"}));
    }

    #[test]
    fn test_read_map_compresses_grid() {
        let book = map_sheet(&[
            ("grid_variables", "speed_number", vec![1.0, 1.0, 2.0, 2.0]),
            ("grid_variables", "static_pressure_difference", vec![0.0, 100.0, 0.0, 100.0]),
            ("lookup_variables", "shaft_power", vec![1.0, 2.0, 3.0, 4.0]),
        ]);
        let content = WorkbookReader::new().read_content(&book).unwrap();
        assert_eq!(
            content["performance"]["performance_map"],
            json!({
                "grid_variables": {"speed_number": [1, 2], "static_pressure_difference": [0, 100]},
                "lookup_variables": {"shaft_power": [1, 2, 3, 4]}
            })
        );
    }

    #[test]
    fn test_read_map_rejects_incomplete_grid() {
        let book = map_sheet(&[
            ("grid_variables", "speed_number", vec![1.0, 1.0, 2.0]),
            ("grid_variables", "static_pressure_difference", vec![0.0, 100.0, 0.0]),
            ("lookup_variables", "shaft_power", vec![1.0, 2.0, 3.0]),
        ]);
        let err = WorkbookReader::new().read_content(&book).unwrap_err();
        assert!(err.is_structural());
        assert_eq!(err.sheet(), Some("performance_map"));
    }

    #[test]
    fn test_read_map_rejects_descending_axis() {
        let book = map_sheet(&[
            ("grid_variables", "speed_number", vec![1.0, 1.0, 2.0, 2.0]),
            ("grid_variables", "static_pressure_difference", vec![100.0, 0.0, 100.0, 0.0]),
            ("lookup_variables", "shaft_power", vec![1.0, 2.0, 3.0, 4.0]),
        ]);
        let err = WorkbookReader::new().read_content(&book).unwrap_err();
        assert!(err.is_structural());
        let message = err.to_string();
        assert!(message.contains("'static_pressure_difference'"), "{message}");
        assert!(message.contains("not sorted ascending"), "{message}");
    }

    #[test]
    fn test_referenced_sheet_layout() {
        let mut book = Workbook::new();
        let flat = book.sheet_or_insert("fan");
        flat.set(2, 1, FLAT_HEADINGS[0]);
        assert_eq!(layout_of(book.sheet("fan").unwrap()), SheetKind::Flat);

        let table = book.sheet_or_insert("liquid_components");
        table.set(2, 1, "liquid_constituent");
        assert_eq!(layout_of(book.sheet("liquid_components").unwrap()), SheetKind::Array);

        let book = map_sheet(&[("lookup_variables", "shaft_power", vec![1.0])]);
        assert_eq!(
            layout_of(book.sheet("performance_map").unwrap()),
            SheetKind::PerformanceMap
        );
    }

    #[test]
    fn test_read_map_rejects_short_lookup() {
        let book = map_sheet(&[
            ("grid_variables", "speed_number", vec![1.0, 2.0]),
            ("lookup_variables", "shaft_power", vec![1.0]),
        ]);
        let err = WorkbookReader::new().read_content(&book).unwrap_err();
        assert!(err.to_string().contains("'shaft_power' has 1 values"));
    }

    #[test]
    fn test_read_map_rejects_unknown_group() {
        let book = map_sheet(&[
            ("grid_variables", "speed_number", vec![1.0]),
            ("inputs", "shaft_power", vec![1.0]),
        ]);
        assert!(WorkbookReader::new().read_content(&book).unwrap_err().is_structural());
    }

    #[test]
    fn test_round_trip_through_workbook() {
        let index = load("RS0001");
        let content = json!({
            "metadata": {"schema": "RS0001", "description": "chiller"},
            "performance": {
                "evaporator_liquid_type": {
                    "liquid_components": [
                        {"liquid_constituent": "WATER", "concentration": 0.7},
                        {"liquid_constituent": "PROPYLENE_GLYCOL", "concentration": 0.3}
                    ],
                    "concentration_type": "BY_MASS"
                },
                "compressor_speed_control_type": "DISCRETE",
                "rated_speeds": [25.0, 50.0],
                "performance_map_standby": {
                    "grid_variables": {"environment_dry_bulb_temperature": [273.15, 313.15]},
                    "lookup_variables": {"input_power": [120.5, 135.5]}
                }
            }
        });
        let tree = TreeBuilder::new(&index).build_from_content(&content).unwrap();
        let book = WorkbookWriter::new().write(&tree).unwrap();
        let read = WorkbookReader::new().read(&book, &index).unwrap();
        assert_eq!(read.sheets, tree.sheets);
        assert!(values_near_equal(
            &read.collect_content().unwrap(),
            &content,
            DEFAULT_REL_TOL,
            0.0
        ));
    }
}
