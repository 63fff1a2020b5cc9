//! `.xlsx` container backend
//!
//! Writes go through umya-spreadsheet (which carries cell styles), reads
//! through calamine. Both sides only copy between the container and the
//! in-memory [`Workbook`].
//!
//! A saved cell holding an empty string is indistinguishable from a blank
//! cell, so both read back as [`CellValue::Empty`]. An empty string value in
//! a document therefore comes back as `null` after a trip through `.xlsx`.

use crate::errors::{CodecError, CodecResult};
use crate::workbook::{CellStyle, CellValue, Sheet, Workbook};
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};
use umya_spreadsheet::Worksheet;

/// Name of the sheet a fresh umya workbook starts with
const DEFAULT_SHEET: &str = "Sheet1";

fn fill_color(style: CellStyle) -> Option<&'static str> {
    match style {
        CellStyle::Plain => None,
        CellStyle::Title => Some("FF00529B"),
        CellStyle::Heading => Some("FF01AED8"),
        CellStyle::Label => Some("FFD9D9D9"),
        CellStyle::GridLabel => Some("FFBDD7EE"),
        CellStyle::Value => Some("FFFFFFFF"),
        CellStyle::Unknown => Some("FFFF9999"),
    }
}

fn fill_worksheet(ws: &mut Worksheet, sheet: &Sheet) {
    for ((row, col), cell) in sheet.cells() {
        // umya addresses cells as (col, row)
        let target = ws.get_cell_mut((col, row));
        match &cell.value {
            CellValue::Empty => {}
            CellValue::Text(text) => {
                target.set_value_string(text.as_str());
            }
            CellValue::Number(n) => {
                target.set_value_number(*n);
            }
            CellValue::Bool(b) => {
                target.set_value_bool(*b);
            }
        }
        if let Some(color) = fill_color(cell.style) {
            let style = ws.get_style_mut((col, row));
            style.set_background_color(color);
            if cell.style == CellStyle::Title {
                style.get_font_mut().set_bold(true);
            }
        }
    }
}

/// Save `book` as an `.xlsx` file at `path`.
pub fn write_xlsx(book: &Workbook, path: &Path) -> CodecResult<()> {
    if book.is_empty() {
        return Err(CodecError::backend("cannot save a workbook without sheets"));
    }
    let mut xlsx = umya_spreadsheet::new_file();
    for (position, sheet) in book.sheets().iter().enumerate() {
        let ws = if position == 0 {
            let ws = xlsx
                .get_sheet_by_name_mut(DEFAULT_SHEET)
                .ok_or_else(|| CodecError::backend("new workbook has no default sheet"))?;
            ws.set_name(sheet.name.clone());
            ws
        } else {
            xlsx.new_sheet(sheet.name.clone()).map_err(CodecError::backend)?
        };
        fill_worksheet(ws, sheet);
    }
    umya_spreadsheet::writer::xlsx::write(&xlsx, path)
        .map_err(|e| CodecError::backend(e.to_string()))?;
    info!("Wrote {} sheets to {}", book.len(), path.display());
    Ok(())
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        #[allow(clippy::cast_precision_loss)]
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::Text(other.to_string()),
    }
}

/// Load every sheet of the `.xlsx` file at `path`, in workbook order.
#[allow(clippy::cast_possible_truncation)]
pub fn read_xlsx(path: &Path) -> CodecResult<Workbook> {
    if !path.exists() {
        return Err(CodecError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }
    let mut xlsx: Xlsx<BufReader<File>> =
        open_workbook(path).map_err(|e: calamine::XlsxError| CodecError::backend(e.to_string()))?;

    let mut book = Workbook::new();
    for name in xlsx.sheet_names() {
        let range = xlsx
            .worksheet_range(&name)
            .map_err(|e| CodecError::backend(e.to_string()))?;
        let (start_row, start_col) = range.start().unwrap_or_default();
        let mut sheet = Sheet::new(name.as_str());
        for (row, col, data) in range.used_cells() {
            let value = cell_value(data);
            if !value.is_empty() {
                sheet.set(start_row + row as u32 + 1, start_col + col as u32 + 1, value);
            }
        }
        debug!("Read sheet '{}' ({} rows)", name, sheet.max_row());
        book.push(sheet);
    }
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_conversion() {
        assert_eq!(cell_value(&Data::Int(4)), CellValue::Number(4.0));
        assert_eq!(cell_value(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(cell_value(&Data::Bool(true)), CellValue::Bool(true));
    }

    #[test]
    fn test_container_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut book = Workbook::new();
        let root = book.sheet_or_insert("RS0004");
        root.put(1, 1, "RS0004: Packaged Blower", CellStyle::Title);
        root.put(3, 2, "rated_power", CellStyle::Label);
        root.put(3, 3, CellValue::Number(350.5), CellStyle::Value);
        root.put(4, 3, CellValue::Bool(false), CellStyle::Value);
        book.sheet_or_insert("speeds").set(4, 1, CellValue::Number(2.0));

        write_xlsx(&book, &path).unwrap();
        let read = read_xlsx(&path).unwrap();

        assert_eq!(read.sheet_names(), vec!["RS0004", "speeds"]);
        let root = read.sheet("RS0004").unwrap();
        assert_eq!(root.text(1, 1), Some("RS0004: Packaged Blower"));
        assert_eq!(root.get(3, 3), &CellValue::Number(350.5));
        assert_eq!(root.get(4, 3), &CellValue::Bool(false));
        assert_eq!(read.sheet("speeds").unwrap().get(4, 1), &CellValue::Number(2.0));
    }

    #[test]
    fn test_empty_string_reads_back_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.xlsx");

        let mut book = Workbook::new();
        let root = book.sheet_or_insert("RS0004");
        root.set(3, 1, "metadata");
        root.set(4, 2, "    schema");
        root.set(4, 3, "RS0004");
        root.set(5, 2, "    description");
        root.set(5, 3, "");

        write_xlsx(&book, &path).unwrap();
        let read = read_xlsx(&path).unwrap();
        assert!(read.sheet("RS0004").unwrap().get(5, 3).is_empty());

        let content = crate::reader::WorkbookReader::new().read_content(&read).unwrap();
        assert_eq!(content["metadata"]["schema"], "RS0004");
        assert_eq!(content["metadata"]["description"], serde_json::Value::Null);
    }

    #[test]
    fn test_empty_workbook_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_xlsx(&Workbook::new(), &dir.path().join("empty.xlsx")).is_err());
        assert!(matches!(
            read_xlsx(&dir.path().join("missing.xlsx")),
            Err(CodecError::Io(_))
        ));
    }
}
