#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! # repspec-adapter-xlsx
//!
//! Spreadsheet codec for representation specification documents.
//!
//! A [`DocumentTree`] is laid out over a [`Workbook`] of named sheets: the
//! root sheet lists records as indented label/value rows, performance maps
//! get a sheet of grid-variable and lookup-variable columns, and arrays of
//! records get one column per field. The reader reverses the layout and
//! checks its structural rules.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use repspec_adapter_xlsx::{read_document, write_document, CodecConfig};
//! use repspec_ir::TreeBuilder;
//! use repspec_schema::SchemaLoader;
//! use std::path::Path;
//!
//! let index = SchemaLoader::new("schema").load_rs("RS0004")?;
//! let content = serde_json::json!({"metadata": {"schema": "RS0004"}});
//! let tree = TreeBuilder::new(&index).build_from_content(&content)?;
//! write_document(&tree, Path::new("blower.xlsx"), &CodecConfig::default())?;
//! let back = read_document(Path::new("blower.xlsx"), &index, &CodecConfig::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod errors;
pub mod reader;
pub mod workbook;
pub mod writer;
pub mod xlsx;

pub use config::CodecConfig;
pub use errors::{CodecError, CodecResult};
pub use reader::{is_rs_id, root_sheet, WorkbookReader};
pub use workbook::{Cell, CellStyle, CellValue, Sheet, Workbook};
pub use writer::WorkbookWriter;
pub use xlsx::{read_xlsx, write_xlsx};

pub use errors::CodecError as Error;
pub type Result<T> = CodecResult<T>;

use repspec_ir::DocumentTree;
use repspec_schema::SchemaIndex;
use std::path::Path;

/// Lay out `tree` and save it as an `.xlsx` file.
pub fn write_document(tree: &DocumentTree, path: &Path, config: &CodecConfig) -> Result<()> {
    let book = WorkbookWriter::new().with_config(config.clone()).write(tree)?;
    write_xlsx(&book, path)
}

/// Load an `.xlsx` file and rebuild its tree against `index`.
pub fn read_document(path: &Path, index: &SchemaIndex, config: &CodecConfig) -> Result<DocumentTree> {
    let book = read_xlsx(path)?;
    WorkbookReader::new().with_config(config.clone()).read(&book, index)
}

/// RS id named by the root sheet of the `.xlsx` file at `path`.
pub fn workbook_rs(path: &Path) -> Result<String> {
    let book = read_xlsx(path)?;
    root_sheet(&book).map(str::to_string)
}
