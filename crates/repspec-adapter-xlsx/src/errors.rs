//! Error types for the spreadsheet codec

use thiserror::Error;

/// Errors that can occur when writing or reading workbooks
#[derive(Error, Debug)]
pub enum CodecError {
    /// Sheet content violates a layout rule
    #[error("Structural error in sheet '{sheet}': {message}")]
    Structural { sheet: String, message: String },

    /// Workbook has no sheet to read from, or misses a referenced one
    #[error("Sheet '{0}' not found in workbook")]
    MissingSheet(String),

    /// Container library failure
    #[error("Spreadsheet backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Tree(#[from] repspec_ir::Error),

    #[error(transparent)]
    Schema(#[from] repspec_schema::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Create a structural error for `sheet`
    pub fn structural(sheet: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structural {
            sheet: sheet.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Sheet the error points at, if any
    pub fn sheet(&self) -> Option<&str> {
        match self {
            Self::Structural { sheet, .. } | Self::MissingSheet(sheet) => Some(sheet),
            _ => None,
        }
    }

    /// Whether this is a layout violation rather than an I/O or backend failure
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Structural { .. } | Self::Tree(repspec_ir::Error::Structure { .. } | repspec_ir::Error::Grid { .. })
        )
    }
}

/// Result type for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;
