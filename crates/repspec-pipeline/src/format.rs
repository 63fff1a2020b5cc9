//! Container formats, chosen by file extension

use crate::{Error, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported document containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Pretty or compact JSON text
    Json,
    /// YAML text (`.yaml` or `.yml`)
    Yaml,
    /// CBOR binary map
    Cbor,
    /// Spreadsheet workbook
    Xlsx,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Json, Format::Yaml, Format::Cbor, Format::Xlsx];

    /// Format for a bare extension (no dot), case-insensitive.
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "cbor" => Ok(Self::Cbor),
            "xlsx" => Ok(Self::Xlsx),
            _ => Err(Error::unsupported(extension)),
        }
    }

    /// Format of the file at `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(extension)
    }

    /// Extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Cbor => "cbor",
            Self::Xlsx => "xlsx",
        }
    }

    /// Whether the container is a binary file rather than text.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Cbor | Self::Xlsx)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s.trim_start_matches('.'))
    }
}
