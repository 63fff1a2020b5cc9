#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! # repspec-pipeline
//!
//! Format gateway for representation specification documents.
//!
//! Documents are loaded from and dumped to `.json`, `.yaml`/`.yml`, `.cbor`
//! and `.xlsx` files, chosen by extension. On top of that sit file
//! translation, validation against the RS schema a document names, directory
//! batches that report every failing file at once, and template workbooks
//! generated from a selector configuration.

pub mod batch;
pub mod config;
pub mod format;
pub mod gateway;

pub use batch::{FileFailure, generate_templates, translate_directory, validate_directory};
pub use config::{GatewayConfig, TemplateSet, TemplateSpec};
pub use format::Format;
pub use gateway::Gateway;

use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in the gateway
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported format '.{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("Cannot tell which RS '{path}' follows: it has no metadata.schema and its file name names no RS id")]
    UnknownRs { path: String },

    #[error("Configuration error in '{path}': {message}")]
    Config { path: String, message: String },

    #[error("Failed to {operation} '{path}': {message}")]
    Encoding {
        operation: String,
        path: String,
        message: String,
    },

    #[error("IO error during {operation} for '{path}': {message}")]
    Io {
        operation: String,
        path: String,
        message: String,
    },

    #[error("{operation} failed for {} file(s):{}", .failures.len(), list_failures(.failures))]
    Batch {
        operation: String,
        failures: Vec<FileFailure>,
    },

    #[error(transparent)]
    Schema(#[from] repspec_schema::Error),

    #[error(transparent)]
    Tree(#[from] repspec_ir::Error),

    #[error(transparent)]
    Codec(#[from] repspec_adapter_xlsx::CodecError),

    #[error(transparent)]
    Validation(#[from] repspec_validation::Error),
}

fn list_failures(failures: &[FileFailure]) -> String {
    let mut out = String::new();
    for failure in failures {
        let _ = write!(out, "\n  {failure}");
    }
    out
}

impl Error {
    /// Create an unsupported-format error for `extension`
    pub fn unsupported(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    /// Create a serialization error with operation/path context.
    pub fn encoding(operation: impl Into<String>, path: &Path, message: impl ToString) -> Self {
        Self::Encoding {
            operation: operation.into(),
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a structured I/O error with operation/path context.
    pub fn io(operation: impl Into<String>, path: &Path, error: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }

    /// Create a configuration error for the file at `path`
    pub fn config(path: &Path, message: impl ToString) -> Self {
        Self::Config {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Per-file failures of a batch operation, if this is one.
    pub fn failures(&self) -> &[FileFailure] {
        match self {
            Self::Batch { failures, .. } => failures,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
