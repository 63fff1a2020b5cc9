#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! # repspec-validation
//!
//! Schema validation of representation documents.
//!
//! The engine runs a `jsonschema` validator compiled from the RS schema files
//! and records every violation with its document path. Failed alternative sets
//! keep the violations of each branch so that reporting can be narrowed to the
//! branches the document selected (see [`prune`]).
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use repspec_schema::SchemaLoader;
//! use repspec_validation::ValidationEngine;
//!
//! let index = SchemaLoader::new("schema").load_rs("RS0004").unwrap();
//! let doc = serde_json::json!({"metadata": {"schema": "RS0004", "description": "blower"}});
//! match ValidationEngine::new(&index).validate(&doc, "blower.json") {
//!     Ok(report) => println!("{report}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod engine;
pub mod prune;
pub mod reporter;

pub use engine::{BranchViolations, ValidationConfig, ValidationEngine, Violation};
pub use prune::prune;
pub use reporter::{ValidationFailure, ValidationReport, format_messages};

use thiserror::Error;

/// Errors that can occur during validation
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(ValidationFailure),

    #[error(transparent)]
    Schema(#[from] repspec_schema::Error),

    #[error("Schema for {rs} does not compile: {message}")]
    Compile { rs: String, message: String },
}

impl Error {
    pub fn compile(rs: impl Into<String>, message: impl ToString) -> Self {
        Self::Compile {
            rs: rs.into(),
            message: message.to_string(),
        }
    }

    /// Aggregated failure, when this is one.
    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            Self::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Convenience function to validate a document with default settings
pub fn validate(
    index: &repspec_schema::SchemaIndex,
    instance: &serde_json::Value,
    fallback_description: &str,
) -> Result<ValidationReport> {
    ValidationEngine::new(index).validate(instance, fallback_description)
}
