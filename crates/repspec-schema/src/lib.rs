#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! # repspec-schema
//!
//! Schema loading and lineage resolution for representation specifications.
//!
//! A representation specification (RS) is described by one schema file per RS
//! plus a shared base file; files are joined by `$ref` cross-references. This
//! crate loads such a file set, resolves dotted field paths ("lineages") to the
//! schema node governing them, disambiguates `oneOf` alternatives from either
//! document content or an explicit selector vector, and extracts declared
//! grid-variable order.

pub mod index;
pub mod loader;
pub mod model;
pub mod registry;
pub mod resolver;

pub use index::{Conditional, SchemaIndex, Selectors};
pub use loader::SchemaLoader;
pub use model::{SchemaFile, SchemaNode, Shape};
pub use registry::SchemaRegistry;
pub use resolver::ResolutionContext;

use thiserror::Error;

/// Errors that can occur when working with schemas
#[derive(Error, Debug)]
pub enum Error {
    /// A lineage segment has no match in any branch. Recoverable when probing.
    #[error("'{segment}' not found in schema (lineage '{lineage}')")]
    LineageNotFound { lineage: String, segment: String },

    /// A `$ref` does not land on a loaded file or an existing node.
    #[error("Cannot resolve reference '{reference}': {reason}")]
    Resolution { reference: String, reason: String },

    /// The schema itself is inconsistent (reference cycle, bad branch index, ...).
    #[error("Malformed schema at {location}: {reason}")]
    Malformed { location: String, reason: String },

    /// No grid-variable group declares every observed axis.
    #[error("No grid variable group at '{lineage}' declares all of [{observed}]")]
    GridVariables { lineage: String, observed: String },

    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format in {path}: {message}")]
    InvalidFormat { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a lineage-not-found error from the walked lineage.
    pub fn lineage_not_found<S: AsRef<str>>(lineage: &[S], segment: impl Into<String>) -> Self {
        Self::LineageNotFound {
            lineage: dotted(lineage),
            segment: segment.into(),
        }
    }

    pub fn resolution(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for the "not found" outcome callers may treat as normal control flow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::LineageNotFound { .. })
    }
}

/// Join lineage segments with `.`.
pub fn dotted<S: AsRef<str>>(lineage: &[S]) -> String {
    lineage
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

/// Crate-local result type for schema operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        let missing = Error::lineage_not_found(&["performance", "nope"], "nope");
        assert!(missing.is_not_found());
        assert_eq!(
            missing.to_string(),
            "'nope' not found in schema (lineage 'performance.nope')"
        );
        assert!(!Error::resolution("X.json", "missing").is_not_found());
        assert!(!Error::malformed("X.json#", "cycle").is_not_found());
    }
}
