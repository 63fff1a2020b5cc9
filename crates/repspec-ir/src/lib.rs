#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! # repspec-ir
//!
//! Generic document tree for representation specification documents.
//!
//! A document is mirrored into a tree of [`Node`]s, each annotated with the
//! schema node governing it and with the sheet layout the spreadsheet codec
//! uses for it. Trees are built from content ([`TreeBuilder::build_from_content`])
//! or from the schema alone ([`TreeBuilder::build_from_schema`]) and turned
//! back into content with [`Node::collect_content`].

/// Tree construction from content and from schema.
pub mod builder;
/// Numeric near-equality for document content.
pub mod compare;
/// Document container tying a tree to its RS and sheet list.
pub mod document;
/// Grid-variable expansion and compression.
pub mod grid;
/// Core tree node model.
pub mod node;
/// Closed selector configuration for template generation.
pub mod template;
/// Cursor-based traversal helpers for navigating trees.
pub mod traversal;

pub use builder::TreeBuilder;
pub use compare::values_near_equal;
pub use document::DocumentTree;
pub use grid::{GridError, GridSet, GridVariableSet};
pub use node::{Node, NodeType, SheetKind, GRID_VARIABLES, LOOKUP_VARIABLES};
pub use template::TemplateConfig;
pub use traversal::{Cursor, Traversal};

use thiserror::Error;

/// Errors that can occur when working with document trees
#[derive(Error, Debug)]
pub enum Error {
    /// Content does not fit the tree/sheet layout rules.
    #[error("Structure error at '{lineage}': {message}")]
    Structure { lineage: String, message: String },

    /// Template generation met an alternative or conditional it cannot decide.
    #[error("Template selection error at '{lineage}': {message}")]
    TemplateSelection { lineage: String, message: String },

    #[error(transparent)]
    Schema(#[from] repspec_schema::Error),

    #[error("Grid error at '{lineage}': {source}")]
    Grid {
        lineage: String,
        #[source]
        source: GridError,
    },

    #[error("Node not found at path: {path}")]
    NodeNotFound { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

impl Error {
    pub fn structure(lineage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structure {
            lineage: lineage.into(),
            message: message.into(),
        }
    }

    pub fn template_selection(lineage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateSelection {
            lineage: lineage.into(),
            message: message.into(),
        }
    }

    pub fn grid(lineage: impl Into<String>, source: GridError) -> Self {
        Self::Grid {
            lineage: lineage.into(),
            source,
        }
    }

    /// Build a node-not-found error with path context.
    pub fn node_not_found(path: impl Into<String>) -> Self {
        Self::NodeNotFound { path: path.into() }
    }

    /// Build an invalid-path error with input path and parsing reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-local result type for tree operations.
pub type Result<T> = std::result::Result<T, Error>;
