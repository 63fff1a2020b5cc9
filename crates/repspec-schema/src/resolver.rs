//! Call-local reference resolution state

use crate::model::{SchemaFile, SchemaNode};
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Scope stack and `$ref` chain for one resolution call.
///
/// A context is created per top-level call and threaded through every
/// dereference. The innermost scope is the file that relative references
/// resolve against; the chain records every reference followed while
/// dereferencing a single node so that reference cycles are reported instead of
/// looping.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    scopes: Vec<Arc<SchemaFile>>,
    chain: Vec<(PathBuf, String)>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the scope of `file`.
    pub fn push_scope(&mut self, file: Arc<SchemaFile>) {
        self.scopes.push(file);
    }

    /// Leave the innermost scope.
    pub fn pop_scope(&mut self) -> Option<Arc<SchemaFile>> {
        self.scopes.pop()
    }

    /// File relative references currently resolve against.
    pub fn current_scope(&self) -> Option<&Arc<SchemaFile>> {
        self.scopes.last()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Record that `node` is being dereferenced; fails on a revisit.
    pub(crate) fn visit(&mut self, node: &SchemaNode) -> Result<()> {
        let key = (node.file().path.clone(), node.pointer().to_string());
        if self.chain.contains(&key) {
            let cycle = self
                .chain
                .iter()
                .map(|(path, pointer)| format!("{}#{pointer}", path.display()))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::malformed(
                node.location(),
                format!("reference cycle: {cycle}"),
            ));
        }
        self.chain.push(key);
        Ok(())
    }

    /// Forget the reference chain once a node is fully dereferenced.
    pub(crate) fn clear_chain(&mut self) {
        self.chain.clear();
    }
}
