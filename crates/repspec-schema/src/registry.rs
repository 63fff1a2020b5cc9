//! Concurrent cache of loaded RS schemas

use crate::index::SchemaIndex;
use crate::loader::SchemaLoader;
use crate::Result;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace};

/// Registry handing out read-only schema indexes keyed by RS id
pub struct SchemaRegistry {
    loader: SchemaLoader,
    schemas: DashMap<String, Arc<SchemaIndex>>,
}

impl SchemaRegistry {
    /// Create an empty registry loading from `schema_dir`.
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader: SchemaLoader::new(schema_dir),
            schemas: DashMap::new(),
        }
    }

    pub fn loader(&self) -> &SchemaLoader {
        &self.loader
    }

    /// Cached index for `rs_id`, loading it on first use.
    pub fn get_or_load(&self, rs_id: &str) -> Result<Arc<SchemaIndex>> {
        if let Some(cached) = self.schemas.get(rs_id) {
            trace!("Cache hit for schema: {}", rs_id);
            return Ok(Arc::clone(cached.value()));
        }

        debug!("Cache miss for schema: {}", rs_id);
        let index = Arc::new(self.loader.load_rs(rs_id)?);
        let entry = self
            .schemas
            .entry(rs_id.to_string())
            .or_insert_with(|| Arc::clone(&index));
        Ok(Arc::clone(entry.value()))
    }

    /// Register an already loaded index under its RS id.
    pub fn register(&self, index: SchemaIndex) -> Arc<SchemaIndex> {
        let index = Arc::new(index);
        self.schemas
            .insert(index.rs_id().to_string(), Arc::clone(&index));
        index
    }

    pub fn get(&self, rs_id: &str) -> Option<Arc<SchemaIndex>> {
        self.schemas.get(rs_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, rs_id: &str) -> bool {
        self.schemas.contains_key(rs_id)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}
