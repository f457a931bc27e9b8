//! Schema → data file dependency index.
//!
//! Records which data files are currently validated against which schema so
//! that a schema edit or deletion can re-validate everything that uses it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::types::DocumentId;

/// Bidirectional schema/dependent mapping.
///
/// A data file is listed under at most one schema. Schemas whose dependent
/// set becomes empty are dropped. All operations lock the whole map, so a
/// read-modify-write on one schema's set never interleaves with another.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    by_schema: Mutex<HashMap<DocumentId, BTreeSet<DocumentId>>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, BTreeSet<DocumentId>>> {
        // Every mutation is a single map or set operation, so a poisoned map is still consistent.
        self.by_schema
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record that `data` is validated against `schema`.
    ///
    /// Idempotent. Moves `data` out of any other schema's set.
    pub fn associate(&self, schema: &DocumentId, data: &DocumentId) {
        let mut map = self.lock();
        map.retain(|other, dependents| {
            if other != schema && dependents.remove(data) {
                debug!(%data, previous = %other, "data file changed schema");
            }
            !dependents.is_empty() || other == schema
        });
        if map.entry(schema.clone()).or_default().insert(data.clone()) {
            debug!(%schema, %data, "associated data file with schema");
        }
    }

    /// Data files currently validated against `schema`.
    pub fn dependents_of(&self, schema: &DocumentId) -> BTreeSet<DocumentId> {
        self.lock().get(schema).cloned().unwrap_or_default()
    }

    /// Schema `data` is currently validated against, if any.
    pub fn schema_of(&self, data: &DocumentId) -> Option<DocumentId> {
        self.lock()
            .iter()
            .find(|(_, dependents)| dependents.contains(data))
            .map(|(schema, _)| schema.clone())
    }

    /// Forget `resource` everywhere.
    ///
    /// If it was a schema, its entry is dropped and the former dependents are
    /// returned so the caller can re-validate them. It is also removed from
    /// every dependent set it appears in; all entries are visited.
    pub fn remove(&self, resource: &DocumentId) -> BTreeSet<DocumentId> {
        let mut map = self.lock();
        let former = map.remove(resource).unwrap_or_default();
        map.retain(|schema, dependents| {
            if dependents.remove(resource) {
                debug!(%resource, %schema, "removed dependent");
            }
            !dependents.is_empty()
        });
        if !former.is_empty() {
            debug!(schema = %resource, dependents = former.len(), "removed schema");
        }
        former
    }

    /// All schemas with at least one dependent, sorted.
    pub fn schemas(&self) -> Vec<DocumentId> {
        let mut schemas: Vec<DocumentId> = self.lock().keys().cloned().collect();
        schemas.sort();
        schemas
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
