//! Implicit schemas supplied by file type.

use std::collections::HashMap;

use crate::types::DocumentId;

/// Supplies a schema for files it recognizes, bypassing sibling discovery.
///
/// Providers are consulted in registration order and the first one that
/// answers wins.
pub trait SchemaProvider: Send + Sync {
    /// Schema text for `file`, or `None` if this provider does not handle it.
    fn schema_for(&self, file: &DocumentId) -> Option<String>;
}

/// Maps file extensions (case-insensitive) to schema text.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSchemaProvider {
    schemas: HashMap<String, String>,
}

impl ExtensionSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` for `extension` (leading dot optional).
    pub fn with(mut self, extension: &str, schema: impl Into<String>) -> Self {
        self.insert(extension, schema);
        self
    }

    pub fn insert(&mut self, extension: &str, schema: impl Into<String>) {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.schemas.insert(ext, schema.into());
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

impl SchemaProvider for ExtensionSchemaProvider {
    fn schema_for(&self, file: &DocumentId) -> Option<String> {
        let ext = file.extension()?.to_lowercase();
        self.schemas.get(&ext).cloned()
    }
}

/// First answer from an ordered provider list.
pub fn first_schema(providers: &[Box<dyn SchemaProvider>], file: &DocumentId) -> Option<String> {
    providers.iter().find_map(|p| p.schema_for(file))
}
