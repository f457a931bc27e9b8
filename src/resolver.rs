//! Sibling schema discovery.
//!
//! A data file `Foo.json` is validated against the first of these found in
//! the same directory, compared case-insensitively:
//!
//! 1. `FooSchema.json`
//! 2. `Foo.schema.json`
//! 3. `schema.json`
//!
//! Files whose name ends with `schema.json` are schemas themselves and never
//! resolve.

use tracing::{debug, warn};

use crate::index::DependencyIndex;
use crate::types::DocumentId;
use crate::workspace::Workspace;

/// Candidate schema names for `file`, in priority order.
///
/// Empty for files that are schemas by name.
pub fn schema_candidates(file: &DocumentId) -> Vec<String> {
    if file.is_schema_name() {
        return Vec::new();
    }
    let name = file.name();
    let base = match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    vec![
        format!("{}Schema.json", base),
        format!("{}.schema.json", base),
        "schema.json".to_string(),
    ]
}

/// Find the schema for `file` and register the pair in `index`.
pub fn resolve_schema(
    workspace: &dyn Workspace,
    index: &DependencyIndex,
    file: &DocumentId,
) -> Option<DocumentId> {
    let candidates = schema_candidates(file);
    if candidates.is_empty() {
        return None;
    }

    let siblings = match workspace.list_dir(file.container()) {
        Ok(names) => names,
        Err(e) => {
            warn!(dir = %file.container().display(), error = %e, "cannot list directory");
            return None;
        }
    };

    for wanted in &candidates {
        debug!(wanted = %wanted, dir = %file.container().display(), "looking for schema");
        let wanted = wanted.to_lowercase();
        let found = siblings
            .iter()
            .filter(|name| name.to_lowercase() == wanted)
            .map(|name| file.sibling(name))
            .find(|schema| workspace.is_file(schema.path()));
        if let Some(schema) = found {
            index.associate(&schema, file);
            return Some(schema);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::LocalWorkspace;
    use std::path::Path;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "{}").unwrap();
    }

    #[test]
    fn candidates_in_priority_order() {
        let file = DocumentId::new("/x/Foo.json");
        assert_eq!(
            schema_candidates(&file),
            vec!["FooSchema.json", "Foo.schema.json", "schema.json"]
        );
    }

    #[test]
    fn candidates_strip_last_extension_only() {
        let file = DocumentId::new("/x/app.config.json");
        assert_eq!(schema_candidates(&file)[0], "app.configSchema.json");
    }

    #[test]
    fn schemas_have_no_candidates() {
        assert!(schema_candidates(&DocumentId::new("Thing.Schema.json")).is_empty());
        assert!(schema_candidates(&DocumentId::new("FooSCHEMA.JSON")).is_empty());
    }

    #[test]
    fn first_candidate_wins() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "Foo.json");
        touch(dir.path(), "FooSchema.json");
        touch(dir.path(), "Foo.schema.json");
        touch(dir.path(), "schema.json");

        let index = DependencyIndex::new();
        let file = DocumentId::new(dir.path().join("Foo.json"));
        let schema = resolve_schema(&LocalWorkspace, &index, &file).unwrap();
        assert_eq!(schema.name(), "FooSchema.json");
        assert!(index.dependents_of(&schema).contains(&file));
    }

    #[test]
    fn falls_back_to_directory_schema() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "bar.json");
        touch(dir.path(), "Schema.JSON");

        let index = DependencyIndex::new();
        let file = DocumentId::new(dir.path().join("bar.json"));
        let schema = resolve_schema(&LocalWorkspace, &index, &file).unwrap();
        assert_eq!(schema.name(), "Schema.JSON");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "foo.json");
        touch(dir.path(), "FOOSCHEMA.JSON");

        let index = DependencyIndex::new();
        let file = DocumentId::new(dir.path().join("foo.json"));
        let schema = resolve_schema(&LocalWorkspace, &index, &file).unwrap();
        assert_eq!(schema.name(), "FOOSCHEMA.JSON");
    }

    #[test]
    fn schema_never_resolves_for_itself() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "Thing.Schema.json");
        touch(dir.path(), "schema.json");

        let index = DependencyIndex::new();
        let file = DocumentId::new(dir.path().join("Thing.Schema.json"));
        assert_eq!(resolve_schema(&LocalWorkspace, &index, &file), None);
        assert!(index.is_empty());
    }

    #[test]
    fn directories_do_not_match() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "foo.json");
        std::fs::create_dir(dir.path().join("fooSchema.json")).unwrap();

        let index = DependencyIndex::new();
        let file = DocumentId::new(dir.path().join("foo.json"));
        assert_eq!(resolve_schema(&LocalWorkspace, &index, &file), None);
    }

    #[test]
    fn no_candidate_resolves_to_none() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "foo.json");
        touch(dir.path(), "barSchema.json");

        let index = DependencyIndex::new();
        let file = DocumentId::new(dir.path().join("foo.json"));
        assert_eq!(resolve_schema(&LocalWorkspace, &index, &file), None);
        assert!(index.is_empty());
    }
}
