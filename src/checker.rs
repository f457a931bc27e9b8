//! Validation orchestration.
//!
//! `Checker` reacts to change and removal events for single files. Each event
//! picks a schema (provider, sibling convention, or the file itself acting as
//! a schema for its dependents), runs one validation pass per affected file
//! and publishes the diagnostics of that pass in place of the previous ones.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::CheckError;
use crate::index::DependencyIndex;
use crate::positions::{build_position_map, PositionMap};
use crate::provider::{first_schema, SchemaProvider};
use crate::resolver::resolve_schema;
use crate::sink::DiagnosticSink;
use crate::types::{CheckOptions, Diagnostic, DocumentId};
use crate::validator::validate_against_schema;
use crate::workspace::Workspace;

/// Where the schema of a validation pass comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// Schema text handed out by a provider.
    Provided(String),
    /// A schema document in the tree.
    File(DocumentId),
    /// The `{}` schema: only syntax is checked.
    Empty,
}

impl SchemaSource {
    fn describe(&self) -> String {
        match self {
            SchemaSource::Provided(_) => "(provided)".to_string(),
            SchemaSource::File(doc) => doc.to_string(),
            SchemaSource::Empty => "(none)".to_string(),
        }
    }
}

/// Incremental JSON checker.
pub struct Checker {
    workspace: Arc<dyn Workspace>,
    sink: Arc<dyn DiagnosticSink>,
    providers: Vec<Box<dyn SchemaProvider>>,
    index: Arc<DependencyIndex>,
    options: CheckOptions,
}

impl Checker {
    pub fn new(workspace: Arc<dyn Workspace>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            workspace,
            sink,
            providers: Vec::new(),
            index: Arc::new(DependencyIndex::new()),
            options: CheckOptions::default(),
        }
    }

    /// Append a schema provider; earlier providers take precedence.
    pub fn with_provider(mut self, provider: impl SchemaProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Share an existing dependency index.
    pub fn with_index(mut self, index: Arc<DependencyIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.options = options;
        self
    }

    pub fn index(&self) -> &DependencyIndex {
        &self.index
    }

    /// React to `file` being created or modified.
    pub fn on_resource_changed(&self, file: &DocumentId) {
        if !self.workspace.is_file(file.path()) {
            debug!(%file, "not a file or no longer exists");
            return;
        }

        if let Some(schema) = first_schema(&self.providers, file) {
            debug!(%file, "schema supplied by provider");
            self.check(file, &SchemaSource::Provided(schema));
            return;
        }

        if !file.is_json() {
            return;
        }

        if let Some(schema) = resolve_schema(self.workspace.as_ref(), &self.index, file) {
            self.check(file, &SchemaSource::File(schema));
            return;
        }

        let dependents = self.index.dependents_of(file);
        if dependents.is_empty() {
            debug!(%file, "no schema");
            self.check(file, &SchemaSource::Empty);
        } else {
            let schema = SchemaSource::File(file.clone());
            for data in &dependents {
                debug!(%data, schema = %file, "status affected by schema");
                self.check(data, &schema);
            }
        }
    }

    /// React to `file` being deleted.
    ///
    /// Returns the data files that were re-checked because `file` was their schema.
    pub fn on_resource_removed(&self, file: &DocumentId) -> Vec<DocumentId> {
        let former = self.index.remove(file);
        self.sink.clear(file);
        for data in &former {
            info!(%data, schema = %file, "schema removed, re-checking");
            self.on_resource_changed(data);
        }
        former.into_iter().collect()
    }

    /// Run one validation pass and publish its diagnostics.
    ///
    /// I/O failures keep whatever was reported before; a broken schema clears
    /// the data file without reporting anything against it.
    fn check(&self, file: &DocumentId, schema: &SchemaSource) {
        match self.check_against(file, schema) {
            Ok(diagnostics) => self.sink.replace(file, diagnostics),
            Err(e) if e.is_schema_error() => {
                error!(%file, schema = %schema.describe(), error = %e, "cannot load schema");
                self.sink.replace(file, Vec::new());
            }
            Err(e) => {
                error!(%file, error = %e, "validation aborted");
            }
        }
    }

    /// Diagnostics for `file` validated against `schema`.
    pub fn check_against(
        &self,
        file: &DocumentId,
        schema: &SchemaSource,
    ) -> Result<Vec<Diagnostic>, CheckError> {
        let text = self.read(file)?;

        let instance = match parse_json(&text) {
            Ok(v) => v,
            Err(e) => return Ok(self.parse_failure(file, &e)),
        };

        let schema_name = schema.describe();
        let schema_value = self.load_schema(schema)?;
        let failures = validate_against_schema(&schema_name, &schema_value, &instance)?;
        debug!(%file, schema = %schema_name, failures = failures.len(), "validated");

        let mut positions: Option<PositionMap> = None;
        let diagnostics = failures
            .iter()
            .map(|failure| {
                let positions = positions.get_or_insert_with(|| build_position_map(&text));
                let line = positions.line_or_default(&failure.pointer);
                Diagnostic::error(file, line, failure.render())
                    .at_pointer(failure.pointer.clone())
            })
            .collect();
        Ok(diagnostics)
    }

    fn parse_failure(&self, file: &DocumentId, e: &serde_json::Error) -> Vec<Diagnostic> {
        if self.options.host_checks_syntax(file) {
            info!(%file, "syntax is checked by the host, no diagnostic");
            return Vec::new();
        }
        vec![Diagnostic::error(file, e.line(), parser_message(e))]
    }

    fn load_schema(&self, schema: &SchemaSource) -> Result<Value, CheckError> {
        match schema {
            SchemaSource::Empty => Ok(Value::Object(Default::default())),
            SchemaSource::Provided(text) => {
                parse_json(strip_bom(text)).map_err(|source| CheckError::SchemaParse {
                    schema: schema.describe(),
                    source,
                })
            }
            SchemaSource::File(doc) => {
                let text = self.workspace.read_text(doc.path()).map_err(|source| {
                    CheckError::SchemaRead {
                        schema: doc.to_string(),
                        source,
                    }
                })?;
                parse_json(strip_bom(&text)).map_err(|source| CheckError::SchemaParse {
                    schema: doc.to_string(),
                    source,
                })
            }
        }
    }

    /// Document text with any leading byte order mark removed.
    fn read(&self, file: &DocumentId) -> Result<String, CheckError> {
        let mut text = self
            .workspace
            .read_text(file.path())
            .map_err(|source| CheckError::Io {
                path: file.path().to_path_buf(),
                source,
            })?;
        if text.starts_with(BOM) {
            text.replace_range(..BOM.len_utf8(), "");
        }
        Ok(text)
    }
}

const BOM: char = '\u{feff}';

fn strip_bom(text: &str) -> &str {
    text.strip_prefix(BOM).unwrap_or(text)
}

/// Parse a complete JSON document of any nesting depth.
///
/// Deep input grows the stack on the heap instead of hitting serde_json's
/// recursion limit, so only malformed text is reported as a parse error.
fn parse_json(text: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Parser message without the trailing position, which becomes the line.
fn parser_message(e: &serde_json::Error) -> String {
    let full = e.to_string();
    let suffix = format!(" at line {} column {}", e.line(), e.column());
    match full.strip_suffix(&suffix) {
        Some(message) => message.to_string(),
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::types::Severity;
    use crate::workspace::LocalWorkspace;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, Arc<MemorySink>, Checker) {
        let dir = tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let checker = Checker::new(Arc::new(LocalWorkspace), sink.clone());
        (dir, sink, checker)
    }

    fn write(dir: &Path, name: &str, content: &str) -> DocumentId {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        DocumentId::new(path)
    }

    #[test]
    fn parser_message_drops_position() {
        let e = serde_json::from_str::<Value>("{\"a\": }").unwrap_err();
        assert_eq!(parser_message(&e), "expected value");
        assert_eq!(e.line(), 1);
    }

    #[test]
    fn parse_json_rejects_trailing_characters() {
        let e = parse_json("{\"a\": 1}\n]").unwrap_err();
        assert_eq!(parser_message(&e), "trailing characters");
        assert_eq!(e.line(), 2);
    }

    #[test]
    fn parse_json_accepts_deep_nesting() {
        let depth = 1000;
        let text = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        assert!(parse_json(&text).is_ok());
    }

    #[test]
    fn deeply_nested_instance_without_schema_is_clean() {
        let (dir, sink, checker) = setup();
        let text = format!("{}{}", "[".repeat(200), "]".repeat(200));
        let data = write(dir.path(), "plain.json", &text);

        checker.on_resource_changed(&data);
        assert!(sink.diagnostics(&data).is_empty());
        assert_eq!(sink.clear_count(&data), 1);
    }

    #[test]
    fn deeply_nested_instance_is_validated() {
        let (dir, sink, checker) = setup();
        let nested = format!("{}{}", "[".repeat(300), "]".repeat(300));
        let data = write(
            dir.path(),
            "data.json",
            &format!("{{\n  \"deep\": {},\n  \"name\": 1\n}}\n", nested),
        );
        write(
            dir.path(),
            "dataSchema.json",
            r#"{"properties":{"name":{"type":"string"}}}"#,
        );

        checker.on_resource_changed(&data);
        let diags = sink.diagnostics(&data);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].pointer.as_deref(), Some("/name"));
        assert_eq!(diags[0].line, 3);
    }

    #[test]
    fn deeply_nested_schema_still_applies() {
        let (dir, sink, checker) = setup();
        let data = write(dir.path(), "data.json", "{\"name\": 1}");
        let default = format!("{}{}", "[".repeat(200), "]".repeat(200));
        write(
            dir.path(),
            "dataSchema.json",
            &format!(
                r#"{{"default":{},"properties":{{"name":{{"type":"string"}}}}}}"#,
                default
            ),
        );

        checker.on_resource_changed(&data);
        let diags = sink.diagnostics(&data);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].pointer.as_deref(), Some("/name"));
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let (dir, sink, checker) = setup();
        let plain = write(dir.path(), "plain.json", "\u{feff}{\"a\": 1}");
        checker.on_resource_changed(&plain);
        assert!(sink.diagnostics(&plain).is_empty());
        assert_eq!(sink.clear_count(&plain), 1);

        let data = write(dir.path(), "data.json", "\u{feff}{\n  \"a\": 1\n}\n");
        write(
            dir.path(),
            "dataSchema.json",
            "\u{feff}{\"properties\":{\"a\":{\"type\":\"string\"}}}",
        );
        checker.on_resource_changed(&data);
        let diags = sink.diagnostics(&data);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].pointer.as_deref(), Some("/a"));
        assert_eq!(diags[0].line, 2);
    }

    #[test]
    fn provided_schema_may_start_with_byte_order_mark() {
        let (dir, sink, checker) = setup();
        let checker = checker.with_provider(
            crate::provider::ExtensionSchemaProvider::new()
                .with("conf", "\u{feff}{\"required\":[\"x\"]}"),
        );
        let file = write(dir.path(), "app.conf", "{}");

        checker.on_resource_changed(&file);
        let diags = sink.diagnostics(&file);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("\"x\""));
    }

    #[test]
    fn schema_failure_at_member_line() {
        let (dir, sink, checker) = setup();
        let data = write(dir.path(), "data.json", "{\n  \"a\": 1\n}\n");
        write(
            dir.path(),
            "dataSchema.json",
            r#"{"type":"object","properties":{"a":{"type":"string"}}}"#,
        );

        checker.on_resource_changed(&data);
        let diags = sink.diagnostics(&data);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 2);
        assert_eq!(diags[0].pointer.as_deref(), Some("/a"));
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn malformed_instance_reports_single_parse_error() {
        let (dir, sink, checker) = setup();
        let data = write(dir.path(), "data.json", "{\n\"a\": }");
        write(dir.path(), "dataSchema.json", r#"{"required":["b"]}"#);

        checker.on_resource_changed(&data);
        let diags = sink.diagnostics(&data);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 2);
        assert_eq!(diags[0].pointer, None);
    }

    #[test]
    fn host_syntax_check_suppresses_parse_error() {
        let (dir, sink, checker) = setup();
        let checker = checker.with_options(CheckOptions::new().external_syntax_check("json"));
        let data = write(dir.path(), "data.json", "{");

        checker.on_resource_changed(&data);
        assert!(sink.diagnostics(&data).is_empty());
        assert_eq!(sink.clear_count(&data), 1);
    }

    #[test]
    fn missing_file_is_noop() {
        let (dir, sink, checker) = setup();
        let ghost = DocumentId::new(dir.path().join("ghost.json"));
        checker.on_resource_changed(&ghost);
        assert_eq!(sink.clear_count(&ghost), 0);
    }

    #[test]
    fn directory_is_noop() {
        let (dir, sink, checker) = setup();
        let sub = DocumentId::new(dir.path().join("sub.json"));
        std::fs::create_dir(sub.path()).unwrap();
        checker.on_resource_changed(&sub);
        assert_eq!(sink.clear_count(&sub), 0);
    }

    #[test]
    fn non_json_without_provider_is_ignored() {
        let (dir, sink, checker) = setup();
        let file = write(dir.path(), "notes.txt", "{ not json");
        checker.on_resource_changed(&file);
        assert_eq!(sink.clear_count(&file), 0);
    }

    #[test]
    fn provider_schema_wins_over_sibling() {
        let (dir, sink, checker) = setup();
        let checker = checker.with_provider(
            crate::provider::ExtensionSchemaProvider::new()
                .with("json", r#"{"type":"array"}"#),
        );
        let data = write(dir.path(), "data.json", "{}");
        write(dir.path(), "dataSchema.json", r#"{"type":"object"}"#);

        checker.on_resource_changed(&data);
        assert_eq!(sink.diagnostics(&data).len(), 1);
        // Provider short-circuits discovery, nothing is indexed
        assert!(checker.index().is_empty());
    }

    #[test]
    fn provider_covers_other_extensions() {
        let (dir, sink, checker) = setup();
        let checker = checker.with_provider(
            crate::provider::ExtensionSchemaProvider::new()
                .with("manifest", r#"{"required":["name"]}"#),
        );
        let file = write(dir.path(), "app.manifest", "{\n\"version\": 1\n}");

        checker.on_resource_changed(&file);
        let diags = sink.diagnostics(&file);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 1);
    }

    #[test]
    fn schema_change_rechecks_dependents() {
        let (dir, sink, checker) = setup();
        let a = write(dir.path(), "a.json", r#"{"n": 1}"#);
        let b = write(dir.path(), "b.json", r#"{"n": "x"}"#);
        let schema = write(dir.path(), "schema.json", r#"{"properties":{"n":{"type":"number"}}}"#);

        checker.on_resource_changed(&a);
        checker.on_resource_changed(&b);
        assert!(sink.diagnostics(&a).is_empty());
        assert_eq!(sink.diagnostics(&b).len(), 1);

        std::fs::write(schema.path(), r#"{"properties":{"n":{"type":"string"}}}"#).unwrap();
        checker.on_resource_changed(&schema);
        assert_eq!(sink.diagnostics(&a).len(), 1);
        assert!(sink.diagnostics(&b).is_empty());
        // The schema itself is not checked while it has dependents
        assert_eq!(sink.clear_count(&schema), 0);
    }

    #[test]
    fn broken_schema_clears_without_diagnostic() {
        let (dir, sink, checker) = setup();
        let data = write(dir.path(), "data.json", r#"{"a": 1}"#);
        let schema = write(
            dir.path(),
            "dataSchema.json",
            r#"{"properties":{"a":{"type":"string"}}}"#,
        );
        checker.on_resource_changed(&data);
        assert_eq!(sink.diagnostics(&data).len(), 1);

        std::fs::write(schema.path(), "{ broken").unwrap();
        checker.on_resource_changed(&data);
        assert!(sink.diagnostics(&data).is_empty());
        assert!(sink.diagnostics(&schema).is_empty());
    }

    #[test]
    fn unreadable_file_keeps_previous_diagnostics() {
        struct Flaky;
        impl Workspace for Flaky {
            fn is_file(&self, _: &Path) -> bool {
                true
            }
            fn read_text(&self, path: &Path) -> std::io::Result<String> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    path.display().to_string(),
                ))
            }
            fn list_dir(&self, _: &Path) -> std::io::Result<Vec<String>> {
                Ok(Vec::new())
            }
        }

        let sink = Arc::new(MemorySink::new());
        let data = DocumentId::new("/virtual/data.json");
        sink.add(&data, Diagnostic::error(&data, 7, "earlier"));

        let checker = Checker::new(Arc::new(Flaky), sink.clone());
        checker.on_resource_changed(&data);
        assert_eq!(sink.diagnostics(&data)[0].message, "earlier");
        assert!(matches!(
            checker.check_against(&data, &SchemaSource::Empty),
            Err(CheckError::Io { .. })
        ));
    }

    #[test]
    fn shared_index_is_visible_to_caller() {
        let index = Arc::new(DependencyIndex::new());
        let (dir, _sink, checker) = setup();
        let checker = checker.with_index(index.clone());
        let data = write(dir.path(), "x.json", "{}");
        let schema = write(dir.path(), "x.schema.json", "{}");

        checker.on_resource_changed(&data);
        assert_eq!(index.schema_of(&data), Some(schema));
    }

    #[test]
    fn removing_data_file_drops_it_from_index() {
        let (dir, sink, checker) = setup();
        let data = write(dir.path(), "x.json", "[1,");
        write(dir.path(), "xSchema.json", "{}");
        checker.on_resource_changed(&data);
        assert_eq!(sink.diagnostics(&data).len(), 1);

        std::fs::remove_file(data.path()).unwrap();
        assert!(checker.on_resource_removed(&data).is_empty());
        assert!(checker.index().is_empty());
        assert!(sink.diagnostics(&data).is_empty());
    }
}
