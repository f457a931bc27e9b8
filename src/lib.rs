//! Sibling-schema JSON checker
//!
//! Incrementally validates JSON documents against JSON Schemas found next to
//! them by naming convention, and reports failures at source line numbers.
//!
//! For a data file `Foo.json` the schema is the first of `FooSchema.json`,
//! `Foo.schema.json` or `schema.json` in the same directory (compared
//! case-insensitively). The pairing is remembered, so editing or deleting a
//! schema re-validates every file that uses it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use json_sibling_check::{Checker, DocumentId, LocalWorkspace, MemorySink};
//!
//! let sink = Arc::new(MemorySink::new());
//! let checker = Checker::new(Arc::new(LocalWorkspace), sink.clone());
//!
//! let data = DocumentId::new("config/app.json");
//! checker.on_resource_changed(&data);
//!
//! for diagnostic in sink.diagnostics(&data) {
//!     println!("{}", diagnostic);
//! }
//! ```
//!
//! # Line numbers
//!
//! Validation failures carry a JSON Pointer such as `/servers/0/port`.
//! [`build_position_map`] scans the original text and maps every pointer to
//! the line where its value starts:
//!
//! ```
//! use json_sibling_check::build_position_map;
//!
//! let map = build_position_map("{\n  \"servers\": [\n    {\"port\": \"80\"}\n  ]\n}");
//! assert_eq!(map.line(""), Some(1));
//! assert_eq!(map.line("/servers"), Some(2));
//! assert_eq!(map.line("/servers/0/port"), Some(3));
//! ```

mod checker;
mod error;
mod index;
mod positions;
mod provider;
mod resolver;
mod sink;
mod types;
mod validator;
mod workspace;

pub use checker::{Checker, SchemaSource};
pub use error::CheckError;
pub use index::DependencyIndex;
pub use positions::{build_position_map, escape_token, PositionMap};
pub use provider::{first_schema, ExtensionSchemaProvider, SchemaProvider};
pub use resolver::{resolve_schema, schema_candidates};
pub use sink::{DiagnosticSink, MemorySink};
pub use types::{CheckOptions, Diagnostic, DocumentId, Severity, JSON_EXTENSION, SCHEMA_SUFFIX};
pub use validator::{validate_against_schema, Failure};
pub use workspace::{LocalWorkspace, Workspace};
