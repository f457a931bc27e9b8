//! Core types shared by the resolver, index and checker.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// File name suffix that marks a document as a schema (compared case-insensitively).
pub const SCHEMA_SUFFIX: &str = "schema.json";

/// Extension of documents that take part in sibling schema discovery.
pub const JSON_EXTENSION: &str = "json";

/// Stable handle to a file in the tree.
///
/// Identity is the path; content is never owned and is read on demand.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(PathBuf);

impl DocumentId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name, or an empty string for paths like `/` or `..`.
    pub fn name(&self) -> &str {
        self.0
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Last extension without the dot, as written on disk.
    pub fn extension(&self) -> Option<&str> {
        self.0.extension().and_then(|e| e.to_str())
    }

    /// Directory that contains this document; `.` for bare file names.
    pub fn container(&self) -> &Path {
        match self.0.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Another document in the same directory.
    pub fn sibling(&self, name: &str) -> DocumentId {
        match self.0.parent() {
            Some(parent) => DocumentId(parent.join(name)),
            None => DocumentId(PathBuf::from(name)),
        }
    }

    /// True for `.json` documents. The extension match is case-sensitive.
    pub fn is_json(&self) -> bool {
        self.extension() == Some(JSON_EXTENSION)
    }

    /// True if the name marks this document as a schema.
    pub fn is_schema_name(&self) -> bool {
        self.name().to_lowercase().ends_with(SCHEMA_SUFFIX)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&Path> for DocumentId {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<PathBuf> for DocumentId {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// A positioned message attached to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: DocumentId,
    /// 1-based line; 1 when the location is unknown.
    pub line: usize,
    /// JSON Pointer the message refers to, absent for syntax errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: &DocumentId, line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file: file.clone(),
            line: line.max(1),
            pointer: None,
            message: message.into(),
        }
    }

    pub fn at_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.file,
            self.line,
            self.severity.label(),
            self.message
        )
    }
}

/// Options for a checker.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Lowercase extensions whose syntax the host already checks.
    /// Parse errors in those files are not reported a second time.
    pub external_syntax_check: BTreeSet<String>,
}

impl CheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an extension (with or without the leading dot) as syntax-checked by the host.
    pub fn external_syntax_check(mut self, extension: impl AsRef<str>) -> Self {
        let ext = extension.as_ref().trim_start_matches('.').to_lowercase();
        self.external_syntax_check.insert(ext);
        self
    }

    /// Does the host already report syntax errors for this file type?
    pub fn host_checks_syntax(&self, file: &DocumentId) -> bool {
        file.extension()
            .map(|e| self.external_syntax_check.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }
}
