//! Error types for schema loading and validation passes.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a single validation pass or a CLI run.
///
/// Malformed instance documents are not errors: they are reported to the
/// user as diagnostics. Inside a checker everything here is logged and stays
/// local to the file being checked.
#[derive(Debug, Error)]
pub enum CheckError {
    // IO errors (exit code 3)
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read schema {schema}: {source}")]
    SchemaRead {
        schema: String,
        #[source]
        source: std::io::Error,
    },

    // Schema errors (exit code 2)
    #[error("schema {schema} is not valid JSON: {source}")]
    SchemaParse {
        schema: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schema {schema}: {message}")]
    InvalidSchema { schema: String, message: String },

    // Usage errors (exit code 2)
    #[error("path not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("--schema-for expects EXT=FILE, got \"{value}\"")]
    InvalidSchemaMapping { value: String },

    #[error("{script}:{line}: expected \"changed <path>\" or \"removed <path>\"")]
    InvalidEvent { script: PathBuf, line: usize },
}

impl CheckError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            CheckError::Io { .. } | CheckError::SchemaRead { .. } => 3,
            _ => 2,
        }
    }

    /// True when the failure belongs to the schema rather than the instance.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            CheckError::SchemaRead { .. }
                | CheckError::SchemaParse { .. }
                | CheckError::InvalidSchema { .. }
        )
    }
}
