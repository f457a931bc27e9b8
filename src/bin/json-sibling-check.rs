//! json-sibling-check CLI
//!
//! Command-line front end: checks file trees once, replays change/removal
//! event scripts against one checker, and dumps pointer → line maps.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use json_sibling_check::{
    build_position_map, CheckError, CheckOptions, Checker, DocumentId, ExtensionSchemaProvider,
    LocalWorkspace, MemorySink, Severity, JSON_EXTENSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "json-sibling-check")]
#[command(about = "Validate JSON files against sibling schemas, reporting source lines")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG applies otherwise
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check files and directories once
    Check {
        /// Files or directories (searched recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        host: HostArgs,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Feed a script of `changed <path>` / `removed <path>` events to one checker
    Replay {
        /// Event script; relative paths are resolved against its directory
        script: PathBuf,

        #[command(flatten)]
        host: HostArgs,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print the line of every JSON Pointer in a file
    Positions {
        file: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Args)]
struct HostArgs {
    /// Implicit schema for a file extension, as EXT=SCHEMA_FILE (repeatable, first wins)
    #[arg(long = "schema-for", value_name = "EXT=FILE")]
    schema_for: Vec<String>,

    /// Extension whose syntax errors are reported elsewhere (repeatable)
    #[arg(long = "external-syntax", value_name = "EXT")]
    external_syntax: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Check {
            paths,
            host,
            format,
        } => run_check(&paths, &host, &format),
        Commands::Replay {
            script,
            host,
            format,
        } => run_replay(&script, &host, &format),
        Commands::Positions { file, format } => run_positions(&file, &format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build a checker from the host flags. Returns the extensions that have
/// a provided schema alongside it.
fn build_checker(host: &HostArgs, sink: Arc<MemorySink>) -> Result<(Checker, Vec<String>), u8> {
    let mut options = CheckOptions::new();
    for ext in &host.external_syntax {
        options = options.external_syntax_check(ext);
    }

    let mut checker = Checker::new(Arc::new(LocalWorkspace), sink).with_options(options);
    let mut extensions = Vec::new();
    for entry in &host.schema_for {
        let Some((ext, schema_path)) = entry.split_once('=') else {
            return Err(fail(CheckError::InvalidSchemaMapping {
                value: entry.clone(),
            }));
        };
        let schema = std::fs::read_to_string(schema_path).map_err(|source| {
            fail(CheckError::SchemaRead {
                schema: schema_path.to_string(),
                source,
            })
        })?;
        let provider = ExtensionSchemaProvider::new().with(ext, schema);
        extensions.extend(provider.extensions().map(str::to_string));
        checker = checker.with_provider(provider);
    }
    Ok((checker, extensions))
}

fn run_check(paths: &[PathBuf], host: &HostArgs, format: &str) -> Result<(), u8> {
    let sink = Arc::new(MemorySink::new());
    let (checker, extensions) = build_checker(host, sink.clone())?;

    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(fail(CheckError::PathNotFound { path: path.clone() }));
        }
        collect_files(path, &extensions, &mut files);
    }
    files.sort();
    files.dedup();

    // Data files first, so schemas already know their dependents
    let (schemas, data): (Vec<DocumentId>, Vec<DocumentId>) =
        files.into_iter().partition(|f| f.is_schema_name());
    for file in &data {
        checker.on_resource_changed(file);
    }
    for schema in &schemas {
        if checker.index().dependents_of(schema).is_empty() {
            checker.on_resource_changed(schema);
        }
    }

    report(&sink, data.len() + schemas.len(), format)
}

fn run_replay(script: &Path, host: &HostArgs, format: &str) -> Result<(), u8> {
    let content = read_file(script)?;
    let base = script.parent().unwrap_or(Path::new("."));

    let mut events = Vec::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (verb, path) = line
            .split_once(char::is_whitespace)
            .map(|(v, p)| (v, p.trim()))
            .unwrap_or((line, ""));
        if path.is_empty() || !matches!(verb, "changed" | "removed") {
            return Err(fail(CheckError::InvalidEvent {
                script: script.to_path_buf(),
                line: n + 1,
            }));
        }
        events.push((verb == "removed", DocumentId::new(base.join(path))));
    }

    let sink = Arc::new(MemorySink::new());
    let (checker, _) = build_checker(host, sink.clone())?;
    for (removed, file) in &events {
        if *removed {
            checker.on_resource_removed(file);
        } else {
            checker.on_resource_changed(file);
        }
    }

    report(&sink, events.len(), format)
}

fn run_positions(file: &Path, format: &str) -> Result<(), u8> {
    let text = read_file(file)?;
    let map = build_position_map(&text);

    if format == "json" {
        let entries: Vec<serde_json::Value> = map
            .sorted()
            .into_iter()
            .map(|(pointer, line)| serde_json::json!({ "pointer": pointer, "line": line }))
            .collect();
        println!("{}", serde_json::Value::Array(entries));
    } else {
        for (pointer, line) in map.sorted() {
            let shown = if pointer.is_empty() { "(root)" } else { pointer };
            println!("{:>5}  {}", line, shown);
        }
    }
    Ok(())
}

/// Report a fatal error and map it to the process exit code.
fn fail(e: CheckError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

fn read_file(path: &Path) -> Result<String, u8> {
    std::fs::read_to_string(path).map_err(|source| {
        fail(CheckError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

/// Print the sink's diagnostics; exit 1 if any of them is an error.
fn report(sink: &MemorySink, files_checked: usize, format: &str) -> Result<(), u8> {
    let diagnostics = sink.snapshot();
    let errors = sink.count(Severity::Error);

    if format == "json" {
        let output = serde_json::json!({
            "files_checked": files_checked,
            "errors": errors,
            "diagnostics": diagnostics,
        });
        println!("{}", output);
    } else {
        for diag in &diagnostics {
            // Continuation lines of multi-cause messages are indented under the first
            println!("{}", diag.to_string().replace('\n', "\n    "));
        }
        if errors == 0 {
            println!("\x1b[32m✓ {} files checked, no errors\x1b[0m", files_checked);
        } else {
            println!(
                "\x1b[31m✗ {} files checked, {} errors\x1b[0m",
                files_checked, errors
            );
        }
    }

    if errors == 0 {
        Ok(())
    } else {
        Err(1)
    }
}

/// Collect checkable files: `.json` plus any extension with a provided schema.
fn collect_files(path: &Path, extensions: &[String], files: &mut Vec<DocumentId>) {
    if path.is_file() {
        files.push(DocumentId::from(path));
        return;
    }

    let Ok(entries) = std::fs::read_dir(path) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, extensions, files);
        } else if is_checkable(&path, extensions) {
            files.push(DocumentId::new(path));
        }
    }
}

fn is_checkable(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    ext == JSON_EXTENSION || extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
}
