//! File access used by the resolver and checker.

use std::io;
use std::path::Path;

/// Read access to the file tree.
pub trait Workspace: Send + Sync {
    /// True if `path` exists and is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Full text of a file.
    fn read_text(&self, path: &Path) -> io::Result<String>;

    /// Names of the entries in `dir`, case preserved.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// Workspace backed by the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWorkspace;

impl Workspace for LocalWorkspace {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
