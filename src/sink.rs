//! Where diagnostics go.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::types::{Diagnostic, DocumentId, Severity};

/// Receiver of positioned diagnostics, e.g. an editor's problem list.
pub trait DiagnosticSink: Send + Sync {
    /// Drop every diagnostic previously reported for `file`.
    fn clear(&self, file: &DocumentId);

    fn add(&self, file: &DocumentId, diagnostic: Diagnostic);

    /// Clear `file` and report `diagnostics` in its place.
    ///
    /// Implementations shared between threads should override this so other
    /// readers never observe the cleared-but-not-yet-filled state.
    fn replace(&self, file: &DocumentId, diagnostics: Vec<Diagnostic>) {
        self.clear(file);
        for diagnostic in diagnostics {
            self.add(file, diagnostic);
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    by_file: BTreeMap<DocumentId, Vec<Diagnostic>>,
    clears: HashMap<DocumentId, usize>,
}

/// In-memory sink. Used by the CLI and handy in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    store: Mutex<Store>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current diagnostics of one file.
    pub fn diagnostics(&self, file: &DocumentId) -> Vec<Diagnostic> {
        self.lock().by_file.get(file).cloned().unwrap_or_default()
    }

    /// All current diagnostics ordered by file, then line.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        let store = self.lock();
        let mut all: Vec<Diagnostic> = store.by_file.values().flatten().cloned().collect();
        all.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        all
    }

    /// How many times `file` has been cleared, i.e. how many passes touched it.
    pub fn clear_count(&self, file: &DocumentId) -> usize {
        self.lock().clears.get(file).copied().unwrap_or(0)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.lock()
            .by_file
            .values()
            .flatten()
            .filter(|d| d.severity == severity)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn clear(&self, file: &DocumentId) {
        let mut store = self.lock();
        store.by_file.remove(file);
        *store.clears.entry(file.clone()).or_insert(0) += 1;
    }

    fn add(&self, file: &DocumentId, diagnostic: Diagnostic) {
        self.lock()
            .by_file
            .entry(file.clone())
            .or_default()
            .push(diagnostic);
    }

    fn replace(&self, file: &DocumentId, diagnostics: Vec<Diagnostic>) {
        let mut store = self.lock();
        *store.clears.entry(file.clone()).or_insert(0) += 1;
        if diagnostics.is_empty() {
            store.by_file.remove(file);
        } else {
            store.by_file.insert(file.clone(), diagnostics);
        }
    }
}
