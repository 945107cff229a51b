use parking_lot::Mutex;
use serde::Serialize;

/// A recoverable condition noticed while indexing or rewriting.
///
/// None of these stop processing; they are handed to a [`DiagnosticsSink`]
/// supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    EmptyTerm {
        target_id: String,
    },
    DuplicateTargetId {
        id: String,
    },
    AmbiguousClaim {
        literal: String,
        location: Option<String>,
        candidates: Vec<String>,
        chosen: String,
    },
}

impl Diagnostic {
    pub fn is_warning(&self) -> bool {
        !matches!(self, Diagnostic::EmptyTerm { .. })
    }
}

pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards every diagnostic to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::EmptyTerm { target_id } => {
                tracing::debug!(target_id = %target_id, "dropping empty term");
            }
            Diagnostic::DuplicateTargetId { id } => {
                tracing::warn!(id = %id, "duplicate target id in glossary, keeping first");
            }
            Diagnostic::AmbiguousClaim {
                literal,
                location,
                candidates,
                chosen,
            } => {
                tracing::warn!(
                    literal = %literal,
                    location = location.as_deref().unwrap_or("<unknown>"),
                    candidates = ?candidates,
                    chosen = %chosen,
                    "ambiguous term, candidates tied on source distance"
                );
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}

#[derive(Debug, Default)]
pub struct CollectingSink {
    items: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.items.lock().clone()
    }

    pub fn warnings(&self) -> usize {
        self.items.lock().iter().filter(|d| d.is_warning()).count()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl DiagnosticsSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.items.lock().push(diagnostic);
    }
}
