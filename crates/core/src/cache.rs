use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::diagnostics::DiagnosticsSink;
use crate::glossary::{snapshot_signature, GlossaryProvider};
use crate::matcher::Matcher;
use crate::term_index::TermIndex;

/// Immutable, shareable result of indexing one glossary snapshot.
#[derive(Debug)]
pub struct CompiledIndex {
    pub signature: String,
    pub scopes: Vec<String>,
    pub index: TermIndex,
    pub matcher: Matcher,
}

impl CompiledIndex {
    pub fn build(
        provider: &dyn GlossaryProvider,
        scopes: &[String],
        signature: String,
        sink: &dyn DiagnosticsSink,
    ) -> Self {
        let index = TermIndex::build(provider.all_targets(), scopes, sink);
        let matcher = Matcher::build(&index.entries);
        Self {
            signature,
            scopes: scopes.to_vec(),
            index,
            matcher,
        }
    }
}

fn normalize_scopes(scopes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = scopes
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Compiled indexes keyed by scope filter, rebuilt when the snapshot
/// signature changes.
///
/// Rebuilds happen outside the lock; the finished index is published with a
/// single write, so readers only ever see complete indexes.
#[derive(Debug, Default)]
pub struct TargetIndexCache {
    slots: RwLock<HashMap<Vec<String>, Arc<CompiledIndex>>>,
}

impl TargetIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &self,
        provider: &dyn GlossaryProvider,
        scopes: &[String],
        sink: &dyn DiagnosticsSink,
    ) -> Arc<CompiledIndex> {
        let scopes = normalize_scopes(scopes);
        let signature = provider
            .signature()
            .unwrap_or_else(|| snapshot_signature(provider.all_targets()));

        if let Some(hit) = self.slots.read().get(&scopes) {
            if hit.signature == signature {
                tracing::trace!(scopes = ?scopes, "target index cache hit");
                return Arc::clone(hit);
            }
        }

        let built = Arc::new(CompiledIndex::build(provider, &scopes, signature, sink));
        tracing::debug!(
            scopes = ?scopes,
            literals = built.matcher.literal_count(),
            targets = built.index.targets.len(),
            "rebuilt target index"
        );
        let mut slots = self.slots.write();
        // Another worker may have published the same snapshot meanwhile.
        if let Some(existing) = slots.get(&scopes) {
            if existing.signature == built.signature {
                return Arc::clone(existing);
            }
        }
        slots.insert(scopes, Arc::clone(&built));
        built
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    pub fn clear(&self) {
        self.slots.write().clear();
    }
}
