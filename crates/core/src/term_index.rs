use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::glossary::TargetRecord;
use crate::matcher::fold_literal;

pub const KEY_SEPARATOR: &str = "::";

/// A literal and the target it was declared on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiteralEntry {
    pub literal: String,
    pub key: String,
}

/// A candidate target for a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub id: String,
    pub destination: String,
    pub icon: Option<String>,
    pub source_location: String,
}

impl Claim {
    fn from_target(target: &TargetRecord) -> Self {
        Self {
            id: target.id.clone(),
            destination: target.destination.clone(),
            icon: target.icon.clone(),
            source_location: target.source_location.clone(),
        }
    }

    /// Decomposes an `id::destination::icon` key. The destination may itself
    /// contain the separator; the id and icon may not.
    pub fn from_key(key: &str) -> Option<Self> {
        let (id, rest) = key.split_once(KEY_SEPARATOR)?;
        let (destination, icon) = rest.rsplit_once(KEY_SEPARATOR)?;
        Some(Self {
            id: id.to_string(),
            destination: destination.to_string(),
            icon: if icon.is_empty() {
                None
            } else {
                Some(icon.to_string())
            },
            source_location: String::new(),
        })
    }
}

pub fn target_key(target: &TargetRecord) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        target.id,
        target.destination,
        target.icon.as_deref().unwrap_or(""),
        sep = KEY_SEPARATOR
    )
}

/// Folded literal -> candidates ordered by id.
pub type ClaimSet = FxHashMap<String, Vec<Claim>>;

#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    pub entries: Vec<LiteralEntry>,
    pub claims: ClaimSet,
    pub targets: Vec<TargetRecord>,
    by_key: FxHashMap<String, Claim>,
}

impl TermIndex {
    /// Flattens `targets` into literal entries, restricted to `scopes` when it
    /// is non-empty.
    pub fn build(targets: &[TargetRecord], scopes: &[String], sink: &dyn DiagnosticsSink) -> Self {
        let allowed: FxHashSet<&str> = scopes.iter().map(String::as_str).collect();
        let mut seen_ids = FxHashSet::default();
        let mut seen_literals = FxHashSet::default();
        let mut seen_claims = FxHashSet::default();
        let mut index = TermIndex::default();

        for target in targets {
            if !allowed.is_empty()
                && !target
                    .scope
                    .as_deref()
                    .map(|scope| allowed.contains(scope))
                    .unwrap_or(false)
            {
                continue;
            }
            if !seen_ids.insert(target.id.clone()) {
                sink.report(Diagnostic::DuplicateTargetId {
                    id: target.id.clone(),
                });
                continue;
            }
            let key = target_key(target);
            let claim = Claim::from_target(target);
            index.by_key.insert(key.clone(), claim.clone());
            index.targets.push(target.clone());

            for raw in &target.terms {
                let literal = raw.trim();
                if literal.is_empty() {
                    sink.report(Diagnostic::EmptyTerm {
                        target_id: target.id.clone(),
                    });
                    continue;
                }
                let folded = fold_literal(literal);
                if seen_literals.insert((key.clone(), folded.clone())) {
                    index.entries.push(LiteralEntry {
                        literal: literal.to_string(),
                        key: key.clone(),
                    });
                }
                if seen_claims.insert((folded.clone(), target.id.clone())) {
                    index.claims.entry(folded).or_default().push(claim.clone());
                }
            }
        }

        index.entries.sort_by(|a, b| {
            b.literal
                .chars()
                .count()
                .cmp(&a.literal.chars().count())
                .then_with(|| a.literal.cmp(&b.literal))
                .then_with(|| a.key.cmp(&b.key))
        });
        for bucket in index.claims.values_mut() {
            bucket.sort_by(|a, b| a.id.cmp(&b.id));
        }
        index
    }

    pub fn claim_for_key(&self, key: &str) -> Option<Claim> {
        self.by_key.get(key).cloned().or_else(|| Claim::from_key(key))
    }

    pub fn claimants(&self, literal: &str) -> &[Claim] {
        self.claims
            .get(&fold_literal(literal))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
