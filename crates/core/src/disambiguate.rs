use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::config::ClaimPolicy;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::matcher::{fold_literal, Match};
use crate::term_index::{Claim, TermIndex};

/// Picks one target for a matched literal.
///
/// One instance lives for a single rewrite call so tie warnings are reported
/// once per literal.
pub struct Disambiguator<'a> {
    index: &'a TermIndex,
    policy: ClaimPolicy,
    location: Option<&'a str>,
    sink: &'a dyn DiagnosticsSink,
    warned: Mutex<FxHashSet<String>>,
}

impl<'a> Disambiguator<'a> {
    pub fn new(
        index: &'a TermIndex,
        policy: ClaimPolicy,
        location: Option<&'a str>,
        sink: &'a dyn DiagnosticsSink,
    ) -> Self {
        Self {
            index,
            policy,
            location,
            sink,
            warned: Mutex::new(FxHashSet::default()),
        }
    }

    pub fn resolve(&self, found: &Match) -> Option<Claim> {
        let default = self.index.claim_for_key(&found.key);
        let claimants = self.index.claimants(&found.literal);
        if claimants.len() <= 1 {
            return default.or_else(|| claimants.first().cloned());
        }
        match self.policy {
            ClaimPolicy::LowestId => claimants.first().cloned(),
            ClaimPolicy::NearestSource => Some(self.nearest(&found.literal, claimants)),
        }
    }

    fn nearest(&self, literal: &str, claimants: &[Claim]) -> Claim {
        let Some(location) = self.location else {
            return claimants[0].clone();
        };
        let scored: Vec<(usize, &Claim)> = claimants
            .iter()
            .filter(|claim| !claim.source_location.is_empty())
            .map(|claim| (path_distance(location, &claim.source_location), claim))
            .collect();
        let Some(best) = scored.iter().map(|(distance, _)| *distance).min() else {
            return claimants[0].clone();
        };
        let mut tied: Vec<&Claim> = scored
            .iter()
            .filter(|(distance, _)| *distance == best)
            .map(|(_, claim)| *claim)
            .collect();
        tied.sort_by(|a, b| a.destination.cmp(&b.destination).then_with(|| a.id.cmp(&b.id)));
        let chosen = tied[0].clone();
        if tied.len() > 1 && self.warned.lock().insert(fold_literal(literal)) {
            self.sink.report(Diagnostic::AmbiguousClaim {
                literal: literal.to_string(),
                location: Some(location.to_string()),
                candidates: tied.iter().map(|claim| claim.id.clone()).collect(),
                chosen: chosen.id.clone(),
            });
        }
        chosen
    }
}

fn directory_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    segments.pop();
    segments
}

/// Levels up from `from`'s directory to the common ancestor plus levels down
/// to `to`'s directory.
pub fn path_distance(from: &str, to: &str) -> usize {
    let from_dir = directory_segments(from);
    let to_dir = directory_segments(to);
    let common = from_dir
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();
    (from_dir.len() - common) + (to_dir.len() - common)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::glossary::TargetRecord;
    use crate::matcher::Matcher;

    fn index(targets: Vec<TargetRecord>) -> TermIndex {
        TermIndex::build(&targets, &[], &CollectingSink::new())
    }

    fn first_match(index: &TermIndex, text: &str) -> Match {
        Matcher::build(&index.entries).find_all(text).remove(0)
    }

    #[test]
    fn distance_counts_up_and_down() {
        assert_eq!(path_distance("a/b/doc.md", "a/b/other.md"), 0);
        assert_eq!(path_distance("a/b/doc.md", "a/c/other.md"), 2);
        assert_eq!(path_distance("a/doc.md", "a/b/c/other.md"), 2);
        assert_eq!(path_distance("./x/doc.md", "y/other.md"), 2);
        assert_eq!(path_distance("doc.md", "other.md"), 0);
    }

    #[test]
    fn lowest_id_breaks_shared_claims() {
        let idx = index(vec![
            TargetRecord::new("z-amox", "/z").with_terms(["Amoxi"]),
            TargetRecord::new("a-amox", "/a").with_terms(["Amoxi"]),
        ]);
        let sink = CollectingSink::new();
        let d = Disambiguator::new(&idx, ClaimPolicy::LowestId, Some("q/doc.md"), &sink);
        let found = first_match(&idx, "Amoxi");
        assert_eq!(d.resolve(&found).map(|c| c.id), Some("a-amox".to_string()));
    }

    #[test]
    fn nearest_source_prefers_closest_directory() {
        let idx = index(vec![
            TargetRecord::new("a", "/a")
                .with_terms(["dose"])
                .with_source("peds/amox.md"),
            TargetRecord::new("b", "/b")
                .with_terms(["dose"])
                .with_source("adult/drugs/amox.md"),
        ]);
        let sink = CollectingSink::new();
        let d = Disambiguator::new(
            &idx,
            ClaimPolicy::NearestSource,
            Some("adult/drugs/vanco.md"),
            &sink,
        );
        let found = first_match(&idx, "dose");
        assert_eq!(d.resolve(&found).map(|c| c.id), Some("b".to_string()));
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn tie_falls_back_to_destination_and_warns_once() {
        let idx = index(vec![
            TargetRecord::new("a", "/zeta")
                .with_terms(["dose"])
                .with_source("x/one.md"),
            TargetRecord::new("b", "/alpha")
                .with_terms(["dose"])
                .with_source("x/two.md"),
        ]);
        let sink = CollectingSink::new();
        let d = Disambiguator::new(&idx, ClaimPolicy::NearestSource, Some("x/doc.md"), &sink);
        let found = first_match(&idx, "dose");
        assert_eq!(d.resolve(&found).map(|c| c.id), Some("b".to_string()));
        assert_eq!(d.resolve(&found).map(|c| c.id), Some("b".to_string()));
        let diagnostics = sink.snapshot();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            &diagnostics[0],
            Diagnostic::AmbiguousClaim { chosen, candidates, .. }
                if chosen == "b" && candidates.len() == 2
        ));
    }

    #[test]
    fn missing_locations_fall_back_to_lowest_id() {
        let idx = index(vec![
            TargetRecord::new("z", "/z").with_terms(["dose"]),
            TargetRecord::new("a", "/a").with_terms(["dose"]),
        ]);
        let sink = CollectingSink::new();
        let found = first_match(&idx, "dose");
        let without_location = Disambiguator::new(&idx, ClaimPolicy::NearestSource, None, &sink);
        assert_eq!(without_location.resolve(&found).map(|c| c.id), Some("a".into()));
        let without_sources =
            Disambiguator::new(&idx, ClaimPolicy::NearestSource, Some("d/doc.md"), &sink);
        assert_eq!(without_sources.resolve(&found).map(|c| c.id), Some("a".into()));
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn lowest_id_applies_across_final_sigma_spellings() {
        let idx = index(vec![
            TargetRecord::new("z", "/z").with_terms(["ΟΔΟΣ"]),
            TargetRecord::new("a", "/a").with_terms(["οδοσ"]),
        ]);
        let sink = CollectingSink::new();
        let d = Disambiguator::new(&idx, ClaimPolicy::LowestId, None, &sink);
        let found = first_match(&idx, "οδοσ");
        assert_eq!(d.resolve(&found).map(|c| c.id), Some("a".to_string()));
    }

    #[test]
    fn single_claim_uses_match_key() {
        let idx = index(vec![TargetRecord::new("v", "/v")
            .with_icon("pill")
            .with_terms(["Vanco"])]);
        let sink = CollectingSink::new();
        let d = Disambiguator::new(&idx, ClaimPolicy::NearestSource, None, &sink);
        let claim = d.resolve(&first_match(&idx, "vanco")).expect("claim");
        assert_eq!(claim.destination, "/v");
        assert_eq!(claim.icon.as_deref(), Some("pill"));
    }
}
