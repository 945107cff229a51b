mod cache;
mod config;
mod current;
mod diagnostics;
mod disambiguate;
mod error;
mod glossary;
mod linker;
pub mod markdown;
mod matcher;
mod node;
mod rewrite;
mod term_index;

pub use cache::{CompiledIndex, TargetIndexCache};
pub use config::{ClaimPolicy, NodeClass, NodeClassifier, NodeKinds, RewriteConfig, DEFAULT_PLACEHOLDER};
pub use current::{locations_match, resolve_current};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticsSink, NullSink, TracingSink};
pub use disambiguate::{path_distance, Disambiguator};
pub use error::{Result, TermlinkError};
pub use glossary::{snapshot_signature, DocumentIdentity, GlossaryProvider, StaticGlossary, TargetRecord};
pub use linker::{Linker, RewriteOutcome};
pub use matcher::{fold_char, fold_literal, is_word_char, Match, Matcher};
pub use node::{Node, Position};
pub use rewrite::{RewriteStats, TreeRewriter, Visit};
pub use term_index::{target_key, Claim, ClaimSet, LiteralEntry, TermIndex};
