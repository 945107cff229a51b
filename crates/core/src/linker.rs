use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CompiledIndex, TargetIndexCache};
use crate::config::RewriteConfig;
use crate::current::resolve_current;
use crate::diagnostics::DiagnosticsSink;
use crate::error::{Result, TermlinkError};
use crate::glossary::{DocumentIdentity, GlossaryProvider};
use crate::matcher::Match;
use crate::node::Node;
use crate::rewrite::{RewriteStats, TreeRewriter};

#[derive(Debug, Clone, Serialize)]
pub struct RewriteOutcome {
    pub tree: Node,
    pub current_target: Option<String>,
    pub stats: RewriteStats,
}

/// Entry point for a batch of documents: one config, one provider, one
/// shared index cache.
pub struct Linker {
    config: RewriteConfig,
    provider: Option<Arc<dyn GlossaryProvider>>,
    cache: TargetIndexCache,
}

impl Linker {
    pub fn new(config: RewriteConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider: None,
            cache: TargetIndexCache::new(),
        })
    }

    pub fn with_provider(mut self, provider: Arc<dyn GlossaryProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn set_provider(&mut self, provider: Arc<dyn GlossaryProvider>) {
        self.provider = Some(provider);
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    pub fn cache(&self) -> &TargetIndexCache {
        &self.cache
    }

    fn provider(&self, identity: &DocumentIdentity) -> Result<&dyn GlossaryProvider> {
        self.provider
            .as_deref()
            .ok_or_else(|| TermlinkError::MissingGlossaryProvider(identity.location.clone()))
    }

    pub fn compiled(&self, sink: &dyn DiagnosticsSink) -> Result<Arc<CompiledIndex>> {
        let provider = self.provider(&DocumentIdentity::default())?;
        Ok(self.cache.get_or_build(provider, &self.config.scopes, sink))
    }

    pub fn rewrite(
        &self,
        tree: Node,
        identity: &DocumentIdentity,
        sink: &dyn DiagnosticsSink,
    ) -> Result<Node> {
        Ok(self.rewrite_document(tree, identity, sink)?.tree)
    }

    pub fn rewrite_document(
        &self,
        tree: Node,
        identity: &DocumentIdentity,
        sink: &dyn DiagnosticsSink,
    ) -> Result<RewriteOutcome> {
        let provider = self.provider(identity)?;
        let compiled = self.cache.get_or_build(provider, &self.config.scopes, sink);
        let location = provider.document_location(identity);
        let current = resolve_current(&compiled.index.targets, location.as_deref(), identity);
        tracing::trace!(
            location = location.as_deref().unwrap_or("<none>"),
            current = current.map(|t| t.id.as_str()).unwrap_or("<none>"),
            "rewriting document"
        );
        let mut rewriter = TreeRewriter::new(
            &self.config,
            &compiled.index,
            &compiled.matcher,
            location.as_deref(),
            current,
            sink,
        );
        let tree = rewriter.rewrite(tree);
        Ok(RewriteOutcome {
            tree,
            current_target: current.map(|t| t.id.clone()),
            stats: rewriter.stats(),
        })
    }

    /// Raw matcher output for `text`, before disambiguation.
    pub fn scan(&self, text: &str, sink: &dyn DiagnosticsSink) -> Result<Vec<Match>> {
        Ok(self.compiled(sink)?.matcher.find_all(text))
    }
}
