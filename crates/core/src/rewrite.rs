use serde::Serialize;

use crate::config::{NodeClass, NodeClassifier, RewriteConfig};
use crate::diagnostics::DiagnosticsSink;
use crate::disambiguate::Disambiguator;
use crate::glossary::TargetRecord;
use crate::matcher::{Match, Matcher};
use crate::node::{Node, Position};
use crate::term_index::{Claim, TermIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    SkipSubtree,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub links: usize,
    pub suppressed: usize,
    pub short_notes: usize,
    pub rewritten_text_nodes: usize,
}

/// Replacement sequence for one text node. Adjacent text pieces are merged.
///
/// Offsets passed in are byte offsets into the host's value.
struct Splice<'k> {
    host: &'k Node,
    verbatim: bool,
    nodes: Vec<Node>,
    trailing_text: bool,
}

impl<'k> Splice<'k> {
    fn new(host: &'k Node) -> Self {
        let len = host.value.as_deref().map_or(0, str::len);
        let verbatim = host
            .position
            .is_some_and(|p| p.end.checked_sub(p.start) == Some(len));
        Self {
            host,
            verbatim,
            nodes: Vec::new(),
            trailing_text: false,
        }
    }

    /// Source span of `start..end`. When the host value is not a verbatim
    /// slice of the source (escapes, merged soft breaks) the whole host span
    /// is used.
    fn span(&self, start: usize, end: usize) -> Option<Position> {
        let host = self.host.position?;
        if !self.verbatim {
            return Some(host);
        }
        Some(Position {
            start: host.start + start,
            end: host.start + end,
        })
    }

    fn push_text(&mut self, text: &str, start: usize) {
        if text.is_empty() {
            return;
        }
        let span = self.span(start, start + text.len());
        if self.trailing_text {
            if let Some(last) = self.nodes.last_mut() {
                if let Some(value) = last.value.as_mut() {
                    value.push_str(text);
                }
                if let (Some(position), Some(span)) = (last.position.as_mut(), span) {
                    position.end = span.end;
                }
                return;
            }
        }
        let mut node = Node::leaf(self.host.kind.as_str(), text);
        node.attributes = self.host.attributes.clone();
        node.position = span;
        self.nodes.push(node);
        self.trailing_text = true;
    }

    fn push_element(&mut self, mut node: Node, start: usize, end: usize) {
        node.position = self.span(start, end);
        if let Some(child) = node.children.first_mut() {
            child.position = node.position;
        }
        self.nodes.push(node);
        self.trailing_text = false;
    }
}

/// Rewrites one document tree. Build a fresh rewriter per document.
pub struct TreeRewriter<'a> {
    config: &'a RewriteConfig,
    classifier: NodeClassifier,
    matcher: &'a Matcher,
    disambiguator: Disambiguator<'a>,
    current: Option<&'a TargetRecord>,
    stats: RewriteStats,
}

impl<'a> TreeRewriter<'a> {
    pub fn new(
        config: &'a RewriteConfig,
        index: &'a TermIndex,
        matcher: &'a Matcher,
        location: Option<&'a str>,
        current: Option<&'a TargetRecord>,
        sink: &'a dyn DiagnosticsSink,
    ) -> Self {
        Self {
            config,
            classifier: NodeClassifier::new(config),
            matcher,
            disambiguator: Disambiguator::new(index, config.policy, location, sink),
            current,
            stats: RewriteStats::default(),
        }
    }

    pub fn stats(&self) -> RewriteStats {
        self.stats
    }

    pub fn current(&self) -> Option<&'a TargetRecord> {
        self.current
    }

    /// Rewrites in place. A bare text root has no parent to splice into and
    /// is left untouched.
    pub fn rewrite(&mut self, mut root: Node) -> Node {
        self.walk(&mut root);
        root
    }

    pub fn decide(&self, node: &Node) -> Visit {
        if self.classifier.is_skip_zone(node) {
            Visit::SkipSubtree
        } else {
            Visit::Descend
        }
    }

    fn walk(&mut self, node: &mut Node) {
        if self.decide(node) == Visit::SkipSubtree {
            return;
        }
        let mut idx = 0;
        while idx < node.children.len() {
            let child = &node.children[idx];
            if self.classifier.class_of(child) != NodeClass::Text {
                self.walk(&mut node.children[idx]);
                idx += 1;
                continue;
            }
            match self.rewrite_text(child) {
                Some(replacement) => {
                    let len = replacement.len();
                    node.children.splice(idx..idx + 1, replacement);
                    self.stats.rewritten_text_nodes += 1;
                    idx += len;
                }
                None => idx += 1,
            }
        }
    }

    /// Returns the replacement sequence, or `None` when the node stays as is.
    fn rewrite_text(&mut self, node: &Node) -> Option<Vec<Node>> {
        let value = node.value.as_deref()?;
        let placeholder = self.config.placeholder.as_str();
        let mut splice = Splice::new(node);
        if !value.contains(placeholder) {
            return self.link_segment(value, 0, &mut splice).then_some(splice.nodes);
        }
        let mut changed = false;
        let mut offset = 0usize;
        for (idx, segment) in value.split(placeholder).enumerate() {
            if idx > 0 {
                let start = offset - placeholder.len();
                match self.current {
                    Some(current) => {
                        splice.push_element(self.short_note(current), start, offset);
                        self.stats.short_notes += 1;
                        changed = true;
                    }
                    None => splice.push_text(placeholder, start),
                }
            }
            changed |= self.link_segment(segment, offset, &mut splice);
            offset += segment.len() + placeholder.len();
        }
        changed.then_some(splice.nodes)
    }

    /// Appends `text`, found at byte `base` of the host value, to `splice`
    /// with links spliced in; true if any link was emitted.
    fn link_segment(&mut self, text: &str, base: usize, splice: &mut Splice<'_>) -> bool {
        let mut cursor = 0usize;
        let mut linked = false;
        for found in self.matcher.find_all(text) {
            let Some(claim) = self.disambiguator.resolve(&found) else {
                continue;
            };
            if self.current.is_some_and(|current| current.id == claim.id) {
                self.stats.suppressed += 1;
                continue;
            }
            splice.push_text(&text[cursor..found.byte_start], base + cursor);
            let link = self.link(&found, &claim, &splice.host.kind);
            splice.push_element(link, base + found.byte_start, base + found.byte_end);
            cursor = found.byte_end;
            linked = true;
            self.stats.links += 1;
        }
        splice.push_text(&text[cursor..], base + cursor);
        linked
    }

    fn element(&self, name: &str) -> Node {
        Node::new(self.config.element_kind.as_str())
            .with_attr(self.config.node_kinds.component_name_attr.as_str(), name)
    }

    fn link(&self, found: &Match, claim: &Claim, text_kind: &str) -> Node {
        let mut node = self
            .element(&self.config.link_element)
            .with_attr(self.config.destination_attr.as_str(), claim.destination.as_str())
            .with_attr(self.config.id_attr.as_str(), claim.id.as_str())
            .with_attr(self.config.text_attr.as_str(), found.matched_text.as_str());
        if let Some(icon) = &claim.icon {
            node = node.with_attr(self.config.icon_attr.as_str(), icon.as_str());
        }
        node.children
            .push(Node::leaf(text_kind, found.matched_text.as_str()));
        node
    }

    fn short_note(&self, current: &TargetRecord) -> Node {
        self.element(&self.config.short_note_element)
            .with_attr(self.config.id_attr.as_str(), current.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullSink;

    fn fixture() -> (TermIndex, Matcher) {
        let targets = vec![
            TargetRecord::new("a", "/a").with_terms(["A-term"]),
            TargetRecord::new("b", "/b").with_icon("star").with_terms(["B-term"]),
        ];
        let index = TermIndex::build(&targets, &[], &NullSink);
        let matcher = Matcher::build(&index.entries);
        (index, matcher)
    }

    fn paragraph(text: &str) -> Node {
        Node::parent("root", vec![Node::parent("paragraph", vec![Node::text(text)])])
    }

    #[test]
    fn splices_links_between_text_pieces() {
        let (index, matcher) = fixture();
        let config = RewriteConfig::default();
        let mut rewriter = TreeRewriter::new(&config, &index, &matcher, None, None, &NullSink);
        let out = rewriter.rewrite(paragraph("see B-term, then A-term."));
        let children = &out.children[0].children;
        assert_eq!(children.len(), 5);
        assert_eq!(children[0].value.as_deref(), Some("see "));
        assert_eq!(children[1].attr_str("name"), Some("SmartLink"));
        assert_eq!(children[1].attr_str("href"), Some("/b"));
        assert_eq!(children[1].attr_str("icon"), Some("star"));
        assert_eq!(children[1].attr_str("matchedText"), Some("B-term"));
        assert_eq!(children[2].value.as_deref(), Some(", then "));
        assert_eq!(children[3].attr_str("targetId"), Some("a"));
        assert!(children[3].attr_str("icon").is_none());
        assert_eq!(children[4].value.as_deref(), Some("."));
        assert_eq!(out.text_content(), "see B-term, then A-term.");
        assert_eq!(rewriter.stats().links, 2);
    }

    #[test]
    fn suppressed_matches_merge_into_surrounding_text() {
        let (index, matcher) = fixture();
        let config = RewriteConfig::default();
        let current = index.targets[0].clone();
        let mut rewriter =
            TreeRewriter::new(&config, &index, &matcher, None, Some(&current), &NullSink);
        let out = rewriter.rewrite(paragraph("A-term and B-term"));
        let children = &out.children[0].children;
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].value.as_deref(), Some("A-term and "));
        assert_eq!(children[1].attr_str("targetId"), Some("b"));
        assert_eq!(rewriter.stats().suppressed, 1);
    }

    #[test]
    fn emitted_text_keeps_host_text_kind() {
        let (index, matcher) = fixture();
        let mut config = RewriteConfig::default();
        config.node_kinds.text.push("str".to_string());
        let mut rewriter = TreeRewriter::new(&config, &index, &matcher, None, None, &NullSink);
        let tree = Node::parent("root", vec![Node::leaf("str", "x B-term y")]);
        let out = rewriter.rewrite(tree);
        assert_eq!(out.children[0].kind, "str");
        assert_eq!(out.children[2].kind, "str");
    }

    #[test]
    fn pieces_carry_source_spans() {
        let (index, matcher) = fixture();
        let config = RewriteConfig::default();
        let mut rewriter = TreeRewriter::new(&config, &index, &matcher, None, None, &NullSink);
        let host = Node::text("see B-term, then")
            .with_attr("data", "x")
            .with_position(Position { start: 10, end: 26 });
        let out = rewriter.rewrite(Node::parent("root", vec![host]));
        let spans: Vec<Option<(usize, usize)>> = out
            .children
            .iter()
            .map(|n| n.position.map(|p| (p.start, p.end)))
            .collect();
        assert_eq!(spans, vec![Some((10, 14)), Some((14, 20)), Some((20, 26))]);
        assert_eq!(out.children[1].children[0].position, out.children[1].position);
        assert_eq!(out.children[0].attr_str("data"), Some("x"));
        assert_eq!(out.children[2].attr_str("data"), Some("x"));
    }

    #[test]
    fn non_verbatim_hosts_lend_their_whole_span() {
        let (index, matcher) = fixture();
        let config = RewriteConfig::default();
        let mut rewriter = TreeRewriter::new(&config, &index, &matcher, None, None, &NullSink);
        let span = Position { start: 3, end: 9 };
        let host = Node::text("x &amp; B-term").with_position(span);
        let out = rewriter.rewrite(Node::parent("root", vec![host]));
        assert_eq!(out.children.len(), 2);
        assert!(out.children.iter().all(|n| n.position == Some(span)));
    }

    #[test]
    fn short_note_spans_the_placeholder() {
        let (index, matcher) = fixture();
        let config = RewriteConfig::default();
        let current = index.targets[0].clone();
        let mut rewriter =
            TreeRewriter::new(&config, &index, &matcher, None, Some(&current), &NullSink);
        let text = format!("ab{}cd", config.placeholder);
        let end = text.len();
        let host = Node::text(text.clone()).with_position(Position { start: 0, end });
        let out = rewriter.rewrite(Node::parent("root", vec![host]));
        assert_eq!(out.children.len(), 3);
        assert_eq!(
            out.children[1].position,
            Some(Position { start: 2, end: end - 2 })
        );
        assert_eq!(out.children[2].position, Some(Position { start: end - 2, end }));
    }

    #[test]
    fn placeholder_without_current_target_stays_literal() {
        let (index, matcher) = fixture();
        let config = RewriteConfig::default();
        let mut rewriter = TreeRewriter::new(&config, &index, &matcher, None, None, &NullSink);
        let text = format!("x {} B-term", config.placeholder);
        let out = rewriter.rewrite(paragraph(&text));
        let children = &out.children[0].children;
        assert_eq!(children[0].value.as_deref(), Some(format!("x {} ", config.placeholder).as_str()));
        assert_eq!(children[1].attr_str("targetId"), Some("b"));
        assert_eq!(rewriter.stats().short_notes, 0);
    }

    #[test]
    fn decide_skips_configured_zones() {
        let (index, matcher) = fixture();
        let config = RewriteConfig::default();
        let rewriter = TreeRewriter::new(&config, &index, &matcher, None, None, &NullSink);
        assert_eq!(rewriter.decide(&Node::new("inlineCode")), Visit::SkipSubtree);
        assert_eq!(rewriter.decide(&Node::new("paragraph")), Visit::Descend);
        assert_eq!(
            rewriter.decide(&Node::new("heading").with_attr("depth", 1)),
            Visit::SkipSubtree
        );
    }
}
