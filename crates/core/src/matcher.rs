use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::term_index::LiteralEntry;

const ROOT: usize = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Code point offsets, half-open.
    pub start: usize,
    pub end: usize,
    /// Byte offsets of the same span.
    pub byte_start: usize,
    pub byte_end: usize,
    pub matched_text: String,
    pub key: String,
    pub literal: String,
}

#[derive(Debug, Clone)]
struct Terminal {
    literal: String,
    key: String,
    len: usize,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: FxHashMap<char, usize>,
    terminals: Vec<Terminal>,
}

/// Multi-literal scanner over a code point trie.
#[derive(Debug, Clone)]
pub struct Matcher {
    nodes: Vec<TrieNode>,
    literals: usize,
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Single code point lowercase; multi-char expansions are left unfolded so
/// offsets in the folded text line up with the original.
pub fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(folded), None) => folded,
        _ => c,
    }
}

/// Folds every code point with [`fold_char`]; the key trie terminals and
/// claim buckets agree on.
pub fn fold_literal(literal: &str) -> String {
    literal.chars().map(fold_char).collect()
}

impl Matcher {
    pub fn build(entries: &[LiteralEntry]) -> Self {
        let mut nodes = vec![TrieNode::default()];
        let mut literals = 0usize;
        for entry in entries {
            if entry.literal.is_empty() || entry.key.is_empty() {
                continue;
            }
            let mut node = ROOT;
            let mut len = 0usize;
            for c in entry.literal.chars().map(fold_char) {
                len += 1;
                node = match nodes[node].children.get(&c) {
                    Some(&next) => next,
                    None => {
                        let next = nodes.len();
                        nodes.push(TrieNode::default());
                        nodes[node].children.insert(c, next);
                        next
                    }
                };
            }
            nodes[node].terminals.push(Terminal {
                literal: entry.literal.clone(),
                key: entry.key.clone(),
                len,
            });
            literals += 1;
        }
        for node in &mut nodes {
            // stable: equal lengths keep entry order
            node.terminals.sort_by(|a, b| b.len.cmp(&a.len));
        }
        Self { nodes, literals }
    }

    pub fn literal_count(&self) -> usize {
        self.literals
    }

    pub fn is_empty(&self) -> bool {
        self.literals == 0
    }

    pub fn find_all(&self, text: &str) -> Vec<Match> {
        if self.is_empty() || text.is_empty() {
            return Vec::new();
        }
        let offsets: Vec<(usize, char)> = text.char_indices().collect();
        let folded: Vec<char> = offsets.iter().map(|&(_, c)| fold_char(c)).collect();
        let n = offsets.len();
        let byte_at = |idx: usize| offsets.get(idx).map(|&(b, _)| b).unwrap_or(text.len());

        let mut out = Vec::new();
        let mut i = 0usize;
        while i < n {
            if i > 0 && is_word_char(offsets[i - 1].1) {
                i += 1;
                continue;
            }
            let mut node = ROOT;
            let mut best: Option<(usize, &Terminal)> = None;
            let mut j = i;
            while j < n {
                match self.nodes[node].children.get(&folded[j]) {
                    Some(&next) => {
                        node = next;
                        j += 1;
                        if let Some(terminal) = self.nodes[node].terminals.first() {
                            best = Some((j, terminal));
                        }
                    }
                    None => break,
                }
            }
            match best {
                Some((end, terminal)) if end >= n || !is_word_char(offsets[end].1) => {
                    let byte_start = byte_at(i);
                    let byte_end = byte_at(end);
                    out.push(Match {
                        start: i,
                        end,
                        byte_start,
                        byte_end,
                        matched_text: text[byte_start..byte_end].to_string(),
                        key: terminal.key.clone(),
                        literal: terminal.literal.clone(),
                    });
                    i = end;
                }
                _ => i += 1,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(literals: &[&str]) -> Matcher {
        let entries: Vec<LiteralEntry> = literals
            .iter()
            .map(|literal| LiteralEntry {
                literal: literal.to_string(),
                key: format!("{}::/{}::", literal.to_lowercase(), literal.to_lowercase()),
            })
            .collect();
        Matcher::build(&entries)
    }

    fn spans(matches: &[Match]) -> Vec<(usize, usize, &str)> {
        matches
            .iter()
            .map(|m| (m.start, m.end, m.matched_text.as_str()))
            .collect()
    }

    #[test]
    fn longest_literal_wins_at_same_start() {
        let m = matcher(&["Amox", "Amoxicillin"]);
        let found = m.find_all("Amoxicillin");
        assert_eq!(spans(&found), vec![(0, 11, "Amoxicillin")]);
        assert_eq!(found[0].literal, "Amoxicillin");
    }

    #[test]
    fn finds_every_non_overlapping_occurrence() {
        let m = matcher(&["Amoxi", "Amoxicillin", "Vanco"]);
        let found = m.find_all("Amoxi and Amoxicillin; Vanco. Amoxi!");
        assert_eq!(
            spans(&found),
            vec![
                (0, 5, "Amoxi"),
                (10, 21, "Amoxicillin"),
                (23, 28, "Vanco"),
                (30, 35, "Amoxi"),
            ]
        );
    }

    #[test]
    fn respects_unicode_word_boundaries() {
        let m = matcher(&["ß-Laktam"]);
        let text = "kein ß-Laktamase, aber ß-Laktam.";
        let found = m.find_all(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 23);
        assert_eq!(&text[found[0].byte_start..found[0].byte_end], "ß-Laktam");
    }

    #[test]
    fn rejects_matches_inside_words() {
        let m = matcher(&["cat"]);
        assert!(m.find_all("concatenate cats _cat cat_").is_empty());
        assert_eq!(m.find_all("(cat)").len(), 1);
    }

    #[test]
    fn matching_is_case_insensitive_and_keeps_original_text() {
        let m = matcher(&["vancomycin"]);
        let found = m.find_all("VANCOMYCIN works");
        assert_eq!(found[0].matched_text, "VANCOMYCIN");
        assert_eq!(found[0].literal, "vancomycin");
    }

    #[test]
    fn offsets_count_code_points_not_bytes() {
        let m = matcher(&["Über"]);
        let found = m.find_all("ñ Über");
        assert_eq!((found[0].start, found[0].end), (2, 6));
        assert_eq!((found[0].byte_start, found[0].byte_end), (3, 8));
    }

    #[test]
    fn works_for_non_latin_scripts() {
        let m = matcher(&["नेपाल"]);
        let found = m.find_all("म नेपाल जान्छु");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].matched_text, "नेपाल");
    }

    #[test]
    fn colliding_literals_share_a_terminal_deterministically() {
        let entries = vec![
            LiteralEntry {
                literal: "Amoxi".into(),
                key: "a-amox::/a::".into(),
            },
            LiteralEntry {
                literal: "amoxi".into(),
                key: "z-amox::/z::".into(),
            },
        ];
        let m = Matcher::build(&entries);
        for _ in 0..3 {
            assert_eq!(m.find_all("amoxi")[0].key, "a-amox::/a::");
        }
    }

    #[test]
    fn skips_malformed_entries() {
        let entries = vec![
            LiteralEntry {
                literal: String::new(),
                key: "a::/a::".into(),
            },
            LiteralEntry {
                literal: "x".into(),
                key: String::new(),
            },
        ];
        let m = Matcher::build(&entries);
        assert!(m.is_empty());
        assert!(m.find_all("x").is_empty());
    }
}
