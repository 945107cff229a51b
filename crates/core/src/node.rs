use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Byte offsets into the source the node was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: usize,
    pub end: usize,
}

/// Generic tagged document node (`{type, children?, value?, attributes?, position?}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            children: Vec::new(),
            value: None,
            attributes: IndexMap::new(),
            position: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        let mut node = Self::new("text");
        node.value = Some(value.into());
        node
    }

    pub fn parent(kind: impl Into<String>, children: Vec<Node>) -> Self {
        let mut node = Self::new(kind);
        node.children = children;
        node
    }

    pub fn leaf(kind: impl Into<String>, value: impl Into<String>) -> Self {
        let mut node = Self::new(kind);
        node.value = Some(value.into());
        node
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn attr_u64(&self, name: &str) -> Option<u64> {
        self.attributes.get(name).and_then(Value::as_u64)
    }

    /// Concatenated `value` of every descendant (including self).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Depth-first pre-order iterator over the subtree rooted at `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

fn collect_text(node: &Node, out: &mut String) {
    if let Some(value) = &node.value {
        out.push_str(value);
    }
    for child in &node.children {
        collect_text(child, out);
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
