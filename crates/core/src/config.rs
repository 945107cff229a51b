use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TermlinkError};
use crate::node::Node;

pub const DEFAULT_PLACEHOLDER: &str = "%%SHORT_NOTE%%";
pub const DEFAULT_MAX_SKIPPED_HEADING_DEPTH: u64 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPolicy {
    /// Closest owning directory wins, then smallest destination.
    #[default]
    NearestSource,
    /// Lowest target id wins.
    LowestId,
}

/// Host node taxonomy: which `type` strings mean what.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeKinds {
    pub text: Vec<String>,
    pub code: Vec<String>,
    pub link: Vec<String>,
    pub image: Vec<String>,
    pub heading: Vec<String>,
    pub component: Vec<String>,
    pub heading_depth_attr: String,
    pub component_name_attr: String,
    pub max_skipped_heading_depth: u64,
}

impl Default for NodeKinds {
    fn default() -> Self {
        Self {
            text: strings(&["text"]),
            code: strings(&["code", "inlineCode", "yaml", "toml"]),
            link: strings(&["link", "linkReference", "definition"]),
            image: strings(&["image", "imageReference"]),
            heading: strings(&["heading"]),
            component: strings(&["mdxJsxTextElement", "mdxJsxFlowElement"]),
            heading_depth_attr: "depth".to_string(),
            component_name_attr: "name".to_string(),
            max_skipped_heading_depth: DEFAULT_MAX_SKIPPED_HEADING_DEPTH,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RewriteConfig {
    pub link_element: String,
    pub short_note_element: String,
    pub element_kind: String,
    pub destination_attr: String,
    pub id_attr: String,
    pub text_attr: String,
    pub icon_attr: String,
    pub placeholder: String,
    pub scopes: Vec<String>,
    pub policy: ClaimPolicy,
    pub node_kinds: NodeKinds,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            link_element: "SmartLink".to_string(),
            short_note_element: "ShortNote".to_string(),
            element_kind: "mdxJsxTextElement".to_string(),
            destination_attr: "href".to_string(),
            id_attr: "targetId".to_string(),
            text_attr: "matchedText".to_string(),
            icon_attr: "icon".to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            scopes: Vec::new(),
            policy: ClaimPolicy::default(),
            node_kinds: NodeKinds::default(),
        }
    }
}

impl RewriteConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("link_element", &self.link_element),
            ("short_note_element", &self.short_note_element),
            ("element_kind", &self.element_kind),
            ("destination_attr", &self.destination_attr),
            ("id_attr", &self.id_attr),
            ("text_attr", &self.text_attr),
            ("icon_attr", &self.icon_attr),
            ("placeholder", &self.placeholder),
            ("node_kinds.heading_depth_attr", &self.node_kinds.heading_depth_attr),
            ("node_kinds.component_name_attr", &self.node_kinds.component_name_attr),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(TermlinkError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if self.link_element == self.short_note_element {
            return Err(TermlinkError::InvalidConfig(
                "link_element and short_note_element must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    Text,
    Code,
    Link,
    Image,
    Heading,
    Component,
    Other,
}

/// Node-kind lookup built once per rewriter.
#[derive(Debug, Clone)]
pub struct NodeClassifier {
    classes: HashMap<String, NodeClass>,
    depth_attr: String,
    name_attr: String,
    max_skipped_depth: u64,
    own_elements: [String; 2],
}

impl NodeClassifier {
    pub fn new(config: &RewriteConfig) -> Self {
        let kinds = &config.node_kinds;
        let mut classes = HashMap::new();
        // Later groups override earlier ones if a host reuses a type name.
        let groups = [
            (&kinds.component, NodeClass::Component),
            (&kinds.heading, NodeClass::Heading),
            (&kinds.image, NodeClass::Image),
            (&kinds.link, NodeClass::Link),
            (&kinds.code, NodeClass::Code),
            (&kinds.text, NodeClass::Text),
        ];
        for (names, class) in groups {
            for name in names {
                classes.insert(name.clone(), class);
            }
        }
        classes
            .entry(config.element_kind.clone())
            .or_insert(NodeClass::Component);
        Self {
            classes,
            depth_attr: kinds.heading_depth_attr.clone(),
            name_attr: kinds.component_name_attr.clone(),
            max_skipped_depth: kinds.max_skipped_heading_depth,
            own_elements: [
                config.link_element.clone(),
                config.short_note_element.clone(),
            ],
        }
    }

    pub fn class_of(&self, node: &Node) -> NodeClass {
        self.classes
            .get(node.kind.as_str())
            .copied()
            .unwrap_or(NodeClass::Other)
    }

    /// Whether the subtree under `node` must be left alone.
    pub fn is_skip_zone(&self, node: &Node) -> bool {
        match self.class_of(node) {
            NodeClass::Code | NodeClass::Link | NodeClass::Image => true,
            NodeClass::Heading => node
                .attr_u64(&self.depth_attr)
                .map(|depth| depth <= self.max_skipped_depth)
                .unwrap_or(true),
            NodeClass::Component => node
                .attr_str(&self.name_attr)
                .map(|name| self.own_elements.iter().any(|own| own == name))
                .unwrap_or(false),
            NodeClass::Text | NodeClass::Other => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RewriteConfig::from_toml_str(
            r#"
            placeholder = "%%MARK%%"
            policy = "lowest_id"
            [node_kinds]
            code = ["code"]
            "#,
        )
        .expect("parse");
        assert_eq!(config.placeholder, "%%MARK%%");
        assert_eq!(config.policy, ClaimPolicy::LowestId);
        assert_eq!(config.link_element, "SmartLink");
        assert_eq!(config.node_kinds.code, vec!["code".to_string()]);
        assert_eq!(config.node_kinds.heading_depth_attr, "depth");
    }

    #[test]
    fn rejects_empty_names() {
        let config = RewriteConfig {
            placeholder: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TermlinkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn headings_skip_up_to_level_three() {
        let classifier = NodeClassifier::new(&RewriteConfig::default());
        let h3 = Node::new("heading").with_attr("depth", 3);
        let h4 = Node::new("heading").with_attr("depth", 4);
        assert!(classifier.is_skip_zone(&h3));
        assert!(!classifier.is_skip_zone(&h4));
    }

    #[test]
    fn only_own_components_are_skipped() {
        let classifier = NodeClassifier::new(&RewriteConfig::default());
        let own = Node::new("mdxJsxTextElement").with_attr("name", "SmartLink");
        let other = Node::new("mdxJsxFlowElement").with_attr("name", "Callout");
        assert!(classifier.is_skip_zone(&own));
        assert!(!classifier.is_skip_zone(&other));
        assert_eq!(classifier.class_of(&Node::new("paragraph")), NodeClass::Other);
    }
}
