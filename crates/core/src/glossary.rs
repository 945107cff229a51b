use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TermlinkError};

/// One linkable page and the surface forms that should point at it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    pub id: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub source_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TargetRecord {
    pub fn new(id: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_source(mut self, source_location: impl Into<String>) -> Self {
        self.source_location = source_location.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// What is known about the document being rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIdentity {
    pub location: Option<String>,
    pub id: Option<String>,
    pub slug: Option<String>,
}

impl DocumentIdentity {
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

pub trait GlossaryProvider: Send + Sync {
    fn all_targets(&self) -> &[TargetRecord];

    /// Resolves a document to the location used for self-reference and
    /// source-distance comparisons.
    fn document_location(&self, document: &DocumentIdentity) -> Option<String> {
        document.location.clone()
    }

    /// Opaque signature of the current snapshot. `None` lets the cache hash
    /// the targets itself.
    fn signature(&self) -> Option<String> {
        None
    }
}

pub fn snapshot_signature(targets: &[TargetRecord]) -> String {
    let mut hasher = blake3::Hasher::new();
    for target in targets {
        for field in [
            target.id.as_str(),
            target.destination.as_str(),
            target.icon.as_deref().unwrap_or(""),
            target.source_location.as_str(),
            target.scope.as_deref().unwrap_or(""),
        ] {
            hasher.update(field.as_bytes());
            hasher.update(&[0x1f]);
        }
        for term in &target.terms {
            hasher.update(term.as_bytes());
            hasher.update(&[0x1e]);
        }
        hasher.update(&[0x1d]);
    }
    hasher.finalize().to_hex().to_string()
}

/// In-memory glossary snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticGlossary {
    targets: Vec<TargetRecord>,
    signature: String,
    root: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlGlossary {
    #[serde(default, rename = "target")]
    targets: Vec<TargetRecord>,
}

impl StaticGlossary {
    pub fn new(targets: Vec<TargetRecord>) -> Self {
        let signature = snapshot_signature(&targets);
        Self {
            targets,
            signature,
            root: None,
        }
    }

    /// Strips `root` from document locations before they are compared with
    /// target source locations.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let targets: Vec<TargetRecord> = serde_json::from_str(raw)?;
        Ok(Self::new(targets))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let parsed: TomlGlossary = toml::from_str(raw)?;
        Ok(Self::new(parsed.targets))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            Some("toml") => Self::from_toml_str(&raw),
            other => Err(TermlinkError::InvalidConfig(format!(
                "unsupported glossary format {:?} for {}",
                other,
                path.display()
            ))),
        }
    }

    pub fn targets(&self) -> &[TargetRecord] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl GlossaryProvider for StaticGlossary {
    fn all_targets(&self) -> &[TargetRecord] {
        &self.targets
    }

    fn document_location(&self, document: &DocumentIdentity) -> Option<String> {
        let location = document.location.as_deref()?;
        let normalized = location.replace('\\', "/");
        match self.root.as_deref() {
            Some(root) => {
                let root = root.replace('\\', "/");
                let root = root.trim_end_matches('/');
                let stripped = normalized
                    .strip_prefix(root)
                    .map(|rest| rest.trim_start_matches('/'))
                    .unwrap_or(normalized.as_str());
                Some(stripped.to_string())
            }
            None => Some(normalized),
        }
    }

    fn signature(&self) -> Option<String> {
        Some(self.signature.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_with_camel_case_fields() {
        let raw = r#"[
            {"id": "amox", "destination": "/drugs/amox", "terms": ["Amoxi"],
             "sourceLocation": "drugs/amox.md", "scope": "drugs"}
        ]"#;
        let glossary = StaticGlossary::from_json_str(raw).expect("parse");
        let target = &glossary.targets()[0];
        assert_eq!(target.source_location, "drugs/amox.md");
        assert_eq!(target.scope.as_deref(), Some("drugs"));
        assert!(target.icon.is_none());
    }

    #[test]
    fn parses_toml_target_tables() {
        let raw = r#"
            [[target]]
            id = "vanco"
            destination = "/drugs/vanco"
            icon = "pill"
            terms = ["Vanco", "Vancomycin"]
        "#;
        let glossary = StaticGlossary::from_toml_str(raw).expect("parse");
        assert_eq!(glossary.len(), 1);
        assert_eq!(glossary.targets()[0].terms.len(), 2);
    }

    #[test]
    fn signature_tracks_content() {
        let a = StaticGlossary::new(vec![TargetRecord::new("a", "/a").with_terms(["x"])]);
        let b = StaticGlossary::new(vec![TargetRecord::new("a", "/a").with_terms(["y"])]);
        let a2 = StaticGlossary::new(vec![TargetRecord::new("a", "/a").with_terms(["x"])]);
        assert_ne!(a.signature(), b.signature());
        assert_eq!(a.signature(), a2.signature());
    }

    #[test]
    fn root_is_stripped_from_locations() {
        let glossary = StaticGlossary::new(Vec::new()).with_root("/site/content/");
        let identity = DocumentIdentity::at("/site/content/drugs/amox.md");
        assert_eq!(
            glossary.document_location(&identity).as_deref(),
            Some("drugs/amox.md")
        );
    }
}
