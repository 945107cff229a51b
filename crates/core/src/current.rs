use crate::glossary::{DocumentIdentity, TargetRecord};

const MARKUP_EXTENSIONS: &[&str] = &["md", "mdx", "markdown"];

fn normalize(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let segments: Vec<&str> = unified
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    segments.join("/")
}

fn strip_markup_extension(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.contains('/')
                && MARKUP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) =>
        {
            stem
        }
        _ => path,
    }
}

/// Forms a location may be written in: as-is, without extension, and
/// without a trailing `index` page name.
fn location_forms(path: &str) -> Vec<String> {
    let normalized = normalize(path);
    if normalized.is_empty() {
        return Vec::new();
    }
    let stem = strip_markup_extension(&normalized).to_string();
    let mut forms = vec![normalized.clone()];
    if stem != normalized {
        forms.push(stem.clone());
    }
    if let Some(dir) = stem.strip_suffix("/index") {
        forms.push(dir.to_string());
    }
    forms
}

/// A bare file name never matches as a suffix; `index.md` at the root must
/// not claim every `*/index.md` page.
fn is_segment_suffix(longer: &str, shorter: &str) -> bool {
    shorter.contains('/')
        && longer.len() > shorter.len()
        && longer.ends_with(shorter)
        && longer.as_bytes()[longer.len() - shorter.len() - 1] == b'/'
}

/// Exact form equality, or one path ending with the other on a segment
/// boundary when the shorter one has a directory part.
pub fn locations_match(a: &str, b: &str) -> bool {
    let left = location_forms(a);
    let right = location_forms(b);
    left.iter().any(|l| {
        right
            .iter()
            .any(|r| l == r || is_segment_suffix(l, r) || is_segment_suffix(r, l))
    })
}

fn trim_slug(value: &str) -> &str {
    value.trim().trim_matches('/')
}

/// Finds the target owned by the document being rewritten, if any.
///
/// Location is tried first, then the declared id, then the declared slug
/// against target destinations.
pub fn resolve_current<'t>(
    targets: &'t [TargetRecord],
    location: Option<&str>,
    identity: &DocumentIdentity,
) -> Option<&'t TargetRecord> {
    if let Some(location) = location.filter(|l| !l.trim().is_empty()) {
        let normalized = normalize(location);
        let exact = targets
            .iter()
            .find(|t| !t.source_location.is_empty() && normalize(&t.source_location) == normalized);
        if exact.is_some() {
            return exact;
        }
        let fuzzy = targets.iter().find(|t| {
            !t.source_location.is_empty() && locations_match(location, &t.source_location)
        });
        if fuzzy.is_some() {
            return fuzzy;
        }
    }
    if let Some(id) = identity.id.as_deref().filter(|id| !id.is_empty()) {
        if let Some(found) = targets.iter().find(|t| t.id == id) {
            return Some(found);
        }
    }
    let slug = identity.slug.as_deref().map(trim_slug)?;
    if slug.is_empty() {
        return None;
    }
    targets
        .iter()
        .find(|t| trim_slug(&t.destination) == slug || locations_match(&t.destination, slug))
}
