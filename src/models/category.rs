//! Category graph vertices and URL canonicalisation.

use std::fmt;

use url::Url;

/// A vertex in the storefront's browse hierarchy, identified by canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryNode {
    url: String,
}

impl CategoryNode {
    /// Create a node from an already-canonical URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Last non-empty path segment, used to name backup files.
    pub fn slug(&self) -> String {
        last_path_segment(&self.url)
    }
}

impl fmt::Display for CategoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Which listing on a category page an item link was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePanel {
    /// The "more items from this category" panel on a non-leaf node.
    Parent,
    /// The product grid of a leaf node.
    Leaf,
}

impl SourcePanel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePanel::Parent => "parent",
            SourcePanel::Leaf => "leaf",
        }
    }
}

impl fmt::Display for SourcePanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve `href` against `base` and normalise it for use as an identity key.
///
/// Fragments and query strings are dropped, and a trailing slash is trimmed
/// from any path other than the root. Returns `None` for hrefs that cannot be
/// resolved or that point at a non-HTTP scheme.
pub fn canonicalize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let mut url = match Url::parse(href) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok()?,
        Err(_) => return None,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    url.set_fragment(None);
    url.set_query(None);

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url.to_string())
}

/// Last non-empty path segment of a URL, or `"root"` when there is none.
pub fn last_path_segment(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_default();

    let cleaned: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if cleaned.is_empty() {
        "root".to_string()
    } else {
        cleaned
    }
}
