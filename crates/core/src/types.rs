use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// A URL with its query, fragment, and trailing slash stripped.
///
/// Canonicalization is the only admissible form stored in the Frontier
/// or visited-set (spec §3). `CanonicalUrl::canonicalize` is idempotent:
/// canonicalizing a canonical URL returns it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// Strip the query (`?...`), fragment (`#...`), and any trailing
    /// slashes from a raw URL string.
    pub fn canonicalize(raw: &str) -> Self {
        let no_fragment = raw.split('#').next().unwrap_or(raw);
        let no_query = no_fragment.split('?').next().unwrap_or(no_fragment);
        let trimmed = no_query.trim_end_matches('/');
        let result = if trimmed.is_empty() { no_query } else { trimmed };
        Self(result.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Parse the host (network location) out of this canonical URL,
    /// case-folded.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.0)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }

    /// Whether this URL's host lies within the crawl universe: its host
    /// must contain the literal substring `gov.si`.
    pub fn in_scope(&self) -> bool {
        self.host().map(|h| h.contains("gov.si")).unwrap_or(false)
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract and case-fold the host component of a parsed URL.
pub fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or("").to_lowercase()
}

/// Classification of a fetched page, modeled as a tagged variant per
/// spec §9's redesign note rather than a record with optional fields:
/// invariants like "hash only present on Html" become structural.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PageRaw {
    Html {
        url: CanonicalUrl,
        host: String,
        status: u16,
        accessed_time: chrono::DateTime<chrono::Utc>,
        body: String,
        content_hash: String,
    },
    Binary {
        url: CanonicalUrl,
        host: String,
        status: u16,
        accessed_time: chrono::DateTime<chrono::Utc>,
        data_type_code: String,
    },
    Duplicate {
        url: CanonicalUrl,
        host: String,
        status: u16,
        accessed_time: chrono::DateTime<chrono::Utc>,
        duplicate_url: CanonicalUrl,
    },
    Error {
        url: CanonicalUrl,
        host: String,
        status: u16,
        accessed_time: chrono::DateTime<chrono::Utc>,
    },
}

impl PageRaw {
    pub fn url(&self) -> &CanonicalUrl {
        match self {
            PageRaw::Html { url, .. }
            | PageRaw::Binary { url, .. }
            | PageRaw::Duplicate { url, .. }
            | PageRaw::Error { url, .. } => url,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            PageRaw::Html { host, .. }
            | PageRaw::Binary { host, .. }
            | PageRaw::Duplicate { host, .. }
            | PageRaw::Error { host, .. } => host,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            PageRaw::Html { status, .. }
            | PageRaw::Binary { status, .. }
            | PageRaw::Duplicate { status, .. }
            | PageRaw::Error { status, .. } => *status,
        }
    }

    pub fn classification(&self) -> &'static str {
        match self {
            PageRaw::Html { .. } => "HTML",
            PageRaw::Binary { .. } => "BINARY",
            PageRaw::Duplicate { .. } => "DUPLICATE",
            PageRaw::Error { .. } => "ERROR",
        }
    }
}

/// An outbound hyperlink edge discovered on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEdge {
    pub from: CanonicalUrl,
    pub to: CanonicalUrl,
}

/// An `<img>` reference discovered on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub filename: String,
    pub content_type: String,
    pub accessed_time: chrono::DateTime<chrono::Utc>,
}

/// `PageRaw` enriched by the Extractor with outbound links and images.
/// Only ever populated for `PageRaw::Html` — a `Duplicate`/`Binary`/
/// `Error` page carries no links or images (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageObj {
    pub raw: PageRaw,
    pub links: Vec<LinkEdge>,
    pub images: Vec<ImageDescriptor>,
}

/// Site-level metadata handed to the store alongside a host's first
/// page: the robots.txt body and the first declared sitemap's body,
/// both opaque text (spec §6 `insert_site`).
#[derive(Debug, Clone)]
pub struct SiteData {
    pub host: String,
    pub robots_text: String,
    pub sitemap_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_query_fragment_and_trailing_slash() {
        let c = CanonicalUrl::canonicalize("https://example.gov.si/a/b/?x=1#frag");
        assert_eq!(c.as_str(), "https://example.gov.si/a/b");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = CanonicalUrl::canonicalize("https://example.gov.si/a/?x=1");
        let twice = CanonicalUrl::canonicalize(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_collapses_multiple_trailing_slashes() {
        let c = CanonicalUrl::canonicalize("https://example.gov.si/a///");
        assert_eq!(c.as_str(), "https://example.gov.si/a");
    }

    #[test]
    fn in_scope_requires_gov_si_substring() {
        assert!(CanonicalUrl::canonicalize("https://evem.gov.si/x").in_scope());
        assert!(!CanonicalUrl::canonicalize("https://example.com/x").in_scope());
    }

    #[test]
    fn redirect_to_same_canonical_url_is_not_a_duplicate() {
        // spec boundary B4: /a -> /a?utm=1 canonicalizes to the same URL
        let requested = CanonicalUrl::canonicalize("https://example.gov.si/a");
        let redirected = CanonicalUrl::canonicalize("https://example.gov.si/a?utm=1");
        assert_eq!(requested, redirected);
    }
}
