use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use govsi_crawler_core::{CanonicalUrl, ImageDescriptor, LinkEdge};

const MAX_CONTENT_TYPE_LEN: usize = 255;

/// Matches a URL embedded in an `onclick` handler: `https://`, `www.`,
/// or a leading `/`, followed by non-whitespace.
static ONCLICK_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.|/)\S+\b").unwrap());

/// Matches the `data:image/...;base64` media-type prefix up to (not
/// including) the comma that starts the payload.
static DATA_IMAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(data:image/[^,]*?;?[^,]*),").unwrap());

pub struct Extracted {
    pub links: Vec<LinkEdge>,
    pub images: Vec<ImageDescriptor>,
}

/// Parse the HTML body of `page_url` and emit outbound link edges and
/// image descriptors. `accessed_time` is stamped onto every image
/// descriptor, matching the page's own fetch time.
pub fn extract(
    body: &str,
    page_url: &CanonicalUrl,
    base: &Url,
    accessed_time: chrono::DateTime<chrono::Utc>,
) -> Extracted {
    let document = Html::parse_document(body);

    let mut links = extract_anchor_links(&document, page_url, base);
    links.extend(extract_onclick_links(&document, page_url, base));

    let images = extract_images(&document, base, accessed_time);

    Extracted { links, images }
}

fn extract_anchor_links(document: &Html, page_url: &CanonicalUrl, base: &Url) -> Vec<LinkEdge> {
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&sel)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            if href.starts_with("mailto:") {
                return None;
            }
            let resolved = base.join(href).ok()?;
            Some(LinkEdge {
                from: page_url.clone(),
                to: CanonicalUrl::canonicalize(resolved.as_str()),
            })
        })
        .collect()
}

fn extract_onclick_links(document: &Html, page_url: &CanonicalUrl, base: &Url) -> Vec<LinkEdge> {
    let Ok(sel) = Selector::parse("[onclick]") else {
        return Vec::new();
    };

    let mut edges = Vec::new();
    for el in document.select(&sel) {
        let Some(onclick) = el.value().attr("onclick") else {
            continue;
        };
        for m in ONCLICK_URL_PATTERN.find_iter(onclick) {
            let candidate = m.as_str();
            if candidate.starts_with("mailto:") {
                continue;
            }
            if let Ok(resolved) = base.join(candidate) {
                edges.push(LinkEdge {
                    from: page_url.clone(),
                    to: CanonicalUrl::canonicalize(resolved.as_str()),
                });
            }
        }
    }
    edges
}

fn extract_images(
    document: &Html,
    base: &Url,
    accessed_time: chrono::DateTime<chrono::Utc>,
) -> Vec<ImageDescriptor> {
    let Ok(sel) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    document
        .select(&sel)
        .filter_map(|el| {
            let src = el.value().attr("src")?;
            let resolved = base.join(src).ok()?;
            let resolved_str = resolved.as_str();

            let (filename, content_type) = if resolved_str.starts_with("data:image") {
                let mut content_type = DATA_IMAGE_PATTERN
                    .captures(resolved_str)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                if content_type.len() >= MAX_CONTENT_TYPE_LEN {
                    content_type.clear();
                }
                ("BINARY DATA".to_string(), content_type)
            } else {
                let last_segment = resolved.path().rsplit('/').next().unwrap_or("");
                let ext = last_segment
                    .rsplit_once('.')
                    .map(|(_, ext)| format!(".{ext}"))
                    .unwrap_or_default();
                (resolved_str.to_string(), ext)
            };

            Some(ImageDescriptor {
                filename,
                content_type,
                accessed_time,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> (CanonicalUrl, Url) {
        let base = Url::parse("https://example.gov.si/page").unwrap();
        (CanonicalUrl::canonicalize(base.as_str()), base)
    }

    #[test]
    fn anchor_links_skip_mailto() {
        let (page, base) = page_url();
        let html = r#"<a href="/open">open</a><a href="mailto:x@y.si">mail</a>"#;
        let extracted = extract(html, &page, &base, chrono::Utc::now());
        assert_eq!(extracted.links.len(), 1);
        assert_eq!(extracted.links[0].to.as_str(), "https://example.gov.si/open");
    }

    #[test]
    fn anchor_links_resolve_relative_and_canonicalize() {
        let (page, base) = page_url();
        let html = r#"<a href="sub/page/?x=1#frag">x</a>"#;
        let extracted = extract(html, &page, &base, chrono::Utc::now());
        assert_eq!(
            extracted.links[0].to.as_str(),
            "https://example.gov.si/sub/page"
        );
    }

    #[test]
    fn data_image_is_tagged_binary_data() {
        let (page, base) = page_url();
        let html = r#"<img src="data:image/png;base64,iVBORw0KGgo=">"#;
        let extracted = extract(html, &page, &base, chrono::Utc::now());
        assert_eq!(extracted.images.len(), 1);
        assert_eq!(extracted.images[0].filename, "BINARY DATA");
        assert_eq!(extracted.images[0].content_type, "data:image/png;base64");
    }

    #[test]
    fn data_image_content_type_blanked_past_255_chars() {
        let (page, base) = page_url();
        let padding = "x".repeat(300);
        let html = format!(r#"<img src="data:image/{padding};base64,AAAA">"#);
        let extracted = extract(&html, &page, &base, chrono::Utc::now());
        assert_eq!(extracted.images[0].content_type, "");
    }

    #[test]
    fn regular_image_uses_extension_as_content_type() {
        let (page, base) = page_url();
        let html = r#"<img src="/logo.png">"#;
        let extracted = extract(html, &page, &base, chrono::Utc::now());
        assert_eq!(extracted.images[0].content_type, ".png");
        assert_eq!(extracted.images[0].filename, "https://example.gov.si/logo.png");
    }

    #[test]
    fn onclick_urls_are_extracted_as_links() {
        let (page, base) = page_url();
        let html = r#"<div onclick="window.location='/target'">go</div>"#;
        let extracted = extract(html, &page, &base, chrono::Utc::now());
        assert!(extracted
            .links
            .iter()
            .any(|e| e.to.as_str() == "https://example.gov.si/target"));
    }

    #[test]
    fn onclick_mailto_is_not_a_link() {
        let (page, base) = page_url();
        let html = r#"<div onclick="mailto:a@b.si">mail</div>"#;
        let extracted = extract(html, &page, &base, chrono::Utc::now());
        assert!(extracted.links.is_empty());
    }
}
