use std::net::IpAddr;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use govsi_crawler_core::{CanonicalUrl, CrawlError, PageRaw, Renderer, SiteData};

use crate::politeness::PolitenessScheduler;
use crate::robots::RobotsRegistry;

/// What the worker should do after calling `Fetcher::fetch`.
pub enum FetchOutcome {
    /// A terminal page, ready for extraction and persistence.
    Page(PageRaw),
    /// Politeness miss: re-enqueue the URL to the tail and move on.
    Defer,
    /// robots.txt disallows this URL: drop it silently.
    Dropped,
    /// Network/connection/DNS failure on the GET itself: mark visited,
    /// write nothing.
    VisitedNoPage,
}

pub struct Fetcher {
    client: reqwest::Client,
    robots: RobotsRegistry,
    politeness: PolitenessScheduler,
    thinness_threshold_bytes: usize,
    max_body_size_bytes: usize,
}

impl Fetcher {
    pub fn new(
        thinness_threshold_bytes: usize,
        max_body_size_bytes: usize,
        http_timeout: Duration,
        user_agent: &str,
        default_crawl_delay_secs: u64,
    ) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .danger_accept_invalid_certs(true)
            .timeout(http_timeout)
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;
        Ok(Self {
            robots: RobotsRegistry::new(client.clone(), user_agent.to_string(), default_crawl_delay_secs),
            client,
            politeness: PolitenessScheduler::new(),
            thinness_threshold_bytes,
            max_body_size_bytes,
        })
    }

    /// Resolve `host` to its first IPv4/IPv6 address. DNS failures are
    /// non-fatal; politeness simply doesn't engage until an address is
    /// known.
    async fn resolve(&self, host: &str) -> Option<IpAddr> {
        let lookup = format!("{host}:80");
        match tokio::net::lookup_host(&lookup).await {
            Ok(mut addrs) => addrs.next().map(|a| a.ip()),
            Err(err) => {
                debug!(host, error = %err, "dns resolution failed");
                None
            }
        }
    }

    /// Drives one URL through robots/politeness/fetch. The second
    /// element of the return is `Some` exactly once per host: the
    /// first time this `Fetcher` ever encounters it, regardless of
    /// whether the robots.txt fetch itself succeeded.
    pub async fn fetch(
        &self,
        url: &CanonicalUrl,
        renderer: &dyn Renderer,
    ) -> (FetchOutcome, Option<SiteData>) {
        let host = match url.host() {
            Some(h) => h,
            None => return (FetchOutcome::VisitedNoPage, None),
        };

        let known_before = self.robots.get_cached(&host).is_some();
        let record = self.robots.ensure(&host, "https").await;
        let site_data = if known_before {
            None
        } else {
            Some(SiteData {
                host: host.clone(),
                robots_text: record.robots_text.clone(),
                sitemap_text: record.sitemap_text.clone(),
            })
        };

        if !known_before && record.fetch_error {
            let page = PageRaw::Html {
                url: url.clone(),
                host,
                status: 400,
                accessed_time: Utc::now(),
                body: String::new(),
                content_hash: sha256_hex(b""),
            };
            return (FetchOutcome::Page(page), site_data);
        }

        if !record.allowed(url.as_str()) {
            return (FetchOutcome::Dropped, site_data);
        }

        let ip = match record.resolved_ip() {
            Some(ip) => Some(ip),
            None => {
                let resolved = self.resolve(&host).await;
                if let Some(ip) = resolved {
                    record.set_resolved_ip(ip);
                }
                resolved
            }
        };

        if let Some(ip) = ip {
            let effective_delay = Duration::from_secs(record.effective_delay_secs());
            if !self.politeness.allowed(ip, effective_delay) {
                return (FetchOutcome::Defer, site_data);
            }
        }

        let response = match self.client.get(url.as_str()).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(url = %url, error = %err, "fetch failed");
                return (FetchOutcome::VisitedNoPage, site_data);
            }
        };

        if let Some(ip) = ip {
            self.politeness.record_visit(ip);
        }

        let final_url = CanonicalUrl::canonicalize(response.url().as_str());
        if &final_url != url {
            let page = PageRaw::Duplicate {
                url: url.clone(),
                host,
                status: response.status().as_u16(),
                accessed_time: Utc::now(),
                duplicate_url: final_url,
            };
            return (FetchOutcome::Page(page), site_data);
        }

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let ok = response.status().is_success();
        let body = match response.text().await {
            Ok(b) => b,
            Err(err) => {
                warn!(url = %url, error = %err, "failed reading response body");
                return (FetchOutcome::VisitedNoPage, site_data);
            }
        };

        if body.len() > self.max_body_size_bytes {
            let err = CrawlError::BodyTooLarge {
                size: body.len(),
                max: self.max_body_size_bytes,
            };
            warn!(url = %url, error = %err, "dropping oversized response body");
            return (FetchOutcome::VisitedNoPage, site_data);
        }

        let page = if ok && content_type.starts_with("text/html") && !body.is_empty() {
            self.build_html_page(url, &host, body, renderer).await
        } else if ok && !body.is_empty() {
            PageRaw::Binary {
                url: url.clone(),
                host,
                status,
                accessed_time: Utc::now(),
                data_type_code: binary_type_tag(&content_type),
            }
        } else {
            PageRaw::Html {
                url: url.clone(),
                host,
                status,
                accessed_time: Utc::now(),
                body: String::new(),
                content_hash: sha256_hex(b""),
            }
        };

        (FetchOutcome::Page(page), site_data)
    }

    /// Thinness heuristic: a static HTML body under the threshold is
    /// treated as likely JS-rendered and re-fetched through the
    /// headless browser.
    async fn build_html_page(
        &self,
        url: &CanonicalUrl,
        host: &str,
        body: String,
        renderer: &dyn Renderer,
    ) -> PageRaw {
        if body.len() < self.thinness_threshold_bytes {
            let (final_body, status) = match renderer.render(url.as_str()).await {
                Some(html) => (html, 200u16),
                None => (String::new(), 404u16),
            };
            let hash = sha256_hex(final_body.as_bytes());
            return PageRaw::Html {
                url: url.clone(),
                host: host.to_string(),
                status,
                accessed_time: Utc::now(),
                body: final_body,
                content_hash: hash,
            };
        }

        let hash = sha256_hex(body.as_bytes());
        PageRaw::Html {
            url: url.clone(),
            host: host.to_string(),
            status: 200,
            accessed_time: Utc::now(),
            body,
            content_hash: hash,
        }
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Mirrors the original crawler's Content-Type classification exactly,
/// including its overlapping `doc`/`docx` branch order: a `docx`
/// header matches the `doc` check first.
pub fn binary_type_tag(content_type: &str) -> String {
    let lower = content_type.to_lowercase();
    if lower.contains("pdf") {
        return "PDF".to_string();
    }
    if lower.contains("doc") {
        return "DOC".to_string();
    }
    if lower.contains("docx") {
        return "DOCX".to_string();
    }
    if lower.contains("ppt") {
        return "PPT".to_string();
    }
    if lower.contains("pptx") {
        return "PPTX".to_string();
    }

    match content_type.split('/').nth(1) {
        None => String::new(),
        Some(rest) => {
            let stripped = rest.split(';').next().unwrap_or("");
            let upper = stripped.to_uppercase();
            upper.chars().take(20).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_type_tag_recognizes_pdf() {
        assert_eq!(binary_type_tag("application/pdf"), "PDF");
    }

    #[test]
    fn binary_type_tag_falls_back_to_subtype() {
        assert_eq!(binary_type_tag("image/png; charset=binary"), "PNG");
    }

    #[test]
    fn binary_type_tag_truncates_to_twenty_chars() {
        let tag = binary_type_tag("application/a-very-long-subtype-name-indeed");
        assert_eq!(tag.len(), 20);
    }

    #[test]
    fn binary_type_tag_empty_on_missing_header() {
        assert_eq!(binary_type_tag(""), "");
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
