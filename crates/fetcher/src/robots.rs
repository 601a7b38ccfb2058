use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use texting_robots::Robot;
use tracing::{debug, warn};

use govsi_crawler_core::CrawlError;

/// Fallback user agent when no configured value is supplied. Kept for
/// callers (and tests) that construct a registry directly.
pub const DEFAULT_USER_AGENT: &str = "fri-wier-threadripercki";

/// Per-host cache entry: parsed robots rules, crawl-delay, sitemap
/// URLs, the raw robots text, the fetched first-sitemap text, and the
/// resolved IP. Created once per host and never mutated afterward
/// except for `ip`, filled when DNS resolution first succeeds.
pub struct HostRecord {
    pub host: String,
    robots: Option<Robot>,
    pub robots_text: String,
    pub sitemap_urls: Vec<String>,
    pub sitemap_text: Option<String>,
    pub crawl_delay_secs: u64,
    pub ip: std::sync::Mutex<Option<IpAddr>>,
    /// Set when the robots.txt fetch itself failed — the caller writes
    /// a status-400 placeholder page for the triggering URL.
    pub fetch_error: bool,
}

impl HostRecord {
    pub fn allowed(&self, url: &str) -> bool {
        match &self.robots {
            Some(robot) => robot.allowed(url),
            None => true,
        }
    }

    pub fn effective_delay_secs(&self) -> u64 {
        self.crawl_delay_secs
    }

    pub fn resolved_ip(&self) -> Option<IpAddr> {
        *self.ip.lock().expect("host record ip lock poisoned")
    }

    pub fn set_resolved_ip(&self, ip: IpAddr) {
        *self.ip.lock().expect("host record ip lock poisoned") = Some(ip);
    }
}

/// Lazily populated per-host cache of robots rules and sitemap
/// contents, mirroring the crawl-wide `HostRecord` table.
pub struct RobotsRegistry {
    client: reqwest::Client,
    user_agent: String,
    default_crawl_delay_secs: u64,
    records: DashMap<String, Arc<HostRecord>>,
}

impl RobotsRegistry {
    pub fn new(client: reqwest::Client, user_agent: String, default_crawl_delay_secs: u64) -> Self {
        Self {
            client,
            user_agent,
            default_crawl_delay_secs,
            records: DashMap::new(),
        }
    }

    pub fn get_cached(&self, host: &str) -> Option<Arc<HostRecord>> {
        self.records.get(host).map(|r| r.clone())
    }

    /// On first call per host, fetch and parse `robots.txt`, fetch the
    /// first listed sitemap as opaque text, and cache the record. On
    /// fetch error, cache an empty-rules record and report the error
    /// so the caller can record a status-400 placeholder page.
    pub async fn ensure(&self, host: &str, scheme: &str) -> Arc<HostRecord> {
        if let Some(existing) = self.get_cached(host) {
            return existing;
        }

        let robots_url = format!("{scheme}://{host}/robots.txt");
        let record = match self.fetch_robots(&robots_url).await {
            Ok((robot, text, sitemap_urls, crawl_delay)) => {
                let sitemap_text = self.fetch_first_sitemap(&sitemap_urls).await;
                Arc::new(HostRecord {
                    host: host.to_string(),
                    robots: Some(robot),
                    robots_text: text,
                    sitemap_urls,
                    sitemap_text,
                    crawl_delay_secs: crawl_delay.unwrap_or(self.default_crawl_delay_secs),
                    ip: std::sync::Mutex::new(None),
                    fetch_error: false,
                })
            }
            Err(err) => {
                warn!(host, error = %err, "robots.txt fetch failed, admitting host with empty rules");
                Arc::new(HostRecord {
                    host: host.to_string(),
                    robots: None,
                    robots_text: String::new(),
                    sitemap_urls: Vec::new(),
                    sitemap_text: None,
                    crawl_delay_secs: self.default_crawl_delay_secs,
                    ip: std::sync::Mutex::new(None),
                    fetch_error: true,
                })
            }
        };

        self.records.insert(host.to_string(), record.clone());
        record
    }

    async fn fetch_robots(
        &self,
        robots_url: &str,
    ) -> Result<(Robot, String, Vec<String>, Option<u64>), CrawlError> {
        let resp = self
            .client
            .get(robots_url)
            .send()
            .await
            .map_err(|e| CrawlError::Robots(e.to_string()))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CrawlError::Robots(e.to_string()))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let robot =
            Robot::new(&self.user_agent, &bytes).map_err(|e| CrawlError::Robots(e.to_string()))?;
        let sitemap_urls = robot.sitemaps.clone();
        let crawl_delay = robot.delay.map(|d| d.ceil() as u64);
        Ok((robot, text, sitemap_urls, crawl_delay))
    }

    async fn fetch_first_sitemap(&self, sitemap_urls: &[String]) -> Option<String> {
        let first = sitemap_urls.first()?;
        match self.client.get(first).send().await {
            Ok(resp) => resp.text().await.ok(),
            Err(err) => {
                debug!(sitemap = %first, error = %err, "sitemap fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_from_robots_txt(body: &str) -> HostRecord {
        let robot = Robot::new(DEFAULT_USER_AGENT, body.as_bytes()).unwrap();
        HostRecord {
            host: "example.gov.si".to_string(),
            robots: Some(robot),
            robots_text: body.to_string(),
            sitemap_urls: Vec::new(),
            sitemap_text: None,
            crawl_delay_secs: 5,
            ip: std::sync::Mutex::new(None),
            fetch_error: false,
        }
    }

    #[test]
    fn disallowed_path_is_rejected() {
        let record = record_from_robots_txt("User-agent: *\nDisallow: /private\n");
        assert!(!record.allowed("https://example.gov.si/private/page"));
        assert!(record.allowed("https://example.gov.si/public"));
    }

    #[test]
    fn no_disallow_rules_allows_everything() {
        let record = record_from_robots_txt("User-agent: *\nAllow: /\n");
        assert!(record.allowed("https://example.gov.si/anything"));
    }

    #[test]
    fn missing_robots_allows_everything() {
        let record = HostRecord {
            host: "example.gov.si".to_string(),
            robots: None,
            robots_text: String::new(),
            sitemap_urls: Vec::new(),
            sitemap_text: None,
            crawl_delay_secs: 5,
            ip: std::sync::Mutex::new(None),
            fetch_error: true,
        };
        assert!(record.allowed("https://example.gov.si/anything"));
    }

    #[test]
    fn effective_delay_secs_returns_the_stored_crawl_delay() {
        let mut record = record_from_robots_txt("User-agent: *\nAllow: /\n");
        record.crawl_delay_secs = 12;
        assert_eq!(record.effective_delay_secs(), 12);
    }

    #[test]
    fn resolved_ip_round_trips() {
        let record = record_from_robots_txt("User-agent: *\nAllow: /\n");
        assert_eq!(record.resolved_ip(), None);
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        record.set_resolved_ip(ip);
        assert_eq!(record.resolved_ip(), Some(ip));
    }
}
