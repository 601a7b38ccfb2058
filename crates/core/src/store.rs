use async_trait::async_trait;

use crate::error::CrawlError;
use crate::types::{CanonicalUrl, ImageDescriptor, LinkEdge, PageRaw, SiteData};

/// The external persistent store, consumed by the core crawler through
/// this narrow write interface only (spec §1, §6). A concrete
/// implementation — e.g. `govsi-crawler-storage::PgStore` — lives
/// outside the crawling engine; each worker owns one connection and
/// never shares it (spec §5).
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent per host.
    async fn insert_site(&self, site: &SiteData) -> Result<(), CrawlError>;

    /// Persist a page together with its extracted links and images,
    /// atomically.
    async fn insert_page_with_links_and_images(
        &self,
        page: &PageRaw,
        links: &[LinkEdge],
        images: &[ImageDescriptor],
    ) -> Result<(), CrawlError>;

    /// Ask the store whether an equivalent page already exists, either
    /// by content hash or by URL. Returns the existing page's
    /// canonical URL if so.
    async fn check_duplicate_by_hash_or_url(
        &self,
        hash: &str,
        url: &CanonicalUrl,
    ) -> Result<Option<CanonicalUrl>, CrawlError>;
}
