use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use govsi_crawler_core::{PageRaw, Renderer, Store};
use govsi_crawler_fetcher::{FetchOutcome, Fetcher};
use govsi_crawler_frontier::Frontier;

/// One crawl worker: owns its own `Store` connection and `Renderer`
/// instance, and consults the frontier and fetcher shared with every
/// other worker.
pub struct Worker<S: Store, R: Renderer> {
    pub frontier: Arc<Frontier>,
    pub fetcher: Arc<Fetcher>,
    pub store: S,
    pub renderer: R,
}

impl<S: Store, R: Renderer> Worker<S, R> {
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let url = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    debug!("worker received shutdown signal");
                    return;
                }
                url = self.frontier.dequeue() => url,
            };

            let (outcome, site_data) = self.fetcher.fetch(&url, &self.renderer).await;

            if let Some(site) = site_data {
                if let Err(err) = self.store.insert_site(&site).await {
                    warn!(host = %site.host, error = %err, "failed to persist site record");
                }
            }

            match outcome {
                FetchOutcome::Defer => {
                    self.frontier.requeue(url).await;
                }
                FetchOutcome::Dropped => {
                    // robots.txt disallowed: leave unvisited so a future
                    // crawl with different rules could still pick it up.
                }
                FetchOutcome::VisitedNoPage => {
                    self.frontier.mark_visited(&url);
                }
                FetchOutcome::Page(page) => {
                    self.handle_page(page).await;
                    self.frontier.mark_visited(&url);
                }
            }
        }
    }

    async fn handle_page(&self, page: PageRaw) {
        let page = match page {
            PageRaw::Html {
                url,
                host,
                status,
                accessed_time,
                body,
                content_hash,
            } => {
                match self
                    .store
                    .check_duplicate_by_hash_or_url(&content_hash, &url)
                    .await
                {
                    Ok(Some(duplicate_url)) => {
                        return self
                            .persist_duplicate(PageRaw::Duplicate {
                                url,
                                host,
                                status,
                                accessed_time,
                                duplicate_url,
                            })
                            .await;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(url = %url, error = %err, "duplicate check failed, treating as new page");
                    }
                }

                let extracted = self.extract_links_and_images(&url, &body, accessed_time);
                for edge in &extracted.links {
                    self.frontier.enqueue(edge.to.as_str()).await;
                }

                self.persist(
                    PageRaw::Html {
                        url,
                        host,
                        status,
                        accessed_time,
                        body,
                        content_hash,
                    },
                    &extracted.links,
                    &extracted.images,
                )
                .await;
                return;
            }
            PageRaw::Duplicate { .. } => return self.persist_duplicate(page).await,
            other => other,
        };

        self.persist(page, &[], &[]).await;
    }

    /// A redirect-produced duplicate names a target URL that may never
    /// have been seen before — enqueue it if it hasn't, so it gets
    /// fetched and persisted as its own page (spec §4.5 step 6).
    async fn persist_duplicate(&self, page: PageRaw) {
        if let PageRaw::Duplicate {
            ref duplicate_url, ..
        } = page
        {
            if !self.frontier.is_visited(duplicate_url) {
                self.frontier.enqueue(duplicate_url.as_str()).await;
            }
        }
        self.persist(page, &[], &[]).await;
    }

    fn extract_links_and_images(
        &self,
        url: &govsi_crawler_core::CanonicalUrl,
        body: &str,
        accessed_time: chrono::DateTime<chrono::Utc>,
    ) -> govsi_crawler_parser::Extracted {
        let base = match Url::parse(url.as_str()) {
            Ok(u) => u,
            Err(err) => {
                warn!(url = %url, error = %err, "page url failed to reparse, skipping extraction");
                return govsi_crawler_parser::Extracted {
                    links: Vec::new(),
                    images: Vec::new(),
                };
            }
        };
        govsi_crawler_parser::extract(body, url, &base, accessed_time)
    }

    async fn persist(
        &self,
        page: PageRaw,
        links: &[govsi_crawler_core::LinkEdge],
        images: &[govsi_crawler_core::ImageDescriptor],
    ) {
        if let Err(err) = self
            .store
            .insert_page_with_links_and_images(&page, links, images)
            .await
        {
            warn!(url = %page.url(), error = %err, "failed to persist page");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use govsi_crawler_core::{CanonicalUrl, CrawlError, ImageDescriptor, LinkEdge, SiteData};

    use super::*;

    struct FakeStore {
        duplicate_of: Option<CanonicalUrl>,
        inserted: StdMutex<Vec<PageRaw>>,
    }

    impl FakeStore {
        fn new(duplicate_of: Option<CanonicalUrl>) -> Self {
            Self {
                duplicate_of,
                inserted: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn insert_site(&self, _site: &SiteData) -> Result<(), CrawlError> {
            Ok(())
        }

        async fn insert_page_with_links_and_images(
            &self,
            page: &PageRaw,
            _links: &[LinkEdge],
            _images: &[ImageDescriptor],
        ) -> Result<(), CrawlError> {
            self.inserted.lock().unwrap().push(page.clone());
            Ok(())
        }

        async fn check_duplicate_by_hash_or_url(
            &self,
            _hash: &str,
            _url: &CanonicalUrl,
        ) -> Result<Option<CanonicalUrl>, CrawlError> {
            Ok(self.duplicate_of.clone())
        }
    }

    struct NoopRenderer;

    #[async_trait]
    impl Renderer for NoopRenderer {
        async fn render(&self, _url: &str) -> Option<String> {
            None
        }
    }

    fn worker(store: FakeStore) -> Worker<FakeStore, NoopRenderer> {
        Worker {
            frontier: Arc::new(Frontier::new()),
            fetcher: Arc::new(
                Fetcher::new(
                    25_000,
                    50 * 1024 * 1024,
                    Duration::from_secs(30),
                    "test-agent",
                    5,
                )
                .unwrap(),
            ),
            store,
            renderer: NoopRenderer,
        }
    }

    fn html_page(url: &str) -> PageRaw {
        PageRaw::Html {
            url: CanonicalUrl::canonicalize(url),
            host: "example.gov.si".to_string(),
            status: 200,
            accessed_time: Utc::now(),
            body: "<html></html>".to_string(),
            content_hash: "deadbeef".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_by_hash_is_downgraded_and_persisted_without_links() {
        let existing = CanonicalUrl::canonicalize("https://example.gov.si/original");
        let w = worker(FakeStore::new(Some(existing.clone())));

        w.handle_page(html_page("https://example.gov.si/copy")).await;

        let inserted = w.store.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        match &inserted[0] {
            PageRaw::Duplicate { duplicate_url, .. } => assert_eq!(duplicate_url, &existing),
            other => panic!("expected Duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn redirect_duplicate_enqueues_unvisited_target() {
        let target = CanonicalUrl::canonicalize("https://example.gov.si/home");
        let w = worker(FakeStore::new(None));

        let redirect_page = PageRaw::Duplicate {
            url: CanonicalUrl::canonicalize("https://example.gov.si/old"),
            host: "example.gov.si".to_string(),
            status: 301,
            accessed_time: Utc::now(),
            duplicate_url: target.clone(),
        };
        w.handle_page(redirect_page).await;

        assert_eq!(w.frontier.len().await, 1);
        let dequeued = w.frontier.dequeue().await;
        assert_eq!(dequeued, target);

        let inserted = w.store.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert!(matches!(inserted[0], PageRaw::Duplicate { .. }));
    }

    #[tokio::test]
    async fn redirect_duplicate_does_not_reenqueue_already_visited_target() {
        let target = CanonicalUrl::canonicalize("https://example.gov.si/home");
        let w = worker(FakeStore::new(None));
        w.frontier.mark_visited(&target);

        let redirect_page = PageRaw::Duplicate {
            url: CanonicalUrl::canonicalize("https://example.gov.si/old"),
            host: "example.gov.si".to_string(),
            status: 301,
            accessed_time: Utc::now(),
            duplicate_url: target,
        };
        w.handle_page(redirect_page).await;

        assert!(w.frontier.is_empty().await);
    }
}
