use async_trait::async_trait;

/// The injected headless-browser callable (spec §4.5.2): fully loads a
/// page with JavaScript execution and returns the rendered HTML, or
/// `None` on any browser failure. Implementations must block the
/// caller for at least the configured render delay before returning —
/// this is the crawl's only politeness guarantee for JS-driven
/// fetches, since the thinness heuristic bypasses the per-IP scheduler.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str) -> Option<String>;
}
