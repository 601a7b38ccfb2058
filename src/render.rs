use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use tracing::warn;

use govsi_crawler_core::Renderer;

/// Headless-Chrome-backed `Renderer`: fully loads a page with
/// JavaScript execution and returns the final HTML, or `None` on any
/// browser failure. Blocks for at least `min_delay` before returning,
/// the crawl's only politeness guarantee for JS-driven fetches.
pub struct HeadlessChromeRenderer {
    browser: Browser,
    min_delay: Duration,
}

impl HeadlessChromeRenderer {
    pub fn new(min_delay: Duration) -> anyhow::Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()?;
        let browser = Browser::new(options)?;
        Ok(Self { browser, min_delay })
    }

    fn render_blocking(&self, url: &str) -> Option<String> {
        let tab = self.browser.new_tab().ok()?;
        tab.navigate_to(url).ok()?;
        tab.wait_until_navigated().ok()?;
        let html = tab.get_content().ok()?;
        let _ = tab.close(true);
        Some(html)
    }
}

#[async_trait]
impl Renderer for HeadlessChromeRenderer {
    async fn render(&self, url: &str) -> Option<String> {
        tokio::time::sleep(self.min_delay).await;

        let url = url.to_string();
        let browser_result =
            tokio::task::block_in_place(|| self.render_blocking(&url));

        if browser_result.is_none() {
            warn!(url, "headless render failed");
        }
        browser_result
    }
}
