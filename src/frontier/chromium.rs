//! Rendering session backed by headless Chromium via chromiumoxide

use crate::frontier::{within, RenderSession};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A single Chromium tab
pub struct ChromiumSession {
    // kept alive for the lifetime of the page
    _browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    call_timeout: Duration,
}

impl ChromiumSession {
    /// Launches a browser and opens one blank tab
    ///
    /// Every later call on the tab is bounded by `call_timeout`.
    pub async fn launch(headless: bool, call_timeout: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .window_size(1366, 900);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| HarvestError::Render(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::Render(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        let page = within(call_timeout, "opening a tab", async {
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| HarvestError::Render(format!("failed to open tab: {e}")))
        })
        .await?;

        info!("Chromium session started (headless: {})", headless);

        Ok(Self {
            _browser: browser,
            page,
            handler,
            call_timeout,
        })
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let page = &self.page;
        within(self.call_timeout, &format!("navigation to {url}"), async {
            page.goto(url)
                .await
                .map_err(|e| HarvestError::Render(format!("navigation to {url} failed: {e}")))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| HarvestError::Render(format!("waiting for {url} failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>> {
        let page = &self.page;
        within(self.call_timeout, &format!("query '{selector}'"), async {
            page.find_elements(selector)
                .await
                .map_err(|e| HarvestError::Render(format!("query '{selector}' failed: {e}")))
        })
        .await
    }

    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value> {
        let page = &self.page;
        let result = within(self.call_timeout, "script", async {
            page.evaluate(script)
                .await
                .map_err(|e| HarvestError::Render(format!("script failed: {e}")))
        })
        .await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn element_attribute(&mut self, element: &Element, name: &str) -> Result<Option<String>> {
        within(self.call_timeout, &format!("attribute '{name}'"), async {
            element
                .attribute(name)
                .await
                .map_err(|e| HarvestError::Render(format!("reading attribute '{name}' failed: {e}")))
        })
        .await
    }

    // Resolving every node through the protocol is slow on long listings,
    // so counting happens inside the page.
    async fn count(&mut self, selector: &str) -> Result<usize> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| HarvestError::Render(format!("bad selector '{selector}': {e}")))?;
        let value = self
            .execute_script(&format!("document.querySelectorAll({quoted}).length"))
            .await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| HarvestError::Render(format!("count for '{selector}' was not a number")))
    }
}
