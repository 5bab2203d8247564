use anyhow::{Context, Result};
use std::time::Duration;
use thirtyfour::prelude::*;

/// How long to wait for a page to settle after navigation.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// DOM parsed; scripts may still be running.
    DomContentLoaded,
    /// Document fully loaded, plus a short settle for late XHR form rendering.
    NetworkIdle,
}

/// One live browser session. At most one page is active at a time; the session
/// is bound to a job for the duration of one stage and closed on every exit
/// path.
pub struct BrowserSession {
    driver: WebDriver,
}

impl BrowserSession {
    /// Connect to a running WebDriver endpoint (chromedriver or compatible).
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if headless {
            caps.set_headless()
                .context("Failed to set headless capability")?;
        }
        caps.add_arg("--window-size=1280,1024")
            .context("Failed to set window size")?;

        let driver = WebDriver::new(webdriver_url, caps).await.with_context(|| {
            format!(
                "Failed to connect to WebDriver at {webdriver_url}. Is chromedriver running?"
            )
        })?;

        Ok(Self { driver })
    }

    pub async fn goto(&self, url: &str, wait: WaitUntil) -> Result<()> {
        self.driver
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        self.wait_for_ready(wait).await
    }

    /// Poll document.readyState until the requested threshold or timeout.
    async fn wait_for_ready(&self, wait: WaitUntil) -> Result<()> {
        let deadline = tokio::time::Instant::now() + NAVIGATION_TIMEOUT;
        loop {
            let ret = self
                .driver
                .execute("return document.readyState", vec![])
                .await
                .context("Failed to read document.readyState")?;
            let state = ret.json().as_str().unwrap_or_default().to_string();

            let ready = match wait {
                WaitUntil::DomContentLoaded => state == "interactive" || state == "complete",
                WaitUntil::NetworkIdle => state == "complete",
            };
            if ready {
                if wait == WaitUntil::NetworkIdle {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("Timed out waiting for page to load");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn title(&self) -> Result<String> {
        self.driver.title().await.context("Failed to read page title")
    }

    pub async fn current_url(&self) -> Result<String> {
        Ok(self
            .driver
            .current_url()
            .await
            .context("Failed to read current URL")?
            .to_string())
    }

    /// Full page HTML, for static parsing without per-node round-trips.
    pub async fn source(&self) -> Result<String> {
        self.driver.source().await.context("Failed to read page source")
    }

    pub async fn find(&self, css: &str) -> Result<Option<WebElement>> {
        let mut found = self.driver.find_all(By::Css(css)).await?;
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(found.remove(0)))
        }
    }

    pub async fn find_all(&self, css: &str) -> Result<Vec<WebElement>> {
        Ok(self.driver.find_all(By::Css(css)).await?)
    }

    /// Wait for an element to appear, polling up to the navigation timeout.
    pub async fn wait_for(&self, css: &str) -> Result<WebElement> {
        let deadline = tokio::time::Instant::now() + NAVIGATION_TIMEOUT;
        loop {
            if let Some(element) = self.find(css).await? {
                return Ok(element);
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("Timed out waiting for element '{css}'");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for the browser to land on a URL for which the predicate holds.
    pub async fn wait_for_url(&self, predicate: impl Fn(&str) -> bool) -> Result<String> {
        let deadline = tokio::time::Instant::now() + NAVIGATION_TIMEOUT;
        loop {
            let url = self.current_url().await?;
            if predicate(&url) {
                return Ok(url);
            }
            if tokio::time::Instant::now() >= deadline {
                // Hand the final URL back so the caller can decide what the
                // ambiguous landing spot means.
                return Ok(url);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn execute(&self, script: &str) -> Result<serde_json::Value> {
        let ret = self
            .driver
            .execute(script, vec![])
            .await
            .context("Failed to execute script")?;
        Ok(ret.json().clone())
    }

    pub async fn close(self) -> Result<()> {
        self.driver.quit().await.context("Failed to close browser session")
    }
}
