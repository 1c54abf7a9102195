use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::browser::driver::PageDriver;
use crate::browser::stealth::{
    generate_stealth_script, BrowserFingerprint, FingerprintRandomizer, UserAgentGenerator, ViewportSize,
};
use crate::config::BrowserConfig;
use crate::error::{Result, ScrapingError};

/// Removes a session's temp profile. A directory that is already gone is fine.
fn remove_profile_dir(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// One exclusive Chrome process with a single tab.
pub struct BrowserSession {
    pub id: Uuid,
    browser: Option<Browser>,
    page: Page,
    handler: Option<JoinHandle<()>>,
    user_data_dir: PathBuf,
    navigation_timeout: Duration,
    pub fingerprint: BrowserFingerprint,
    pub user_agent: String,
}

impl BrowserSession {
    pub async fn launch(settings: &BrowserConfig) -> Result<Self> {
        let id = Uuid::new_v4();
        // unique profile dir so parallel runs don't fight over the singleton lock
        let user_data_dir = std::env::temp_dir().join(format!("review-insight-{}", id));
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to create profile dir: {}", e)))?;

        let fingerprint = if settings.randomize_fingerprint {
            FingerprintRandomizer::new().generate_fingerprint()
        } else {
            let (width, height) = settings.window_size;
            BrowserFingerprint::fixed(ViewportSize { width, height })
        };
        let user_agent = match (&settings.user_agent, settings.randomize_fingerprint) {
            (_, true) => UserAgentGenerator::new().random_user_agent().to_string(),
            (Some(ua), false) => ua.clone(),
            (None, false) => UserAgentGenerator::new().random_user_agent().to_string(),
        };

        let chrome_config = Self::chrome_config(settings, &user_data_dir, &fingerprint)?;
        let (browser, handler) = Self::launch_with_retry(chrome_config, settings.launch_attempts).await?;

        let page = match tokio::time::timeout(settings.request_timeout, browser.new_page("about:blank")).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                handler.abort();
                return Err(ScrapingError::BrowserError(format!("Failed to create new page: {}", e)));
            }
            Err(_) => {
                handler.abort();
                return Err(ScrapingError::BrowserError("Timeout creating new page".to_string()));
            }
        };

        let session = Self {
            id,
            browser: Some(browser),
            page,
            handler: Some(handler),
            user_data_dir,
            navigation_timeout: settings.request_timeout,
            fingerprint,
            user_agent,
        };
        session.apply_stealth().await?;

        info!("Browser session {} ready (headful: {})", session.id, settings.headful);
        Ok(session)
    }

    fn chrome_config(
        settings: &BrowserConfig,
        user_data_dir: &Path,
        fingerprint: &BrowserFingerprint,
    ) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .user_data_dir(user_data_dir)
            .window_size(fingerprint.viewport.width, fingerprint.viewport.height)
            .request_timeout(settings.request_timeout)
            .args(vec![
                "--disable-blink-features=AutomationControlled", // hide automation
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--no-first-run",
                "--disable-default-apps",
                "--mute-audio",
            ]);

        if settings.headful {
            builder = builder.with_head();
        }
        if let Some(ref executable) = settings.executable {
            builder = builder.chrome_executable(executable);
        }

        builder
            .build()
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to create browser config: {}", e)))
    }

    async fn launch_with_retry(config: ChromeConfig, attempts: u32) -> Result<(Browser, JoinHandle<()>)> {
        let mut last_error = String::from("no launch attempted");
        for attempt in 1..=attempts {
            match Browser::launch(config.clone()).await {
                Ok((browser, mut handler)) => {
                    info!("Browser launched successfully on attempt {}", attempt);
                    let handle = tokio::spawn(async move {
                        while let Some(event) = handler.next().await {
                            if let Err(e) = event {
                                // websocket frames chromiumoxide can't decode are noise
                                let message = e.to_string();
                                if message.contains("data did not match any variant") {
                                    debug!("Ignoring CDP deserialization error: {}", e);
                                } else {
                                    warn!("Browser handler error: {}", e);
                                }
                            }
                        }
                        debug!("Browser handler task ended");
                    });
                    return Ok((browser, handle));
                }
                Err(e) => {
                    error!("Browser launch attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }

        Err(ScrapingError::BrowserError(format!(
            "Failed to launch browser after {} attempts: {}",
            attempts, last_error
        )))
    }

    async fn apply_stealth(&self) -> Result<()> {
        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(&self.user_agent)
            .accept_language(&self.fingerprint.language)
            .platform(&self.fingerprint.platform)
            .build()
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to build user agent params: {}", e)))?;
        self.page.execute(user_agent).await?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(self.fingerprint.viewport.width as i64)
            .height(self.fingerprint.viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to build device metrics: {}", e)))?;
        self.page.execute(metrics).await?;

        let script = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(generate_stealth_script(&self.fingerprint))
            .build()
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to build stealth script: {}", e)))?;
        self.page.execute(script).await?;

        debug!("Applied stealth overrides to session {}", self.id);
        Ok(())
    }

    async fn find(&self, selector: &str) -> Option<Element> {
        match self.page.find_element(selector).await {
            Ok(element) => Some(element),
            Err(e) => {
                debug!("Element '{}' not found: {}", selector, e);
                None
            }
        }
    }

    /// Gives a click-triggered navigation the chance to settle.
    async fn settle(&self) {
        if tokio::time::timeout(self.navigation_timeout, self.page.wait_for_navigation())
            .await
            .is_err()
        {
            warn!("Timed out waiting for navigation in session {}", self.id);
        }
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Session {} navigating to {}", self.id, url);
        self.page
            .goto(url)
            .await
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to navigate to {}: {}", url, e)))?;
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapingError::BrowserError(format!("Failed to get page content: {}", e)))
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let Some(element) = self.find(selector).await else {
            return Ok(false);
        };
        element.click().await?;
        self.settle().await;
        Ok(true)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<bool> {
        let Some(element) = self.find(selector).await else {
            return Ok(false);
        };
        element.click().await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await?;
        element.type_str(value).await?;
        Ok(true)
    }

    async fn click_link_with_text(&self, text: &str) -> Result<bool> {
        let links = self.page.find_elements("a").await.unwrap_or_default();
        for link in links {
            let label = link.inner_text().await.ok().flatten().unwrap_or_default();
            if label.contains(text) {
                link.click().await?;
                self.settle().await;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser for session {}: {}", self.id, e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed waiting for browser exit in session {}: {}", self.id, e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if let Err(e) = remove_profile_dir(&self.user_data_dir) {
            warn!("Failed to remove profile dir {:?} for session {}: {}", self.user_data_dir, self.id, e);
        }
        info!("Closed browser session {}", self.id);
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("Browser session {} dropped without shutdown", self.id);
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}
