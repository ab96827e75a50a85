use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::control::BrowserControl;
use super::keys::key_definition;
use crate::models::Position;

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub width: u32,
    pub height: u32,
    /// Isolated browser context (no cookies or history from earlier sessions)
    pub incognito: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            width: 1280,
            height: 720,
            incognito: true,
        }
    }
}

/// Manages browser lifecycle and page connections
pub struct BrowserManager {
    browser: Arc<Mutex<Option<Browser>>>,
    page: Arc<Mutex<Option<Page>>>,
    /// Lock to prevent concurrent browser launches
    launch_lock: Mutex<()>,
}

impl BrowserManager {
    pub fn new() -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            page: Arc::new(Mutex::new(None)),
            launch_lock: Mutex::new(()),
        }
    }

    /// Launch Chrome and open a blank page
    pub async fn launch(&self, options: &LaunchOptions) -> Result<()> {
        let _launch_guard = self.launch_lock.lock().await;

        self.shutdown().await;

        let mut config = BrowserConfig::builder().window_size(options.width, options.height);

        if !options.headless {
            config = config.with_head();
        }

        // NOTE: no --incognito flag, it opens a second window. The CDP context API is used below.
        config = config
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-default-apps")
            .arg("--disable-extensions");

        let config = config.build().map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (mut browser, mut handler) = timeout(Duration::from_secs(30), Browser::launch(config))
            .await
            .map_err(|_| anyhow!("Browser launch timeout (30s) - Chrome may not be installed or is unresponsive"))?
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                tracing::trace!("Browser event: {:?}", event);
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        // Closed only after our page exists, so the window never disappears
        let default_pages = browser.pages().await.map_err(|e| anyhow!("Failed to get pages: {}", e))?;

        if options.incognito {
            tracing::info!("Creating incognito browser context via CDP");
            browser
                .start_incognito_context()
                .await
                .map_err(|e| anyhow!("Failed to start incognito context: {}", e))?;
        }

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to create page: {}", e))?;

        for default_page in default_pages {
            if let Err(e) = default_page.close().await {
                tracing::warn!("Failed to close default page: {}", e);
            }
        }

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(options.width as i64)
            .height(options.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow!("Failed to build viewport params: {}", e))?;

        page.execute(metrics)
            .await
            .map_err(|e| anyhow!("Failed to set viewport: {}", e))?;

        *self.browser.lock().await = Some(browser);
        *self.page.lock().await = Some(page);

        tracing::info!(
            "Browser launched ({}x{}, headless: {})",
            options.width,
            options.height,
            options.headless
        );
        Ok(())
    }

    async fn current_page(&self) -> Result<Page> {
        self.page
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("No page available"))
    }

    async fn dispatch_key(page: &Page, kind: DispatchKeyEventType, key: &str) -> Result<()> {
        let mut builder = DispatchKeyEventParams::builder().r#type(kind.clone());
        builder = match key_definition(key) {
            Some(def) => {
                let mut b = builder
                    .key(def.key)
                    .code(def.code)
                    .windows_virtual_key_code(def.key_code)
                    .native_virtual_key_code(def.key_code);
                if let (Some(text), DispatchKeyEventType::KeyDown) = (def.text, &kind) {
                    b = b.text(text);
                }
                b
            }
            None => {
                // Single printable character
                let mut b = builder.key(key);
                if matches!(kind, DispatchKeyEventType::KeyDown) {
                    b = b.text(key);
                }
                b
            }
        };
        let params = builder.build().map_err(|e| anyhow!("Invalid key event for '{}': {}", key, e))?;
        page.execute(params)
            .await
            .map_err(|e| anyhow!("Failed to dispatch key '{}': {}", key, e))?;
        Ok(())
    }

    async fn shutdown(&self) {
        let mut page_guard = self.page.lock().await;
        let mut browser_guard = self.browser.lock().await;

        if let Some(page) = page_guard.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = browser_guard.take() {
            let _ = browser.close().await;
            tracing::info!("Browser closed");
        }
    }
}

impl Default for BrowserManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserControl for BrowserManager {
    async fn evaluate(&self, script: &str) -> Result<Value> {
        let page = self.current_page().await?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("Failed to evaluate script: {}", e))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn add_init_script(&self, script: &str) -> Result<()> {
        let page = self.current_page().await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script.to_string()))
            .await
            .map_err(|e| anyhow!("Failed to register init script: {}", e))?;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.current_page().await?;
        page.goto(url)
            .await
            .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;
        Ok(())
    }

    async fn move_mouse(&self, point: Position) -> Result<()> {
        let page = self.current_page().await?;
        page.move_mouse(Point::new(point.x, point.y))
            .await
            .map_err(|e| anyhow!("Failed to move mouse: {}", e))?;
        Ok(())
    }

    async fn click_at(&self, point: Position) -> Result<()> {
        let page = self.current_page().await?;
        page.click(Point::new(point.x, point.y))
            .await
            .map_err(|e| anyhow!("Failed to click at ({}, {}): {}", point.x, point.y, e))?;
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        let page = self.current_page().await?;
        page.execute(InsertTextParams::new(text))
            .await
            .map_err(|e| anyhow!("Failed to insert text: {}", e))?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let page = self.current_page().await?;
        Self::dispatch_key(&page, DispatchKeyEventType::KeyDown, key).await?;
        Self::dispatch_key(&page, DispatchKeyEventType::KeyUp, key).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let page = self.current_page().await?;
        page.screenshot(
            ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
        )
        .await
        .map_err(|e| anyhow!("Failed to take screenshot: {}", e))
    }

    async fn close(&self) -> Result<()> {
        self.shutdown().await;
        Ok(())
    }
}
