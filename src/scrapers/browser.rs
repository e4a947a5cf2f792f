use crate::error::{ScrapeError, ScrapeResult};
use crate::scrapers::traits::PageDriver;
use crate::scrapers::types::ScrapeConfig;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Local;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-run folder that receives page snapshots
#[derive(Debug)]
pub struct SnapshotDir {
    dir: PathBuf,
    seq: AtomicUsize,
}

impl SnapshotDir {
    /// `<root>/<timestamp>_<sanitized query>`; creation failure is only logged.
    pub fn create(root: &Path, query: &str) -> Self {
        let name = format!(
            "{}_{}",
            Local::now().format("%Y%m%d-%H%M%S"),
            sanitize_label(query)
        );
        let dir = root.join(name);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Could not create snapshot directory {}: {}", dir.display(), e);
        }
        Self {
            dir,
            seq: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Next `NN_label` base path; extensions are added by the caller
    fn next_base(&self, label: &str) -> PathBuf {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.dir.join(format!("{:02}_{}", n, sanitize_label(label)))
    }
}

/// Lowercase, non-alphanumeric runs collapsed to `_`.
pub fn sanitize_label(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "query".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Owns the headless Chrome session for one scraper run
pub struct ChromeRenderer {
    browser: Browser,
    snapshots: Arc<SnapshotDir>,
}

impl ChromeRenderer {
    /// Launch Chrome and set up the snapshot directory for `query`
    pub fn launch(config: &ScrapeConfig, query: &str) -> ScrapeResult<Self> {
        info!(
            "Launching {} Chrome...",
            if config.headless { "headless" } else { "headed" }
        );

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .idle_browser_timeout(config.timeout() * 4)
            .build()
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| ScrapeError::Launch(e.to_string()))?;
        let snapshots = Arc::new(SnapshotDir::create(&config.snapshot_root, query));
        debug!("Snapshots go to {}", snapshots.path().display());

        Ok(Self { browser, snapshots })
    }

    pub fn open_page(&self) -> ScrapeResult<ChromePage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| ScrapeError::Launch(format!("could not open tab: {e}")))?;
        Ok(ChromePage {
            tab,
            snapshots: Arc::clone(&self.snapshots),
        })
    }

    /// Release the browser. Consumes the renderer so it can only happen once.
    pub fn close(self) {
        info!("Closing browser");
        drop(self.browser);
    }
}

/// One Chrome tab driven through the blocking CDP client
pub struct ChromePage {
    tab: Arc<Tab>,
    snapshots: Arc<SnapshotDir>,
}

impl ChromePage {
    /// Run a blocking tab call off the async executor
    async fn with_tab<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(tab.as_ref()))
            .await
            .context("browser task panicked")?
    }

    async fn capture(&self, label: &str) -> anyhow::Result<()> {
        let base = self.snapshots.next_base(label);

        let html = self
            .with_tab(|tab| Ok(tab.get_content()?))
            .await
            .context("reading page source")?;
        tokio::fs::write(base.with_extension("html"), html)
            .await
            .context("writing html snapshot")?;

        let png = self
            .with_tab(|tab| {
                Ok(tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?)
            })
            .await
            .context("capturing screenshot")?;
        tokio::fs::write(base.with_extension("png"), png)
            .await
            .context("writing screenshot")?;

        debug!("Saved snapshot {}", base.display());
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> ScrapeResult<()> {
        info!("Navigating to {}", url);
        let target = url.to_string();
        self.with_tab(move |tab| {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&target)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(|e| ScrapeError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool {
        let css = selector.to_string();
        match self
            .with_tab(move |tab| {
                tab.wait_for_element_with_custom_timeout(&css, timeout)?;
                Ok(())
            })
            .await
        {
            Ok(()) => true,
            Err(e) => {
                debug!("Selector {} did not appear: {}", selector, e);
                false
            }
        }
    }

    async fn has_selector(&self, selector: &str) -> bool {
        let css = selector.to_string();
        self.with_tab(move |tab| Ok(tab.find_element(&css).is_ok()))
            .await
            .unwrap_or(false)
    }

    async fn click(&self, selector: &str) -> ScrapeResult<()> {
        let css = selector.to_string();
        self.with_tab(move |tab| {
            tab.find_element(&css)?.click()?;
            Ok(())
        })
        .await
        .map_err(|e| ScrapeError::Browser(format!("click on {selector} failed: {e}")))
    }

    async fn type_into(&self, selector: &str, text: &str) -> ScrapeResult<()> {
        let css = selector.to_string();
        let text = text.to_string();
        self.with_tab(move |tab| {
            let input = tab.find_element(&css)?;
            input.click()?;
            tab.type_str(&text)?;
            Ok(())
        })
        .await
        .map_err(|e| ScrapeError::Browser(format!("typing into {selector} failed: {e}")))
    }

    async fn press_enter(&self) -> ScrapeResult<()> {
        self.with_tab(|tab| {
            tab.press_key("Enter")?;
            Ok(())
        })
        .await
        .map_err(|e| ScrapeError::Browser(format!("enter key failed: {e}")))
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> bool {
        self.with_tab(move |tab| {
            tab.set_default_timeout(timeout);
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
        .is_ok()
    }

    async fn current_url(&self) -> String {
        self.tab.get_url()
    }

    async fn content(&self) -> ScrapeResult<String> {
        self.with_tab(|tab| Ok(tab.get_content()?))
            .await
            .map_err(|e| ScrapeError::Browser(format!("could not read page HTML: {e}")))
    }

    async fn snapshot(&self, label: &str) {
        if let Err(e) = self.capture(label).await {
            warn!("Snapshot '{}' failed: {:#}", label, e);
        }
    }
}
