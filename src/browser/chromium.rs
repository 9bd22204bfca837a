//! chromiumoxide-backed implementation of the driver seam

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::fetch::{DisableParams, EnableParams};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::page::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::driver::{BrowserController, BrowserLauncher, Surface, SurfaceMetrics};
use super::error::DriverError;
use super::profile;

/// Launch settings for chromium instances
#[derive(Debug, Clone)]
pub struct ChromiumSettings {
    pub headless: bool,
    /// Explicit executable; discovered when `None`
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
    /// Prefix for per-instance profile directories
    pub profile_prefix: String,
    /// Per-command CDP timeout inside chromiumoxide
    pub request_timeout: Duration,
}

/// Find Chrome/Chromium on this machine.
///
/// `CHROMIUM_PATH` wins, then well-known install paths, then `PATH`.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let paths: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    if let Some(path) = paths.iter().map(PathBuf::from).find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    for name in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
        if let Ok(path) = which::which(name) {
            info!("Found browser on PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium build into the user cache dir.
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("scanfleet")
        .join("chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );

    let revision = fetcher.fetch().await.context("Failed to fetch browser")?;
    info!("Downloaded Chromium to: {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

/// Launches one chromium process per call, each with its own profile
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: ChromiumSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: ChromiumSettings) -> Self {
        Self { settings }
    }

    async fn resolve_executable(&self) -> Result<PathBuf> {
        if let Some(path) = &self.settings.executable {
            return Ok(path.clone());
        }
        match find_browser_executable() {
            Ok(path) => Ok(path),
            Err(_) => {
                warn!("No Chrome/Chromium executable found, downloading a managed build");
                download_managed_browser().await
            }
        }
    }

    async fn launch_inner(&self) -> Result<ChromiumController> {
        let executable = self.resolve_executable().await?;
        let profile = profile::create_unique_profile(&self.settings.profile_prefix)?;

        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(self.settings.request_timeout)
            .window_size(1366, 768)
            .user_data_dir(profile.path())
            .chrome_executable(executable);

        builder = if self.settings.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-renderer-backgrounding")
            .arg("--disable-breakpad")
            .arg("--disable-hang-monitor")
            .arg("--disable-ipc-flooding-protection")
            .arg("--metrics-recording-only")
            .arg("--password-store=basic")
            .arg("--use-mock-keychain")
            .arg("--mute-audio");

        for arg in &self.settings.extra_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let pid = browser.get_mut_child().and_then(|child| child.as_mut_inner().id());

        let connected = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&connected);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let msg = e.to_string();
                    // chromiumoxide cannot deserialize some newer CDP events
                    if msg.contains("data did not match any variant of untagged enum Message")
                        || msg.contains("Failed to deserialize WS response")
                    {
                        trace!("Suppressed benign CDP serialization error: {}", msg);
                    } else {
                        error!("Browser handler error: {:?}", e);
                    }
                }
            }
            flag.store(false, Ordering::SeqCst);
            debug!("Browser handler task completed");
        });

        let main_page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                let _ = browser.kill().await;
                return Err(anyhow::anyhow!("Failed to open main page: {e}"));
            }
        };
        let main_target = main_page.target_id().inner().clone();

        info!(pid = ?pid, profile = %profile.path().display(), "launched chromium instance");

        Ok(ChromiumController {
            browser: RwLock::new(browser),
            handler: Mutex::new(Some(handler_task)),
            connected,
            pid,
            main_target,
            profile_dir: profile.into_path(),
        })
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserController>, DriverError> {
        let controller = self
            .launch_inner()
            .await
            .map_err(|e| DriverError::Launch(format!("{e:#}")))?;
        Ok(Arc::new(controller))
    }
}

/// A running chromium process driven over CDP
pub struct ChromiumController {
    /// Write-locked only for shutdown; everything else shares it.
    browser: RwLock<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
    pid: Option<u32>,
    main_target: String,
    profile_dir: PathBuf,
}

#[async_trait]
impl BrowserController for ChromiumController {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn profile_dir(&self) -> Option<&Path> {
        Some(&self.profile_dir)
    }

    async fn version(&self) -> Result<String, DriverError> {
        let browser = self.browser.read().await;
        let version = browser.version().await?;
        Ok(version.product)
    }

    async fn surfaces(&self) -> Result<Vec<Arc<dyn Surface>>, DriverError> {
        let mut pages = {
            let browser = self.browser.read().await;
            browser.pages().await?
        };
        // stable sort: main page first, the rest keep driver order
        pages.sort_by_key(|page| page.target_id().inner() != &self.main_target);
        Ok(pages
            .into_iter()
            .map(|page| Arc::new(ChromiumSurface::new(page)) as Arc<dyn Surface>)
            .collect())
    }

    async fn open_surface(&self) -> Result<Arc<dyn Surface>, DriverError> {
        let page = {
            let browser = self.browser.read().await;
            browser.new_page("about:blank").await?
        };
        Ok(Arc::new(ChromiumSurface::new(page)))
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut browser = self.browser.write().await;
        browser.close().await?;
        browser.wait().await?;
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        if let Some(handle) = self.handler.lock().take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for ChromiumController {
    fn drop(&mut self) {
        if let Some(handle) = self.handler.lock().take() {
            handle.abort();
        }
    }
}

/// One chromium tab
pub struct ChromiumSurface {
    page: Page,
    id: String,
}

impl ChromiumSurface {
    fn new(page: Page) -> Self {
        let id = page.target_id().inner().clone();
        Self { page, id }
    }
}

#[async_trait]
impl Surface for ChromiumSurface {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, DriverError> {
        let result = self.page.evaluate(expression).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn set_request_interception(&self, enabled: bool) -> Result<(), DriverError> {
        if enabled {
            self.page.execute(EnableParams::default()).await?;
        } else {
            self.page.execute(DisableParams::default()).await?;
        }
        Ok(())
    }

    async fn metrics(&self) -> Result<SurfaceMetrics, DriverError> {
        let metrics = self.page.metrics().await?;
        let lookup = |name: &str| {
            metrics
                .iter()
                .find(|m| m.name == name)
                .map_or(0, |m| m.value.max(0.0) as u64)
        };
        Ok(SurfaceMetrics {
            js_heap_used_bytes: lookup("JSHeapUsedSize"),
            dom_nodes: lookup("Nodes"),
            event_listeners: lookup("JSEventListeners"),
        })
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.page.clone().close().await?;
        Ok(())
    }
}
