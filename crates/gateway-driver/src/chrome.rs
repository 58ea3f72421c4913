//! Thin `LifecycleDriver` adapter over `spider_chrome`.
//!
//! This is deliberately shallow: driving the automation protocol itself
//! (navigation, evaluation, capture) is out of scope.
//! All this crate does is launch/close a browser process and open/close
//! pages — the seam the rest of the gateway needs to manage a pool of them.
//! Grounded in `riptide-headless/src/pool.rs`'s `PooledBrowser::new`, with
//! the same unique-profile-directory requirement Chrome's SingletonLock
//! imposes per instance.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use gateway_types::{BrowserHandle, GatewayError, GatewayResult, LifecycleDriver, PageHandle};
use parking_lot::Mutex;
use serde_json::Value;
use spider_chrome::{Browser, BrowserConfig, Page};
use tempfile::TempDir;
use tracing::{debug, warn};

struct Launched {
    browser: Browser,
    pages: HashMap<String, Page>,
    handler_task: tokio::task::JoinHandle<()>,
    _profile_dir: TempDir,
}

/// Launches real Chrome processes through `spider_chrome`. One unique
/// temp profile directory per browser, same set of hardening flags
/// `riptide-headless`'s pool uses.
pub struct ChromeDriver {
    profile_base_dir: Option<PathBuf>,
    browsers: Mutex<HashMap<String, Launched>>,
}

impl ChromeDriver {
    pub fn new(profile_base_dir: Option<PathBuf>) -> Self {
        Self {
            profile_base_dir,
            browsers: Mutex::new(HashMap::new()),
        }
    }

    fn build_config(&self) -> GatewayResult<(BrowserConfig, TempDir)> {
        let temp_dir = match &self.profile_base_dir {
            Some(base) => TempDir::new_in(base),
            None => TempDir::new(),
        }
        .map_err(|e| GatewayError::LaunchFailed(format!("failed to create profile dir: {e}")))?;

        let mut config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--memory-pressure-off")
            .build()
            .map_err(|e| GatewayError::LaunchFailed(format!("invalid browser config: {e}")))?;
        config.user_data_dir = Some(temp_dir.path().to_path_buf());
        Ok((config, temp_dir))
    }
}

#[async_trait]
impl LifecycleDriver for ChromeDriver {
    async fn launch(&self, _options: &Value) -> GatewayResult<BrowserHandle> {
        let (config, profile_dir) = self.build_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| GatewayError::LaunchFailed(format!("{e}")))?;

        let id = uuid::Uuid::new_v4().to_string();
        let task_id = id.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(browser_id = %task_id, error = %e, "browser event stream error");
                }
            }
            debug!(browser_id = %task_id, "browser event handler ended");
        });

        self.browsers.lock().insert(
            id.clone(),
            Launched {
                browser,
                pages: HashMap::new(),
                handler_task,
                _profile_dir: profile_dir,
            },
        );
        Ok(BrowserHandle(id))
    }

    async fn close(&self, handle: &BrowserHandle) -> GatewayResult<()> {
        let launched = self.browsers.lock().remove(&handle.0);
        if let Some(mut launched) = launched {
            launched.handler_task.abort();
            launched
                .browser
                .close()
                .await
                .map_err(|e| GatewayError::Internal(format!("close failed: {e}")))?;
        }
        Ok(())
    }

    async fn is_connected(&self, handle: &BrowserHandle) -> bool {
        let browser_pages = {
            let browsers = self.browsers.lock();
            match browsers.get(&handle.0) {
                Some(l) => l.browser.clone(),
                None => return false,
            }
        };
        tokio::time::timeout(std::time::Duration::from_millis(500), browser_pages.pages())
            .await
            .is_ok()
    }

    async fn version(&self, handle: &BrowserHandle) -> GatewayResult<String> {
        let browser = {
            let browsers = self.browsers.lock();
            browsers
                .get(&handle.0)
                .map(|l| l.browser.clone())
                .ok_or_else(|| GatewayError::Internal(format!("unknown handle {}", handle.0)))?
        };
        browser
            .version()
            .await
            .map(|v| v.product)
            .map_err(|e| GatewayError::Internal(format!("version query failed: {e}")))
    }

    async fn pages(&self, handle: &BrowserHandle) -> GatewayResult<Vec<PageHandle>> {
        let browsers = self.browsers.lock();
        let launched = browsers
            .get(&handle.0)
            .ok_or_else(|| GatewayError::Internal(format!("unknown handle {}", handle.0)))?;
        Ok(launched.pages.keys().cloned().map(PageHandle).collect())
    }

    async fn new_page(&self, handle: &BrowserHandle) -> GatewayResult<PageHandle> {
        let browser = {
            let browsers = self.browsers.lock();
            browsers
                .get(&handle.0)
                .map(|l| l.browser.clone())
                .ok_or_else(|| GatewayError::Internal(format!("unknown handle {}", handle.0)))?
        };
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| GatewayError::Internal(format!("new_page failed: {e}")))?;
        let id = uuid::Uuid::new_v4().to_string();
        if let Some(launched) = self.browsers.lock().get_mut(&handle.0) {
            launched.pages.insert(id.clone(), page);
        }
        Ok(PageHandle(id))
    }

    async fn close_page(&self, page: &PageHandle) -> GatewayResult<()> {
        let owned = {
            let mut browsers = self.browsers.lock();
            browsers
                .values_mut()
                .find_map(|launched| launched.pages.remove(&page.0))
        };
        match owned {
            Some(p) => p
                .close()
                .await
                .map_err(|e| GatewayError::Internal(format!("close_page failed: {e}"))),
            None => Err(GatewayError::Internal(format!("unknown page {}", page.0))),
        }
    }

    async fn pid(&self, handle: &BrowserHandle) -> Option<u32> {
        let browsers = self.browsers.lock();
        browsers.get(&handle.0).and_then(|l| l.browser.get_pid())
    }
}
