//! Deterministic `LifecycleDriver` test double with failure injection.
//!
//! Modeled on `riptide-headless`'s `PooledBrowser`/`BrowserPool`
//! (`src/pool.rs`) for the shape of what a driver tracks per browser (id,
//! pages, liveness), but backed by an in-memory map instead of spawning real
//! Chrome processes so pool/health/recycler/scaler tests run deterministically
//! under `tokio::time::pause()`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use gateway_types::{BrowserHandle, GatewayError, GatewayResult, LifecycleDriver, PageHandle};
use parking_lot::Mutex;
use serde_json::Value;

struct BrowserState {
    pages: HashSet<String>,
    connected: bool,
    version: String,
}

/// An in-memory stand-in for a real browser-automation driver.
///
/// Failure injection is exposed as plain atomics/locks rather than a config
/// struct so tests can flip a knob mid-scenario (e.g. "the third launch
/// fails, then recovers").
pub struct MockDriver {
    browsers: Mutex<HashMap<String, BrowserState>>,
    next_id: AtomicU64,
    launch_failures_remaining: AtomicU32,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            browsers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            launch_failures_remaining: AtomicU32::new(0),
        }
    }

    /// The next `n` calls to `launch` fail with `LaunchFailed` before
    /// launches start succeeding again.
    pub fn fail_next_launches(&self, n: u32) {
        self.launch_failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Simulates a crashed/unresponsive browser: `is_connected` flips to
    /// false and page operations against it start failing.
    pub fn disconnect(&self, handle: &BrowserHandle) {
        if let Some(state) = self.browsers.lock().get_mut(&handle.0) {
            state.connected = false;
        }
    }

    pub fn live_browser_count(&self) -> usize {
        self.browsers.lock().len()
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleDriver for MockDriver {
    async fn launch(&self, _options: &Value) -> GatewayResult<BrowserHandle> {
        if self.launch_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.launch_failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(GatewayError::LaunchFailed("mock driver: injected failure".into()));
        }
        let id = format!("mock-browser-{}", self.next());
        self.browsers.lock().insert(
            id.clone(),
            BrowserState {
                pages: HashSet::new(),
                connected: true,
                version: "MockDriver/1.0".to_string(),
            },
        );
        Ok(BrowserHandle(id))
    }

    async fn close(&self, handle: &BrowserHandle) -> GatewayResult<()> {
        self.browsers.lock().remove(&handle.0);
        Ok(())
    }

    async fn is_connected(&self, handle: &BrowserHandle) -> bool {
        self.browsers
            .lock()
            .get(&handle.0)
            .map(|s| s.connected)
            .unwrap_or(false)
    }

    async fn version(&self, handle: &BrowserHandle) -> GatewayResult<String> {
        self.browsers
            .lock()
            .get(&handle.0)
            .map(|s| s.version.clone())
            .ok_or_else(|| GatewayError::Internal(format!("unknown handle {}", handle.0)))
    }

    async fn pages(&self, handle: &BrowserHandle) -> GatewayResult<Vec<PageHandle>> {
        let browsers = self.browsers.lock();
        let state = browsers
            .get(&handle.0)
            .ok_or_else(|| GatewayError::Internal(format!("unknown handle {}", handle.0)))?;
        Ok(state.pages.iter().cloned().map(PageHandle).collect())
    }

    async fn new_page(&self, handle: &BrowserHandle) -> GatewayResult<PageHandle> {
        let id = format!("mock-page-{}", self.next());
        let mut browsers = self.browsers.lock();
        let state = browsers
            .get_mut(&handle.0)
            .ok_or_else(|| GatewayError::Internal(format!("unknown handle {}", handle.0)))?;
        if !state.connected {
            return Err(GatewayError::Internal(format!(
                "browser {} is disconnected",
                handle.0
            )));
        }
        state.pages.insert(id.clone());
        Ok(PageHandle(id))
    }

    async fn close_page(&self, page: &PageHandle) -> GatewayResult<()> {
        let mut browsers = self.browsers.lock();
        for state in browsers.values_mut() {
            if state.pages.remove(&page.0) {
                return Ok(());
            }
        }
        Err(GatewayError::Internal(format!("unknown page {}", page.0)))
    }

    async fn pid(&self, handle: &BrowserHandle) -> Option<u32> {
        self.browsers
            .lock()
            .contains_key(&handle.0)
            .then(|| handle.0.as_bytes().iter().map(|b| *b as u32).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_then_close_round_trips() {
        let driver = MockDriver::new();
        let handle = driver.launch(&Value::Null).await.unwrap();
        assert!(driver.is_connected(&handle).await);
        assert_eq!(driver.live_browser_count(), 1);
        driver.close(&handle).await.unwrap();
        assert_eq!(driver.live_browser_count(), 0);
    }

    #[tokio::test]
    async fn fail_next_launches_then_recovers() {
        let driver = MockDriver::new();
        driver.fail_next_launches(2);
        assert!(driver.launch(&Value::Null).await.is_err());
        assert!(driver.launch(&Value::Null).await.is_err());
        assert!(driver.launch(&Value::Null).await.is_ok());
    }

    #[tokio::test]
    async fn disconnect_marks_unresponsive_and_blocks_new_pages() {
        let driver = MockDriver::new();
        let handle = driver.launch(&Value::Null).await.unwrap();
        driver.disconnect(&handle);
        assert!(!driver.is_connected(&handle).await);
        assert!(driver.new_page(&handle).await.is_err());
    }

    #[tokio::test]
    async fn close_page_finds_it_without_needing_the_owning_browser() {
        let driver = MockDriver::new();
        let handle = driver.launch(&Value::Null).await.unwrap();
        let page = driver.new_page(&handle).await.unwrap();
        assert_eq!(driver.pages(&handle).await.unwrap().len(), 1);
        driver.close_page(&page).await.unwrap();
        assert_eq!(driver.pages(&handle).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn operations_against_unknown_handle_fail() {
        let driver = MockDriver::new();
        let bogus = BrowserHandle("nonexistent".into());
        assert!(driver.version(&bogus).await.is_err());
        assert!(driver.pages(&bogus).await.is_err());
    }
}
