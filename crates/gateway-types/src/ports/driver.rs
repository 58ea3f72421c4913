//! Lifecycle Driver port.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::GatewayResult;

/// Opaque handle to a launched browser process. The driver owns what this
/// actually is (a CDP connection, a PID, …); the pool only ever threads it
/// back through the same trait.
#[derive(Debug, Clone)]
pub struct BrowserHandle(pub String);

#[derive(Debug, Clone)]
pub struct PageHandle(pub String);

/// Abstraction over the underlying browser-automation driver.
/// Implementing the automation protocol itself is explicitly out of scope
/// — this trait is the seam where that protocol would
/// plug in.
#[async_trait]
pub trait LifecycleDriver: Send + Sync {
    /// Launch a new browser process. `options` is opaque, passed straight
    /// from configuration (`launchOptions`).
    async fn launch(&self, options: &Value) -> GatewayResult<BrowserHandle>;

    async fn close(&self, handle: &BrowserHandle) -> GatewayResult<()>;

    async fn is_connected(&self, handle: &BrowserHandle) -> bool;

    async fn version(&self, handle: &BrowserHandle) -> GatewayResult<String>;

    async fn pages(&self, handle: &BrowserHandle) -> GatewayResult<Vec<PageHandle>>;

    async fn new_page(&self, handle: &BrowserHandle) -> GatewayResult<PageHandle>;

    async fn close_page(&self, page: &PageHandle) -> GatewayResult<()>;

    async fn pid(&self, handle: &BrowserHandle) -> Option<u32>;
}
