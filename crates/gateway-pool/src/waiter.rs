//! A pending acquisition request parked on the `WaiterQueue`.

use gateway_types::{BrowserInstance, GatewayResult, SessionId, TimestampMs};
use tokio::sync::oneshot;

pub struct Waiter {
    pub session_id: SessionId,
    pub arrival: TimestampMs,
    pub deadline: TimestampMs,
    /// Monotonically assigned, used as the FIFO tie-break for simultaneous
    /// arrivals.
    pub seq: u64,
    pub tx: oneshot::Sender<GatewayResult<BrowserInstance>>,
}
