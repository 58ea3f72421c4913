//! # Gateway Types
//!
//! Shared data model, error taxonomy, and port traits for the browser
//! gateway. Every other crate in the workspace depends on this one;
//! it depends on nothing workspace-internal, which is what keeps the
//! pool, driver, events, and session crates from forming a dependency
//! cycle.

pub mod circuit;
pub mod errors;
pub mod health;
pub mod ids;
pub mod instance;
pub mod metrics;
pub mod ports;
pub mod recycling;
pub mod scaling;

pub use circuit::{CircuitState, CircuitStateKind};
pub use errors::{ErrorCategory, ErrorSeverity, GatewayError, GatewayResult};
pub use health::{HealthRecord, HealthVerdict, HostUsage, ResourceUsage};
pub use ids::{BrowserId, PageId, SessionId};
pub use instance::{now_ms, BrowserInstance, InstanceState, TimestampMs};
pub use metrics::{Alert, AlertSeverity, MetricPoint, PoolMetricsSnapshot, SeriesStats};
pub use ports::{
    Actor, AuditRecord, AuditResult, BrowserHandle, GatewayEvent, LifecycleDriver, NullObserver,
    PageHandle, PoolConfig, PoolObserver, RecyclerWeights, SessionRecord, SessionStore,
};
pub use recycling::{RecyclingCandidate, RecyclingEvent, RecycleReason, Urgency};
pub use scaling::{ScalingDecision, ScalingKind, ScalingSignals};
