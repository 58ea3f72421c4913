//! Health Monitor.
//!
//! OS-level sampling is best-effort: a failure to
//! read memory/CPU leaves those `HealthRecord` fields `None` rather than
//! failing the whole check. Modeled on `riptide-api`'s sysinfo usage
//! (`src/health.rs`'s `get_memory_usage`/`get_load_average`), trimmed to
//! per-pid sampling since that's all a single browser instance needs.

use std::time::Duration;

use gateway_types::{now_ms, BrowserHandle, HealthRecord, HealthVerdict, HostUsage, LifecycleDriver};
use sysinfo::{Pid, System};
use tracing::debug;

pub struct HealthMonitor {
    response_timeout_ms: u64,
}

impl HealthMonitor {
    pub fn new(response_timeout_ms: u64) -> Self {
        Self { response_timeout_ms }
    }

    /// Performs one check cycle against a single instance: connection
    /// check, bounded round-trip, page count, best-effort resource sample.
    pub async fn check(
        &self,
        driver: &dyn LifecycleDriver,
        handle: &BrowserHandle,
        pid: Option<u32>,
        previous: Option<&HealthRecord>,
    ) -> HealthRecord {
        let now = now_ms();
        let connected = driver.is_connected(handle).await;

        let responsive = if connected {
            tokio::time::timeout(
                Duration::from_millis(self.response_timeout_ms),
                driver.version(handle),
            )
            .await
            .is_ok_and(|r| r.is_ok())
        } else {
            false
        };

        let open_pages = if connected {
            driver.pages(handle).await.ok().map(|p| p.len())
        } else {
            None
        };

        let (memory_mb, cpu_percent) = pid.map(sample_process).unwrap_or((None, None));

        let healthy = connected && responsive;
        let consecutive_unhealthy = if healthy {
            0
        } else {
            previous.map(|p| p.consecutive_unhealthy + 1).unwrap_or(1)
        };

        let last_error = if !connected {
            Some("driver reports not connected".to_string())
        } else if !responsive {
            Some("version round-trip exceeded response timeout".to_string())
        } else {
            None
        };

        if !healthy {
            debug!(connected, responsive, consecutive_unhealthy, "health check: unhealthy");
        }

        HealthRecord {
            healthy,
            responsive,
            memory_mb,
            cpu_percent,
            open_pages,
            last_check_at: now,
            last_error,
            consecutive_unhealthy,
        }
    }

    /// Three consecutive unhealthy results, or a single hard disconnect,
    /// escalate.
    pub fn verdict(record: &HealthRecord) -> HealthVerdict {
        if !record.responsive && record.last_error.as_deref() == Some("driver reports not connected") {
            return HealthVerdict::Escalate;
        }
        if record.consecutive_unhealthy >= 3 {
            return HealthVerdict::Escalate;
        }
        if !record.healthy {
            return HealthVerdict::Degraded;
        }
        HealthVerdict::Ok
    }
}

/// Host-level CPU/memory/load, sampled once per health tick rather than
/// per instance. Modeled on `riptide-api`'s `get_memory_usage`/
/// `get_load_average`.
pub fn sample_host() -> HostUsage {
    let mut system = System::new();
    system.refresh_cpu_usage();
    system.refresh_memory();
    let used_mb = system.used_memory() / (1024 * 1024);
    let total_mb = system.total_memory() / (1024 * 1024);
    HostUsage {
        cpu_usage_percent: system.global_cpu_usage(),
        memory_used_mb: used_mb,
        memory_free_mb: total_mb.saturating_sub(used_mb),
        load_average: System::load_average().one as f32,
    }
}

fn sample_process(pid: u32) -> (Option<u64>, Option<f32>) {
    let mut system = System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::All, false);
    match system.process(Pid::from_u32(pid)) {
        Some(process) => (
            Some(process.memory() / (1024 * 1024)),
            Some(process.cpu_usage()),
        ),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::{BrowserHandle, GatewayResult, PageHandle};
    use async_trait::async_trait;
    use serde_json::Value;

    struct AlwaysDisconnected;

    #[async_trait]
    impl LifecycleDriver for AlwaysDisconnected {
        async fn launch(&self, _: &Value) -> GatewayResult<BrowserHandle> {
            unreachable!()
        }
        async fn close(&self, _: &BrowserHandle) -> GatewayResult<()> {
            Ok(())
        }
        async fn is_connected(&self, _: &BrowserHandle) -> bool {
            false
        }
        async fn version(&self, _: &BrowserHandle) -> GatewayResult<String> {
            unreachable!()
        }
        async fn pages(&self, _: &BrowserHandle) -> GatewayResult<Vec<PageHandle>> {
            unreachable!()
        }
        async fn new_page(&self, _: &BrowserHandle) -> GatewayResult<PageHandle> {
            unreachable!()
        }
        async fn close_page(&self, _: &PageHandle) -> GatewayResult<()> {
            Ok(())
        }
        async fn pid(&self, _: &BrowserHandle) -> Option<u32> {
            None
        }
    }

    #[tokio::test]
    async fn disconnected_instance_escalates_immediately() {
        let monitor = HealthMonitor::new(1_000);
        let record = monitor
            .check(&AlwaysDisconnected, &BrowserHandle("x".into()), None, None)
            .await;
        assert!(!record.healthy);
        assert_eq!(HealthMonitor::verdict(&record), HealthVerdict::Escalate);
    }

    #[tokio::test]
    async fn three_consecutive_unhealthy_escalates() {
        let monitor = HealthMonitor::new(1_000);
        let mut record = monitor
            .check(&AlwaysDisconnected, &BrowserHandle("x".into()), None, None)
            .await;
        for _ in 0..2 {
            record = monitor
                .check(&AlwaysDisconnected, &BrowserHandle("x".into()), None, Some(&record))
                .await;
        }
        assert!(record.consecutive_unhealthy >= 3);
        assert_eq!(HealthMonitor::verdict(&record), HealthVerdict::Escalate);
    }
}
