//! Environment variable loading, modeled on `riptide-config`'s
//! `EnvConfigLoader` (`src/env.rs`), trimmed to the `GATEWAY_`-prefixed
//! keys the pool configuration table names.

use std::env;

use gateway_types::{GatewayError, GatewayResult, PoolConfig, RecyclerWeights};
use thiserror::Error;
use tracing::{info, warn};

const PREFIX: &str = "GATEWAY_";

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Reads a single `GATEWAY_`-prefixed variable, falling back to `default`
/// when unset.
struct EnvLoader;

impl EnvLoader {
    fn var_name(key: &str) -> String {
        format!("{PREFIX}{key}")
    }

    fn get_uint(key: &str, default: u64) -> Result<u64, EnvError> {
        let name = Self::var_name(key);
        match env::var(&name) {
            Ok(raw) => raw.parse().map_err(|e| EnvError::InvalidValue {
                var: name,
                reason: format!("expected an unsigned integer: {e}"),
            }),
            Err(_) => Ok(default),
        }
    }

    fn get_usize(key: &str, default: usize) -> Result<usize, EnvError> {
        Self::get_uint(key, default as u64).map(|v| v as usize)
    }

    fn get_float(key: &str, default: f64) -> Result<f64, EnvError> {
        let name = Self::var_name(key);
        match env::var(&name) {
            Ok(raw) => raw.parse().map_err(|e| EnvError::InvalidValue {
                var: name,
                reason: format!("expected a number: {e}"),
            }),
            Err(_) => Ok(default),
        }
    }

    fn get_json(key: &str, default: serde_json::Value) -> Result<serde_json::Value, EnvError> {
        let name = Self::var_name(key);
        match env::var(&name) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| EnvError::InvalidValue {
                var: name,
                reason: format!("expected JSON: {e}"),
            }),
            Err(_) => Ok(default),
        }
    }
}

/// Loads `RecyclerWeights` by layering `GATEWAY_RECYCLER_WEIGHT_*` variables
/// over the supplied defaults, one variable per scoring signal.
fn load_recycler_weights(defaults: &RecyclerWeights) -> Result<RecyclerWeights, EnvError> {
    Ok(RecyclerWeights {
        age: EnvLoader::get_float("RECYCLER_WEIGHT_AGE", defaults.age)?,
        use_count: EnvLoader::get_float("RECYCLER_WEIGHT_USE_COUNT", defaults.use_count)?,
        memory: EnvLoader::get_float("RECYCLER_WEIGHT_MEMORY", defaults.memory)?,
        cpu: EnvLoader::get_float("RECYCLER_WEIGHT_CPU", defaults.cpu)?,
        unresponsive: EnvLoader::get_float(
            "RECYCLER_WEIGHT_UNRESPONSIVE",
            defaults.unresponsive,
        )?,
        page_leak: EnvLoader::get_float("RECYCLER_WEIGHT_PAGE_LEAK", defaults.page_leak)?,
        error_rate: EnvLoader::get_float("RECYCLER_WEIGHT_ERROR_RATE", defaults.error_rate)?,
    })
}

/// Loads a `PoolConfig` by layering `GATEWAY_*` environment variables over
/// `PoolConfig::default()`, then validates the result.
///
/// Unset variables keep the default; a present-but-unparsable variable is
/// an `InvalidConfig` error rather than a silent fallback, since that
/// almost always means a deployment typo.
pub fn load_from_env() -> GatewayResult<PoolConfig> {
    let defaults = PoolConfig::default();

    let to_gateway_err = |e: EnvError| GatewayError::InvalidConfig(e.to_string());

    let config = PoolConfig {
        max_browsers: EnvLoader::get_usize("MAX_BROWSERS", defaults.max_browsers)
            .map_err(to_gateway_err)?,
        min_browsers: EnvLoader::get_usize("MIN_BROWSERS", defaults.min_browsers)
            .map_err(to_gateway_err)?,
        max_pages_per_browser: EnvLoader::get_usize(
            "MAX_PAGES_PER_BROWSER",
            defaults.max_pages_per_browser,
        )
        .map_err(to_gateway_err)?,
        idle_timeout_ms: EnvLoader::get_uint("IDLE_TIMEOUT_MS", defaults.idle_timeout_ms)
            .map_err(to_gateway_err)?,
        health_check_interval_ms: EnvLoader::get_uint(
            "HEALTH_CHECK_INTERVAL_MS",
            defaults.health_check_interval_ms,
        )
        .map_err(to_gateway_err)?,
        response_timeout_ms: EnvLoader::get_uint(
            "RESPONSE_TIMEOUT_MS",
            defaults.response_timeout_ms,
        )
        .map_err(to_gateway_err)?,
        acquisition_timeout_ms: EnvLoader::get_uint(
            "ACQUISITION_TIMEOUT_MS",
            defaults.acquisition_timeout_ms,
        )
        .map_err(to_gateway_err)?,
        recycle_after_uses: EnvLoader::get_uint(
            "RECYCLE_AFTER_USES",
            defaults.recycle_after_uses,
        )
        .map_err(to_gateway_err)?,
        max_age_ms: EnvLoader::get_uint("MAX_AGE_MS", defaults.max_age_ms)
            .map_err(to_gateway_err)?,
        max_memory_per_browser_mb: EnvLoader::get_uint(
            "MAX_MEMORY_PER_BROWSER_MB",
            defaults.max_memory_per_browser_mb,
        )
        .map_err(to_gateway_err)?,
        max_cpu_per_browser: EnvLoader::get_float(
            "MAX_CPU_PER_BROWSER",
            defaults.max_cpu_per_browser as f64,
        )
        .map_err(to_gateway_err)? as f32,
        recycling_threshold: EnvLoader::get_uint(
            "RECYCLING_THRESHOLD",
            defaults.recycling_threshold as u64,
        )
        .map_err(to_gateway_err)? as u8,
        max_batch_size: EnvLoader::get_usize("MAX_BATCH_SIZE", defaults.max_batch_size)
            .map_err(to_gateway_err)?,
        scale_up_threshold: EnvLoader::get_float(
            "SCALE_UP_THRESHOLD",
            defaults.scale_up_threshold,
        )
        .map_err(to_gateway_err)?,
        scale_down_threshold: EnvLoader::get_float(
            "SCALE_DOWN_THRESHOLD",
            defaults.scale_down_threshold,
        )
        .map_err(to_gateway_err)?,
        max_scale_step: EnvLoader::get_usize("MAX_SCALE_STEP", defaults.max_scale_step)
            .map_err(to_gateway_err)?,
        failure_threshold: EnvLoader::get_uint(
            "FAILURE_THRESHOLD",
            defaults.failure_threshold,
        )
        .map_err(to_gateway_err)?,
        failure_rate_threshold: EnvLoader::get_float(
            "FAILURE_RATE_THRESHOLD",
            defaults.failure_rate_threshold,
        )
        .map_err(to_gateway_err)?,
        minimum_requests: EnvLoader::get_uint("MINIMUM_REQUESTS", defaults.minimum_requests)
            .map_err(to_gateway_err)?,
        recovery_timeout_ms: EnvLoader::get_uint(
            "RECOVERY_TIMEOUT_MS",
            defaults.recovery_timeout_ms,
        )
        .map_err(to_gateway_err)?,
        success_threshold: EnvLoader::get_uint(
            "SUCCESS_THRESHOLD",
            defaults.success_threshold,
        )
        .map_err(to_gateway_err)?,
        max_queue_length: EnvLoader::get_usize("MAX_QUEUE_LENGTH", defaults.max_queue_length)
            .map_err(to_gateway_err)?,
        emergency_queue_len: EnvLoader::get_usize(
            "EMERGENCY_QUEUE_LEN",
            defaults.emergency_queue_len,
        )
        .map_err(to_gateway_err)?,
        maintenance_tick_ms: EnvLoader::get_uint(
            "MAINTENANCE_TICK_MS",
            defaults.maintenance_tick_ms,
        )
        .map_err(to_gateway_err)?,
        recycling_cooldown_ms: EnvLoader::get_uint(
            "RECYCLING_COOLDOWN_MS",
            defaults.recycling_cooldown_ms,
        )
        .map_err(to_gateway_err)?,
        scale_up_cooldown_ms: EnvLoader::get_uint(
            "SCALE_UP_COOLDOWN_MS",
            defaults.scale_up_cooldown_ms,
        )
        .map_err(to_gateway_err)?,
        scale_down_cooldown_ms: EnvLoader::get_uint(
            "SCALE_DOWN_COOLDOWN_MS",
            defaults.scale_down_cooldown_ms,
        )
        .map_err(to_gateway_err)?,
        trend_window: EnvLoader::get_usize("TREND_WINDOW", defaults.trend_window)
            .map_err(to_gateway_err)?,
        launch_options: EnvLoader::get_json("LAUNCH_OPTIONS", defaults.launch_options)
            .map_err(to_gateway_err)?,
        recycler_weights: load_recycler_weights(&defaults.recycler_weights)
            .map_err(to_gateway_err)?,
    };

    config.validate().map_err(|e| {
        warn!(error = %e, "pool configuration failed validation");
        e
    })?;

    info!(
        max_browsers = config.max_browsers,
        min_browsers = config.min_browsers,
        "pool configuration loaded"
    );
    Ok(config)
}
