//! Environment-based configuration for the engine and pipeline adapter.
//!
//! Everything has a hard-coded default so the library works out of the box;
//! deployments override through the environment (a `.env` file is honored).

use std::env;

/// Read the current runtime environment (`production`, `sandbox`, ...).
pub fn get_environment() -> String {
    dotenvy::dotenv().ok();
    env::var("SIGNATRIX_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tunables for the condition evaluation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently evaluating conditions in a batch.
    pub max_concurrency: usize,
    /// Per-condition deadline when the context carries no tighter budget.
    pub default_timeout_ms: u64,
    /// TTL for cached condition results.
    pub cache_ttl_ms: i64,
    /// Disable to force every evaluation to run fresh.
    pub cache_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            default_timeout_ms: 5_000,
            cache_ttl_ms: 30_000,
            cache_enabled: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            max_concurrency: env_usize("SIGNATRIX_MAX_CONCURRENCY", defaults.max_concurrency),
            default_timeout_ms: env_u64("SIGNATRIX_EVAL_TIMEOUT_MS", defaults.default_timeout_ms),
            cache_ttl_ms: env_u64("SIGNATRIX_ENGINE_CACHE_TTL_MS", defaults.cache_ttl_ms as u64)
                as i64,
            cache_enabled: env::var("SIGNATRIX_ENGINE_CACHE")
                .map(|v| v != "off" && v != "0" && v != "false")
                .unwrap_or(defaults.cache_enabled),
        }
    }
}

/// Tunables for the indicator pipeline adapter.
///
/// The adapter TTL is deliberately shorter than the engine-wide cache TTL:
/// indicator results go stale with every candle, condition verdicts do not.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cache_ttl_ms: i64,
    pub max_cache_size: usize,
    /// Updates landing within this many ms of the last applied update for
    /// the same indicator are coalesced/dropped.
    pub update_throttle_ms: i64,
    /// How many results per indicator are retained for lookback queries.
    pub history_window: usize,
    /// Capacity of each subscriber's event channel.
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 5_000,
            max_cache_size: 256,
            update_throttle_ms: 100,
            history_window: 128,
            event_buffer: 64,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            cache_ttl_ms: env_u64("SIGNATRIX_PIPELINE_CACHE_TTL_MS", defaults.cache_ttl_ms as u64)
                as i64,
            max_cache_size: env_usize("SIGNATRIX_PIPELINE_CACHE_SIZE", defaults.max_cache_size),
            update_throttle_ms: env_u64(
                "SIGNATRIX_UPDATE_THROTTLE_MS",
                defaults.update_throttle_ms as u64,
            ) as i64,
            history_window: env_usize("SIGNATRIX_HISTORY_WINDOW", defaults.history_window),
            event_buffer: env_usize("SIGNATRIX_EVENT_BUFFER", defaults.event_buffer),
        }
    }
}
