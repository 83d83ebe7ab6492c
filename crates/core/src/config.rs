//! Runtime configuration.
//!
//! Defaults for parameters the specification leaves open per handler
//! (rate limit, circuit thresholds, sweep intervals, cache TTL, WAL
//! durability mode). A handler descriptor's own `rate_limit` field, where
//! present, overrides [`RateLimitConfig`] defaults for that event.

use serde::{Deserialize, Serialize};

/// Sliding-window rate limit defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admitted calls per window.
    pub limit: u32,
    /// Window length, milliseconds.
    pub window_ms: u64,
    /// Record an admitted timestamp when the body succeeds.
    pub skip_successful_requests: bool,
    /// Record an admitted timestamp when the body fails.
    pub skip_failed_requests: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_ms: 1_000,
            skip_successful_requests: false,
            skip_failed_requests: false,
        }
    }
}

/// Circuit breaker defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive/windowed failures before tripping to `Open`.
    pub threshold: u32,
    /// Base backoff, milliseconds, before the first half-open probe.
    pub base_timeout_ms: u64,
    /// Exponential backoff multiplier applied per re-open.
    pub multiplier: f64,
    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,
    /// Maximum concurrent probes admitted while half-open.
    pub half_open_limit: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            base_timeout_ms: 30_000,
            multiplier: 2.0,
            success_threshold: 3,
            half_open_limit: 1,
        }
    }
}

/// Timeout middleware defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Wall-clock budget per call, milliseconds.
    pub limit_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { limit_ms: 5_000 }
    }
}

/// Instance lifecycle defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Time-to-live applied on registration and refreshed on heartbeat.
    pub ttl_ms: u64,
    /// Interval at which the liveness sweeper scans for expired instances.
    pub sweep_interval_ms: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 30_000,
            sweep_interval_ms: 5_000,
        }
    }
}

/// Delayed-task sweep defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSweepConfig {
    /// A pending task older than this is eligible for auto-assignment.
    pub delay_ms: u64,
    /// Maximum tasks rescued per sweep.
    pub max_tasks: u32,
    /// Interval between sweeps.
    pub interval_ms: u64,
}

impl Default for TaskSweepConfig {
    fn default() -> Self {
        Self {
            delay_ms: 10_000,
            max_tasks: 50,
            interval_ms: 2_000,
        }
    }
}

/// Response cache default TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default cache TTL, milliseconds, for descriptors that opt in.
    pub default_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 1_000,
        }
    }
}

/// Write-ahead log durability mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurabilityMode {
    /// fsync on every commit.
    Sync,
    /// fsync on a background interval; bounded data loss on crash.
    Batched,
}

/// Top-level runtime configuration, constructed programmatically or
/// deserialized from a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeBenchConfig {
    /// Rate limiter defaults.
    pub rate_limit: RateLimitConfig,
    /// Circuit breaker defaults.
    pub circuit: CircuitConfig,
    /// Timeout middleware defaults.
    pub timeout: TimeoutConfig,
    /// Instance lifecycle defaults.
    pub instance: InstanceConfig,
    /// Delayed-task sweep defaults.
    pub task_sweep: TaskSweepConfig,
    /// Response cache defaults.
    pub cache: CacheConfig,
    /// WAL durability mode.
    pub durability_mode: DurabilityMode,
}

impl Default for ClaudeBenchConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            circuit: CircuitConfig::default(),
            timeout: TimeoutConfig::default(),
            instance: InstanceConfig::default(),
            task_sweep: TaskSweepConfig::default(),
            cache: CacheConfig::default(),
            durability_mode: DurabilityMode::Batched,
        }
    }
}
