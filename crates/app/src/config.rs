//! Application configuration loaded from environment variables.

use std::time::Duration;

use inventory::ReservationConfig;
use outbox::OutboxConfig;
use resilience::{CircuitBreakerConfig, RetryPolicy};
use saga::{OrchestratorConfig, RemoteCallConfig};

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `RESERVATION_TTL_SECS` — how long a reservation holds stock (default: `900`)
/// - `EXPIRY_SWEEP_INTERVAL_SECS` — expiry sweep period (default: `60`)
/// - `OUTBOX_POLL_INTERVAL_MS` — outbox poll period (default: `5000`)
/// - `OUTBOX_BATCH_SIZE` — rows drained per poll (default: `100`)
/// - `RETRY_MAX_ATTEMPTS` / `RETRY_BASE_DELAY_MS` / `RETRY_MAX_DELAY_MS` —
///   optimistic-lock retry bounds (defaults: `5` / `100` / `2000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub reservation_ttl: Duration,
    pub sweep_interval: Duration,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: usize,
    pub conflict_retry: RetryPolicy,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            reservation_ttl: Duration::from_secs(env_u64("RESERVATION_TTL_SECS", 900)),
            sweep_interval: Duration::from_secs(env_u64("EXPIRY_SWEEP_INTERVAL_SECS", 60)),
            outbox_poll_interval: Duration::from_millis(env_u64("OUTBOX_POLL_INTERVAL_MS", 5000)),
            outbox_batch_size: env_u64("OUTBOX_BATCH_SIZE", 100) as usize,
            conflict_retry: RetryPolicy {
                max_attempts: env_u64("RETRY_MAX_ATTEMPTS", 5) as u32,
                base_delay: Duration::from_millis(env_u64("RETRY_BASE_DELAY_MS", 100)),
                multiplier: 2.0,
                max_delay: Duration::from_millis(env_u64("RETRY_MAX_DELAY_MS", 2000)),
            },
        }
    }

    /// Reservation engine configuration.
    pub fn reservation(&self) -> ReservationConfig {
        ReservationConfig {
            reservation_ttl: self.reservation_ttl,
            retry: self.conflict_retry.clone(),
        }
    }

    /// Outbox publisher configuration.
    pub fn outbox(&self) -> OutboxConfig {
        OutboxConfig {
            poll_interval: self.outbox_poll_interval,
            batch_size: self.outbox_batch_size,
        }
    }

    /// Per-collaborator call policies.
    ///
    /// Payment gets a longer deadline and a more tolerant breaker than
    /// inventory; user validation sits on the defaults.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            user: RemoteCallConfig {
                deadline: Duration::from_secs(10),
                retry: RetryPolicy::with_max_attempts(3),
                breaker: CircuitBreakerConfig::default(),
            },
            inventory: RemoteCallConfig {
                deadline: Duration::from_secs(5),
                retry: RetryPolicy::with_max_attempts(3),
                breaker: CircuitBreakerConfig {
                    failure_rate_threshold: 0.4,
                    sliding_window_size: 15,
                    minimum_calls: 5,
                    open_cooldown: Duration::from_secs(5),
                    half_open_probes: 3,
                },
            },
            payment: RemoteCallConfig {
                deadline: Duration::from_secs(15),
                retry: RetryPolicy::with_max_attempts(3),
                breaker: CircuitBreakerConfig {
                    failure_rate_threshold: 0.6,
                    sliding_window_size: 20,
                    minimum_calls: 10,
                    open_cooldown: Duration::from_secs(30),
                    half_open_probes: 3,
                },
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            reservation_ttl: Duration::from_secs(900),
            sweep_interval: Duration::from_secs(60),
            outbox_poll_interval: Duration::from_millis(5000),
            outbox_batch_size: 100,
            conflict_retry: RetryPolicy::default(),
        }
    }
}
