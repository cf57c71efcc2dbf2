//! Remote call policy: deadline, retry, and circuit breaker composed
//! explicitly around each collaborator call site.

use std::time::Duration;

use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitOpen, RetryPolicy};
use thiserror::Error;

use crate::services::ClientError;

/// Why a guarded remote call ultimately failed.
///
/// All variants are treated as a step failure by the orchestrator; none of
/// them hang the saga.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// The collaborator could not be reached, after retries.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },

    /// The call did not answer within its deadline, after retries.
    #[error("{collaborator} call exceeded {deadline_ms} ms deadline")]
    DeadlineExceeded {
        collaborator: &'static str,
        deadline_ms: u64,
    },

    /// The breaker is open; the collaborator was not called at all.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),
}

/// Per-collaborator call policy configuration.
#[derive(Debug, Clone)]
pub struct RemoteCallConfig {
    /// Deadline applied to every individual attempt.
    pub deadline: Duration,
    /// Retry policy for transport-level failures.
    pub retry: RetryPolicy,
    /// Circuit breaker thresholds.
    pub breaker: CircuitBreakerConfig,
}

impl Default for RemoteCallConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(10),
            retry: RetryPolicy::with_max_attempts(3),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Wraps calls to one collaborator with a deadline, bounded retries, and a
/// circuit breaker.
///
/// Only transport failures (unreachable, deadline) are retried and fed to
/// the breaker; business rejections come back inside the response and pass
/// through untouched. An open breaker fails fast without retrying.
pub struct RemoteCallPolicy {
    collaborator: &'static str,
    deadline: Duration,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl RemoteCallPolicy {
    /// Creates a policy for the named collaborator.
    pub fn new(collaborator: &'static str, config: RemoteCallConfig) -> Self {
        Self {
            collaborator,
            deadline: config.deadline,
            retry: config.retry,
            breaker: CircuitBreaker::new(collaborator, config.breaker),
        }
    }

    /// Returns the guarded collaborator name.
    pub fn collaborator(&self) -> &'static str {
        self.collaborator
    }

    /// Returns the circuit breaker, for observability.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs one guarded call.
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, CallError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, ClientError>>,
    {
        self.retry
            .run(
                |e: &CallError| {
                    let retryable = !matches!(e, CallError::CircuitOpen(_));
                    if retryable {
                        metrics::counter!(
                            "remote_call_failures_total",
                            "collaborator" => self.collaborator
                        )
                        .increment(1);
                    }
                    retryable
                },
                || async {
                    self.breaker.allow_request()?;

                    match tokio::time::timeout(self.deadline, operation()).await {
                        Ok(Ok(response)) => {
                            self.breaker.record_success();
                            Ok(response)
                        }
                        Ok(Err(ClientError::Unavailable(reason))) => {
                            self.breaker.record_failure();
                            Err(CallError::Unavailable {
                                collaborator: self.collaborator,
                                reason,
                            })
                        }
                        Err(_) => {
                            self.breaker.record_failure();
                            Err(CallError::DeadlineExceeded {
                                collaborator: self.collaborator,
                                deadline_ms: self.deadline.as_millis() as u64,
                            })
                        }
                    }
                },
            )
            .await
    }
}
