//! Dispatch readings to the endpoint with bounded retries.
//!
//! - Empty endpoint fails fast without touching the network
//! - At most `max_in_flight` POSTs run at once; further callers wait their turn.
//!   The permit covers one attempt, so a delivery in backoff does not hold a slot
//! - Transport errors and 5xx replies are retried with exponential backoff
//! - Every outcome is handed to the NotificationSink

use crate::domain::{DeliveryOutcome, DomainError, EndpointConfig, Reading};
use crate::ports::DeliveryTransport;
use crate::usecases::NotificationSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub const NO_ENDPOINT_REASON: &str = "no endpoint configured";

/// Default cap on concurrent deliveries.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Bounded exponential backoff: attempt N waits `base_delay * factor^(N-1)` before N+1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(self.factor.max(1).saturating_pow(exp))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            factor: 2,
        }
    }
}

/// How HTTP status codes map to outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Any received response counts as delivered.
    AnyResponse,
    /// Only 2xx counts; 5xx is retried, other codes fail immediately.
    #[default]
    RequireSuccess,
}

/// Why one attempt failed, and whether another is worth it.
struct AttemptFailure {
    reason: String,
    retryable: bool,
}

pub struct DeliveryQueue {
    transport: Arc<dyn DeliveryTransport>,
    notifications: Arc<NotificationSink>,
    retry: RetryPolicy,
    status_policy: StatusPolicy,
    permits: Semaphore,
}

impl DeliveryQueue {
    pub fn new(
        transport: Arc<dyn DeliveryTransport>,
        notifications: Arc<NotificationSink>,
        retry: RetryPolicy,
        status_policy: StatusPolicy,
        max_in_flight: usize,
    ) -> Self {
        Self {
            transport,
            notifications,
            retry,
            status_policy,
            permits: Semaphore::new(max_in_flight.max(1)),
        }
    }

    /// Deliver one reading and report the outcome. Never fails; failures are outcomes.
    pub async fn enqueue(&self, reading: Reading, endpoint: &EndpointConfig) -> DeliveryOutcome {
        let outcome = self.deliver(reading, endpoint).await;
        self.notifications.report(&outcome);
        outcome
    }

    async fn deliver(&self, reading: Reading, endpoint: &EndpointConfig) -> DeliveryOutcome {
        if !endpoint.is_set() {
            debug!("delivery skipped: {}", NO_ENDPOINT_REASON);
            return DeliveryOutcome::Failure(NO_ENDPOINT_REASON.to_string());
        }

        let payload = reading.to_payload();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = {
                let Ok(_permit) = self.permits.acquire().await else {
                    return DeliveryOutcome::Failure("delivery queue closed".to_string());
                };
                self.transport.post_json(&endpoint.url, &payload).await
            };
            match self.classify(result) {
                Ok(status) => {
                    info!(
                        url = %endpoint.url,
                        status,
                        attempt,
                        timestamp = payload.timestamp,
                        "location delivered"
                    );
                    return DeliveryOutcome::Success;
                }
                Err(failure) if failure.retryable && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        url = %endpoint.url,
                        attempt,
                        max_attempts,
                        reason = %failure.reason,
                        delay_ms = delay.as_millis() as u64,
                        "delivery attempt failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    warn!(
                        url = %endpoint.url,
                        attempt,
                        reason = %failure.reason,
                        "delivery failed"
                    );
                    return DeliveryOutcome::Failure(failure.reason);
                }
            }
        }
    }

    fn classify(&self, result: Result<u16, DomainError>) -> Result<u16, AttemptFailure> {
        match result {
            Ok(status) => match self.status_policy {
                StatusPolicy::AnyResponse => Ok(status),
                StatusPolicy::RequireSuccess if (200..300).contains(&status) => Ok(status),
                StatusPolicy::RequireSuccess => Err(AttemptFailure {
                    reason: format!("server responded with status {}", status),
                    retryable: status >= 500,
                }),
            },
            Err(DomainError::Transport(reason)) => Err(AttemptFailure {
                reason,
                retryable: true,
            }),
            Err(e) => Err(AttemptFailure {
                reason: e.to_string(),
                retryable: false,
            }),
        }
    }
}
