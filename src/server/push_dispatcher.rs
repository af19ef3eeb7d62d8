//! Push-notification dispatcher — delivers task events to registered webhooks.
//!
//! Structurally this is just one more [`EventConsumer`]: it taps a task's
//! event queue exactly like an SSE or gRPC stream would, and for every event
//! POSTs the payload to each webhook registered for that task.

use std::time::Duration;

use tracing::warn;

use crate::error::A2AResult;
use crate::types::{StreamResponse, TaskPushNotificationConfig};

use super::event_queue::{EventConsumer, EventQueue};
use super::task_store::TaskStore;

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_DELAY_MS: u64 = 200;
const MAX_DELAY_MS: u64 = 5_000;

/// Subscribes to a task's event stream and forwards events to its registered
/// push-notification webhooks, with bounded exponential backoff on retryable
/// failures.
pub struct PushDispatcher {
    client: reqwest::Client,
    store: std::sync::Arc<dyn TaskStore>,
}

impl PushDispatcher {
    pub fn new(store: std::sync::Arc<dyn TaskStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            store,
        }
    }

    /// Consume every event from `queue` for `task_id`, delivering each to the
    /// task's registered webhooks. Returns once the queue closes.
    pub async fn run(&self, task_id: &str, queue: EventQueue) -> A2AResult<()> {
        let mut consumer = EventConsumer::new(queue);
        while let Some(event) = consumer.next_event().await {
            self.deliver(task_id, &event).await;
        }
        Ok(())
    }

    async fn deliver(&self, task_id: &str, event: &StreamResponse) {
        let configs = match self.store.list_push_configs(task_id).await {
            Ok(configs) => configs,
            Err(e) => {
                warn!(task_id, error = %e, "failed to load push configs");
                return;
            }
        };
        for config in configs {
            self.deliver_one(task_id, &config, event).await;
        }
    }

    async fn deliver_one(
        &self,
        task_id: &str,
        config: &TaskPushNotificationConfig,
        event: &StreamResponse,
    ) {
        let url = config.push_notification_config.url.clone();
        let token = config.push_notification_config.token.clone();

        for attempt in 0..MAX_ATTEMPTS {
            let mut request = self.client.post(&url).json(event);
            if let Some(ref token) = token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => return,
                Ok(response) if response.status().is_client_error() => {
                    warn!(
                        task_id,
                        url,
                        status = %response.status(),
                        "push delivery rejected by webhook, not retrying"
                    );
                    return;
                }
                Ok(response) => {
                    warn!(task_id, url, status = %response.status(), attempt, "push delivery failed");
                }
                Err(e) => {
                    warn!(task_id, url, error = %e, attempt, "push delivery request failed");
                }
            }

            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        warn!(task_id, url, attempts = MAX_ATTEMPTS, "push delivery exhausted retries");
    }
}

/// `initial_delay * 2^attempt`, capped at `MAX_DELAY_MS`, with up to 20%
/// jitter so a burst of failing webhooks doesn't retry in lockstep.
fn backoff_delay(attempt: u32) -> Duration {
    let base = INITIAL_DELAY_MS.saturating_mul(1u64 << attempt.min(16));
    let capped = base.min(MAX_DELAY_MS);
    let jitter = (capped / 5).max(1);
    let jittered = capped.saturating_sub(jitter / 2) + (attempt as u64 * 37) % jitter;
    Duration::from_millis(jittered)
}
