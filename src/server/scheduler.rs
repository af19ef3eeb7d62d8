//! Scheduler — enqueues agent runs and tracks their cancellation tokens.
//!
//! A thin layer over [`QueueManager`] and [`EventQueue`] that gives the
//! request handler one place to look up "is this task currently running,
//! and if so, how do I ask it to stop." At most one execution is tracked
//! per task id at a time — a second `enqueue_run` for the same id returns
//! the existing run's queue rather than starting a duplicate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::A2AResult;
use crate::types::StreamResponse;

use super::event_queue::{EventQueue, InMemoryQueueManager, QueueManager};

/// A task's run-state: its event queue and cooperative cancellation handle.
#[derive(Clone)]
pub struct RunHandle {
    pub event_queue: EventQueue,
    pub cancellation_token: CancellationToken,
}

/// Schedules agent runs and exposes their event streams and cancellation.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Register a new run for `task_id`, or return the existing one.
    ///
    /// Idempotent: calling this twice for the same task id while the first
    /// run is still active returns the same [`RunHandle`].
    async fn enqueue_run(&self, task_id: &str) -> RunHandle;

    /// Look up the run handle for a task id, if a run is currently tracked.
    async fn lookup(&self, task_id: &str) -> Option<RunHandle>;

    /// Publish an event for a task's run.
    async fn publish(&self, task_id: &str, event: StreamResponse) -> A2AResult<()>;

    /// Request cooperative cancellation of a task's run.
    ///
    /// No-op if no run is tracked for the task — the caller is expected to
    /// have already checked the task exists via storage.
    async fn cancel(&self, task_id: &str);

    /// Stop tracking a task's run once it has reached a terminal state.
    async fn finish(&self, task_id: &str);
}

/// In-memory [`Scheduler`] built on [`InMemoryQueueManager`].
pub struct InMemoryScheduler {
    queues: InMemoryQueueManager,
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self {
            queues: InMemoryQueueManager::new(),
            tokens: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for InMemoryScheduler {
    async fn enqueue_run(&self, task_id: &str) -> RunHandle {
        let event_queue = self.queues.create_or_tap(task_id).await;
        let cancellation_token = {
            let mut tokens = self.tokens.lock().await;
            tokens
                .entry(task_id.to_string())
                .or_insert_with(CancellationToken::new)
                .clone()
        };
        RunHandle {
            event_queue,
            cancellation_token,
        }
    }

    async fn lookup(&self, task_id: &str) -> Option<RunHandle> {
        let event_queue = self.queues.get(task_id).await?;
        let cancellation_token = {
            let tokens = self.tokens.lock().await;
            tokens.get(task_id).cloned().unwrap_or_default()
        };
        Some(RunHandle {
            event_queue,
            cancellation_token,
        })
    }

    async fn publish(&self, task_id: &str, event: StreamResponse) -> A2AResult<()> {
        if let Some(queue) = self.queues.get(task_id).await {
            queue.enqueue_event(event).await?;
        }
        Ok(())
    }

    async fn cancel(&self, task_id: &str) {
        let tokens = self.tokens.lock().await;
        if let Some(token) = tokens.get(task_id) {
            token.cancel();
        }
    }

    async fn finish(&self, task_id: &str) {
        let _ = self.queues.close(task_id).await;
        let mut tokens = self.tokens.lock().await;
        tokens.remove(task_id);
    }
}

/// Convenience constructor for sharing a scheduler across handlers.
pub fn new_in_memory_scheduler() -> Arc<dyn Scheduler> {
    Arc::new(InMemoryScheduler::new())
}
