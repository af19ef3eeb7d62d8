//! Task store — persistence layer for A2A tasks.
//!
//! Mirrors Python SDK's `TaskStore(ABC)` and `InMemoryTaskStore` from
//! `a2a.server.tasks.task_store` and `a2a.server.tasks.inmemory_task_store`.
//!
//! The task store is responsible for persisting and retrieving [`Task`] objects.
//! The [`InMemoryTaskStore`] is provided for development and testing; production
//! deployments should implement the [`TaskStore`] trait backed by a database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{ContextSummary, Task, TaskPushNotificationConfig, TaskState};

/// Parameters for listing tasks with optional filtering and pagination.
#[derive(Debug, Clone, Default)]
pub struct TaskListParams {
    /// Filter tasks by context ID.
    pub context_id: Option<String>,

    /// Filter tasks by state.
    pub status: Option<Vec<TaskState>>,

    /// Maximum number of tasks to return per page.
    pub page_size: Option<usize>,

    /// Opaque token for pagination — the task ID to start after.
    pub page_token: Option<String>,
}

/// Response for a task listing request.
#[derive(Debug, Clone)]
pub struct TaskListResponse {
    /// The tasks matching the query.
    pub tasks: Vec<Task>,

    /// Token for the next page, if more results are available.
    pub next_page_token: Option<String>,
}

/// Trait for persisting and retrieving A2A tasks.
///
/// Implementations must be `Send + Sync` for use in async server contexts.
/// All methods take `&self` and use interior mutability for thread safety.
///
/// # Provided implementations
///
/// - [`InMemoryTaskStore`] — simple in-memory store (data lost on restart)
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Save or update a task in the store.
    ///
    /// If a task with the same ID already exists, it is overwritten.
    async fn save(&self, task: Task) -> A2AResult<()>;

    /// Retrieve a task by its ID.
    ///
    /// Returns `None` if the task does not exist.
    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>>;

    /// Delete a task by its ID.
    ///
    /// Silently succeeds if the task does not exist.
    async fn delete(&self, task_id: &str) -> A2AResult<()>;

    /// List tasks matching the given parameters.
    ///
    /// Supports filtering by context ID and status, and pagination via
    /// `page_size` and `page_token`.
    async fn list(&self, params: &TaskListParams) -> A2AResult<TaskListResponse>;

    /// List context summaries — one per distinct `context_id` observed
    /// across saved tasks, most recently touched first.
    async fn list_contexts(&self, limit: Option<i32>) -> A2AResult<Vec<ContextSummary>>;

    /// Delete every task belonging to a context.
    ///
    /// Returns the number of tasks removed. Clearing a context with no
    /// tasks is not an error — it removes zero tasks.
    async fn clear_context(&self, context_id: &str) -> A2AResult<usize>;

    /// Store (or replace) a push notification config for a task.
    async fn set_push_config(
        &self,
        task_id: &str,
        config: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// Fetch a single push notification config for a task by config id.
    ///
    /// When `config_id` is `None`, returns the first config registered for
    /// the task, matching the single-config convenience path most callers use.
    async fn get_push_config(
        &self,
        task_id: &str,
        config_id: Option<&str>,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// List every push notification config registered for a task.
    async fn list_push_configs(&self, task_id: &str) -> A2AResult<Vec<TaskPushNotificationConfig>>;

    /// Remove a push notification config by id.
    async fn delete_push_config(&self, task_id: &str, config_id: &str) -> A2AResult<()>;
}

/// In-memory task store backed by a `HashMap`.
///
/// Suitable for development, testing, and short-lived server instances.
/// All task data is lost when the process exits.
///
/// Thread-safe via `tokio::sync::RwLock`.
#[derive(Debug)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    /// Insertion order for deterministic listing/pagination.
    insertion_order: Arc<RwLock<Vec<String>>>,
    /// Push notification configs, keyed by task id.
    push_configs: Arc<RwLock<HashMap<String, Vec<TaskPushNotificationConfig>>>>,
}

impl InMemoryTaskStore {
    /// Create a new empty in-memory task store.
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            insertion_order: Arc::new(RwLock::new(Vec::new())),
            push_configs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: Task) -> A2AResult<()> {
        let task_id = task.id.clone();
        let mut tasks = self.tasks.write().await;
        let is_new = !tasks.contains_key(&task_id);
        tasks.insert(task_id.clone(), task);

        if is_new {
            let mut order = self.insertion_order.write().await;
            order.push(task_id.clone());
        }

        debug!(task_id = %task_id, is_new = is_new, "Task saved");
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        let tasks = self.tasks.read().await;
        let task = tasks.get(task_id).cloned();
        debug!(task_id = %task_id, found = task.is_some(), "Task lookup");
        Ok(task)
    }

    async fn delete(&self, task_id: &str) -> A2AResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(task_id).is_some() {
            let mut order = self.insertion_order.write().await;
            order.retain(|id| id != task_id);
            debug!(task_id = %task_id, "Task deleted");
        } else {
            warn!(task_id = %task_id, "Attempted to delete non-existent task");
        }
        Ok(())
    }

    async fn list(&self, params: &TaskListParams) -> A2AResult<TaskListResponse> {
        let tasks = self.tasks.read().await;
        let order = self.insertion_order.read().await;

        // Determine the starting position based on page_token.
        let start_idx = if let Some(ref token) = params.page_token {
            // page_token is the last task ID from the previous page.
            // Find its position and start after it.
            match order.iter().position(|id| id == token) {
                Some(pos) => pos + 1,
                None => {
                    // Invalid token — start from the beginning.
                    warn!(page_token = %token, "Invalid page token, starting from beginning");
                    0
                }
            }
        } else {
            0
        };

        let page_size = params.page_size.unwrap_or(usize::MAX);
        let mut result_tasks = Vec::new();
        let mut last_id: Option<String> = None;

        for id in order.iter().skip(start_idx) {
            if result_tasks.len() >= page_size {
                break;
            }

            if let Some(task) = tasks.get(id) {
                // Apply context_id filter.
                if let Some(ref ctx_id) = params.context_id {
                    if task.context_id != *ctx_id {
                        continue;
                    }
                }

                // Apply status filter.
                if let Some(ref statuses) = params.status {
                    if !statuses.contains(&task.status.state) {
                        continue;
                    }
                }

                last_id = Some(id.clone());
                result_tasks.push(task.clone());
            }
        }

        // Determine if there are more results.
        let next_page_token = if result_tasks.len() == page_size {
            // Check if there are more tasks after the last returned one.
            if let Some(ref last) = last_id {
                let last_pos = order.iter().position(|id| id == last).unwrap_or(0);
                if last_pos + 1 < order.len() {
                    Some(last.clone())
                } else {
                    None
                }
            } else {
                None
            }
        } else {
            None
        };

        debug!(
            count = result_tasks.len(),
            has_more = next_page_token.is_some(),
            "Listed tasks"
        );

        Ok(TaskListResponse {
            tasks: result_tasks,
            next_page_token,
        })
    }

    async fn list_contexts(&self, limit: Option<i32>) -> A2AResult<Vec<ContextSummary>> {
        let tasks = self.tasks.read().await;
        let order = self.insertion_order.read().await;

        let mut by_context: HashMap<String, Vec<String>> = HashMap::new();
        for id in order.iter() {
            if let Some(task) = tasks.get(id) {
                by_context
                    .entry(task.context_id.clone())
                    .or_default()
                    .push(task.id.clone());
            }
        }

        // Preserve the order contexts were first seen, matching insertion order.
        let mut seen = Vec::new();
        for id in order.iter() {
            if let Some(task) = tasks.get(id) {
                if !seen.contains(&task.context_id) {
                    seen.push(task.context_id.clone());
                }
            }
        }

        let mut summaries: Vec<ContextSummary> = seen
            .into_iter()
            .map(|context_id| {
                let task_ids = by_context.remove(&context_id).unwrap_or_default();
                ContextSummary {
                    task_count: task_ids.len(),
                    task_ids,
                    context_id,
                }
            })
            .collect();

        if let Some(limit) = limit {
            if limit >= 0 {
                summaries.truncate(limit as usize);
            }
        }

        Ok(summaries)
    }

    async fn clear_context(&self, context_id: &str) -> A2AResult<usize> {
        let mut tasks = self.tasks.write().await;
        let mut order = self.insertion_order.write().await;

        let to_remove: Vec<String> = tasks
            .values()
            .filter(|t| t.context_id == context_id)
            .map(|t| t.id.clone())
            .collect();

        for id in &to_remove {
            tasks.remove(id);
        }
        order.retain(|id| !to_remove.contains(id));

        debug!(context_id = %context_id, removed = to_remove.len(), "Context cleared");
        Ok(to_remove.len())
    }

    async fn set_push_config(
        &self,
        task_id: &str,
        mut config: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        if config.id.is_none() {
            config.id = Some(Uuid::new_v4().to_string());
        }
        config.task_id = task_id.to_string();

        let mut configs = self.push_configs.write().await;
        let entry = configs.entry(task_id.to_string()).or_default();
        if let Some(existing) = entry
            .iter_mut()
            .find(|c| c.id.as_deref() == config.id.as_deref())
        {
            *existing = config.clone();
        } else {
            entry.push(config.clone());
        }
        Ok(config)
    }

    async fn get_push_config(
        &self,
        task_id: &str,
        config_id: Option<&str>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let configs = self.push_configs.read().await;
        let entry = configs.get(task_id).ok_or_else(|| {
            A2AError::not_found(format!("no push notification config for task {task_id}"))
        })?;

        let found = match config_id {
            Some(id) => entry.iter().find(|c| c.id.as_deref() == Some(id)),
            None => entry.first(),
        };

        found.cloned().ok_or_else(|| {
            A2AError::not_found(format!("no push notification config for task {task_id}"))
        })
    }

    async fn list_push_configs(&self, task_id: &str) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        let configs = self.push_configs.read().await;
        Ok(configs.get(task_id).cloned().unwrap_or_default())
    }

    async fn delete_push_config(&self, task_id: &str, config_id: &str) -> A2AResult<()> {
        let mut configs = self.push_configs.write().await;
        if let Some(entry) = configs.get_mut(task_id) {
            entry.retain(|c| c.id.as_deref() != Some(config_id));
        }
        Ok(())
    }
}
