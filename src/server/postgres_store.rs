//! Postgres-backed task store — one schema per agent DID.
//!
//! Tables are created lazily via [`crate::server::schema::initialize_did_schema`]
//! the first time a store is constructed for a DID. Task payloads are stored
//! as `JSONB`, with `id`, `context_id`, and `state` lifted into columns for
//! indexing and filtering; the full `Task` round-trips through `payload` so
//! adding fields to the wire type never requires a migration.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{ContextSummary, Task, TaskPushNotificationConfig};

use super::schema::initialize_did_schema;
use super::task_store::{TaskListParams, TaskListResponse, TaskStore};

/// Task store backed by a Postgres schema dedicated to one agent.
pub struct PostgresTaskStore {
    pool: PgPool,
    schema: String,
}

impl PostgresTaskStore {
    /// Connect and ensure the schema/tables for `did` exist.
    pub async fn connect(database_url: &str, did: &str) -> A2AResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| A2AError::internal(format!("failed to connect to postgres: {e}")))?;
        let schema = initialize_did_schema(&pool, did).await?;
        Ok(Self { pool, schema })
    }

    fn tasks_table(&self) -> String {
        format!("\"{}\".tasks", self.schema)
    }

    fn push_table(&self) -> String {
        format!("\"{}\".push_notification_configs", self.schema)
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn save(&self, task: Task) -> A2AResult<()> {
        let payload = serde_json::to_value(&task)?;
        let state = serde_json::to_value(task.status.state)?
            .as_str()
            .unwrap_or("submitted")
            .to_string();

        let stmt = format!(
            "INSERT INTO {} (id, context_id, state, payload, updated_at) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (id) DO UPDATE SET \
               context_id = EXCLUDED.context_id, \
               state = EXCLUDED.state, \
               payload = EXCLUDED.payload, \
               updated_at = now()",
            self.tasks_table()
        );

        sqlx::query(&stmt)
            .bind(&task.id)
            .bind(&task.context_id)
            .bind(&state)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to save task: {e}")))?;

        debug!(task_id = %task.id, "Task saved to postgres");
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        let stmt = format!("SELECT payload FROM {} WHERE id = $1", self.tasks_table());
        let row = sqlx::query(&stmt)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to load task: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: serde_json::Value = row.try_get("payload").map_err(|e| {
            A2AError::internal(format!("malformed task payload for {task_id}: {e}"))
        })?;
        let task: Task = serde_json::from_value(payload)?;
        Ok(Some(task))
    }

    async fn delete(&self, task_id: &str) -> A2AResult<()> {
        let stmt = format!("DELETE FROM {} WHERE id = $1", self.tasks_table());
        sqlx::query(&stmt)
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to delete task: {e}")))?;
        Ok(())
    }

    async fn list(&self, params: &TaskListParams) -> A2AResult<TaskListResponse> {
        let mut stmt = format!("SELECT payload FROM {} WHERE 1=1", self.tasks_table());
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref ctx) = params.context_id {
            binds.push(ctx.clone());
            stmt.push_str(&format!(" AND context_id = ${}", binds.len()));
        }
        if let Some(ref token) = params.page_token {
            binds.push(token.clone());
            stmt.push_str(&format!(" AND id > ${}", binds.len()));
        }
        stmt.push_str(" ORDER BY id");
        if let Some(page_size) = params.page_size {
            stmt.push_str(&format!(" LIMIT {}", page_size as i64 + 1));
        }

        let mut query = sqlx::query(&stmt);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to list tasks: {e}")))?;

        let mut tasks: Vec<Task> = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: serde_json::Value = row
                .try_get("payload")
                .map_err(|e| A2AError::internal(format!("malformed task payload: {e}")))?;
            let task: Task = serde_json::from_value(payload)?;
            if let Some(ref statuses) = params.status {
                if !statuses.contains(&task.status.state) {
                    continue;
                }
            }
            tasks.push(task);
        }

        let next_page_token = if let Some(page_size) = params.page_size {
            if tasks.len() > page_size {
                tasks.truncate(page_size);
                tasks.last().map(|t| t.id.clone())
            } else {
                None
            }
        } else {
            None
        };

        Ok(TaskListResponse {
            tasks,
            next_page_token,
        })
    }

    async fn list_contexts(&self, limit: Option<i32>) -> A2AResult<Vec<ContextSummary>> {
        let stmt = format!(
            "SELECT context_id, array_agg(id ORDER BY id) AS task_ids \
             FROM {} GROUP BY context_id ORDER BY max(updated_at) DESC",
            self.tasks_table()
        );
        let rows = sqlx::query(&stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to list contexts: {e}")))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let context_id: String = row
                .try_get("context_id")
                .map_err(|e| A2AError::internal(e.to_string()))?;
            let task_ids: Vec<String> = row
                .try_get("task_ids")
                .map_err(|e| A2AError::internal(e.to_string()))?;
            summaries.push(ContextSummary {
                task_count: task_ids.len(),
                task_ids,
                context_id,
            });
        }

        if let Some(limit) = limit {
            if limit >= 0 {
                summaries.truncate(limit as usize);
            }
        }
        Ok(summaries)
    }

    async fn clear_context(&self, context_id: &str) -> A2AResult<usize> {
        let stmt = format!("DELETE FROM {} WHERE context_id = $1", self.tasks_table());
        let result = sqlx::query(&stmt)
            .bind(context_id)
            .execute(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to clear context: {e}")))?;
        Ok(result.rows_affected() as usize)
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
        let payload = serde_json::to_value(&config)?;

        let stmt = format!(
            "INSERT INTO {} (id, task_id, payload) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload",
            self.push_table()
        );
        sqlx::query(&stmt)
            .bind(config.id.as_deref().unwrap())
            .bind(task_id)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to save push config: {e}")))?;

        Ok(config)
    }

    async fn get_push_config(
        &self,
        task_id: &str,
        config_id: Option<&str>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let configs = self.list_push_configs(task_id).await?;
        let found = match config_id {
            Some(id) => configs.into_iter().find(|c| c.id.as_deref() == Some(id)),
            None => configs.into_iter().next(),
        };
        found.ok_or_else(|| {
            A2AError::not_found(format!("no push notification config for task {task_id}"))
        })
    }

    async fn list_push_configs(&self, task_id: &str) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        let stmt = format!(
            "SELECT payload FROM {} WHERE task_id = $1",
            self.push_table()
        );
        let rows = sqlx::query(&stmt)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to list push configs: {e}")))?;

        let mut configs = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: serde_json::Value = row
                .try_get("payload")
                .map_err(|e| A2AError::internal(e.to_string()))?;
            configs.push(serde_json::from_value(payload)?);
        }
        Ok(configs)
    }

    async fn delete_push_config(&self, task_id: &str, config_id: &str) -> A2AResult<()> {
        let stmt = format!(
            "DELETE FROM {} WHERE task_id = $1 AND id = $2",
            self.push_table()
        );
        sqlx::query(&stmt)
            .bind(task_id)
            .bind(config_id)
            .execute(&self.pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to delete push config: {e}")))?;
        Ok(())
    }
}
