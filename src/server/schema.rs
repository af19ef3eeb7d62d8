//! Postgres schema naming and per-agent schema bootstrap.
//!
//! Each agent, identified by its DID, owns one Postgres schema so that
//! multiple agents can share a database without colliding on table names.
//! The schema name is derived deterministically from the DID so the same
//! agent always resolves to the same schema across restarts.

use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::{A2AError, A2AResult};

const MAX_SCHEMA_NAME_LEN: usize = 63;
const HASH_SUFFIX_LEN: usize = 8;

/// Derive a Postgres-safe schema name from a DID.
///
/// - Lowercases the input.
/// - Replaces every non-alphanumeric character with `_`.
/// - Prefixes with `schema_` if the result starts with a digit (Postgres
///   identifiers cannot start with a digit unless quoted).
/// - If the result exceeds 63 bytes (Postgres's identifier limit), it is
///   truncated and an 8-hex-character SHA-256 suffix of the full sanitized
///   name is appended so distinct long DIDs don't collide after truncation.
pub fn sanitize_did_for_schema(did: &str) -> String {
    let lowered = did.to_lowercase();
    let sanitized: String = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let sanitized = if sanitized
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
    {
        format!("schema_{sanitized}")
    } else {
        sanitized
    };

    if sanitized.len() <= MAX_SCHEMA_NAME_LEN {
        return sanitized;
    }

    let mut hasher = Sha256::new();
    hasher.update(sanitized.as_bytes());
    let digest = hasher.finalize();
    let suffix: String = digest[..HASH_SUFFIX_LEN / 2]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();

    let keep = MAX_SCHEMA_NAME_LEN - HASH_SUFFIX_LEN - 1;
    format!("{}_{}", &sanitized[..keep], suffix)
}

/// Create the schema if it doesn't already exist.
pub async fn create_schema_if_not_exists(pool: &PgPool, schema: &str) -> A2AResult<()> {
    let stmt = format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\"");
    sqlx::query(&stmt)
        .execute(pool)
        .await
        .map_err(|e| A2AError::internal(format!("failed to create schema {schema}: {e}")))?;
    Ok(())
}

/// Drop a schema and everything in it. Used by test teardown and agent deprovisioning.
pub async fn drop_schema_if_exists(pool: &PgPool, schema: &str) -> A2AResult<()> {
    let stmt = format!("DROP SCHEMA IF EXISTS \"{schema}\" CASCADE");
    sqlx::query(&stmt)
        .execute(pool)
        .await
        .map_err(|e| A2AError::internal(format!("failed to drop schema {schema}: {e}")))?;
    Ok(())
}

/// Set the search path for the current connection to the given schema, falling
/// back to `public`.
pub async fn set_search_path(pool: &PgPool, schema: &str) -> A2AResult<()> {
    let stmt = format!("SET search_path TO \"{schema}\", public");
    sqlx::query(&stmt)
        .execute(pool)
        .await
        .map_err(|e| A2AError::internal(format!("failed to set search_path: {e}")))?;
    Ok(())
}

/// List all schema names present in the database (excluding Postgres internals).
pub async fn list_schemas(pool: &PgPool) -> A2AResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT schema_name FROM information_schema.schemata \
         WHERE schema_name NOT IN ('pg_catalog', 'information_schema') \
         AND schema_name NOT LIKE 'pg_%'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| A2AError::internal(format!("failed to list schemas: {e}")))?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// List table names within a schema.
pub async fn get_tables_in_schema(pool: &PgPool, schema: &str) -> A2AResult<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT table_name FROM information_schema.tables WHERE table_schema = $1")
            .bind(schema)
            .fetch_all(pool)
            .await
            .map_err(|e| A2AError::internal(format!("failed to list tables: {e}")))?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Create the schema for a DID (if needed) and the tables this core requires
/// within it: `tasks`, `push_notification_configs`.
pub async fn initialize_did_schema(pool: &PgPool, did: &str) -> A2AResult<String> {
    let schema = sanitize_did_for_schema(did);
    create_schema_if_not_exists(pool, &schema).await?;

    let tasks_table = format!(
        "CREATE TABLE IF NOT EXISTS \"{schema}\".tasks (
            id TEXT PRIMARY KEY,
            context_id TEXT NOT NULL,
            state TEXT NOT NULL,
            payload JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    );
    sqlx::query(&tasks_table)
        .execute(pool)
        .await
        .map_err(|e| A2AError::internal(format!("failed to create tasks table: {e}")))?;

    let context_idx = format!(
        "CREATE INDEX IF NOT EXISTS idx_{schema}_tasks_context_id ON \"{schema}\".tasks (context_id)"
    );
    sqlx::query(&context_idx)
        .execute(pool)
        .await
        .map_err(|e| A2AError::internal(format!("failed to create context index: {e}")))?;

    let push_table = format!(
        "CREATE TABLE IF NOT EXISTS \"{schema}\".push_notification_configs (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            payload JSONB NOT NULL
        )"
    );
    sqlx::query(&push_table)
        .execute(pool)
        .await
        .map_err(|e| A2AError::internal(format!("failed to create push config table: {e}")))?;

    Ok(schema)
}
