//! Process-wide configuration, sourced from the environment.
//!
//! Collects every environment variable named in the external-interfaces
//! section of the design into one struct, parsed once at startup via
//! [`AgentConfig::from_env`]. Malformed values surface as
//! [`A2AError::InvalidArgument`] rather than panicking, so a bad deployment
//! config causes a clean non-zero exit instead of an unwrap panic.

use serde::Deserialize;

use crate::error::{A2AError, A2AResult};

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Memory,
    Postgres,
}

impl Default for StorageType {
    fn default() -> Self {
        StorageType::Memory
    }
}

/// Scheduler backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerType {
    Memory,
    Redis,
}

impl Default for SchedulerType {
    fn default() -> Self {
        SchedulerType::Memory
    }
}

fn default_false() -> bool {
    false
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_grpc_host() -> String {
    "0.0.0.0".to_string()
}

fn default_grpc_workers() -> usize {
    4
}

/// Process-wide configuration, parsed from environment variables.
///
/// Every field corresponds to one of the `ENUMERATED` environment variables
/// in the design's external-interfaces section. Fields the core does not
/// interpret itself (auth provider URLs, telemetry endpoint) are still
/// collected here so a single `AgentConfig` can be threaded through startup,
/// even though only the external collaborators they name consume them.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub storage_type: StorageType,
    pub database_url: Option<String>,

    #[serde(default)]
    pub scheduler_type: SchedulerType,
    pub redis_url: Option<String>,

    #[serde(default = "default_false")]
    pub auth_enabled: bool,
    pub auth_provider: Option<String>,
    pub auth_admin_url: Option<String>,
    pub auth_public_url: Option<String>,
    pub auth_token_timeout: Option<u64>,
    #[serde(default = "default_false")]
    pub auth_verify_tls: bool,

    #[serde(default = "default_false")]
    pub grpc_enabled: bool,
    #[serde(default = "default_grpc_host")]
    pub grpc_host: String,
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
    #[serde(default = "default_grpc_workers")]
    pub grpc_max_workers: usize,
    pub grpc_tls_cert: Option<String>,
    pub grpc_tls_key: Option<String>,

    #[serde(default = "default_false")]
    pub telemetry_enabled: bool,
    pub oltp_endpoint: Option<String>,
}

impl AgentConfig {
    /// Parse configuration from the process environment.
    ///
    /// Variable names match the design's `ENUMERATED` list, upper-cased
    /// (`envy` maps `STORAGE_TYPE` onto the `storage_type` field and so on).
    pub fn from_env() -> A2AResult<Self> {
        envy::from_env::<AgentConfig>()
            .map_err(|e| A2AError::invalid_argument(format!("invalid configuration: {e}")))
    }

    /// Validate cross-field requirements not expressible as a single
    /// environment variable's type (e.g. "postgres" storage needs a URL).
    pub fn validate(&self) -> A2AResult<()> {
        if self.storage_type == StorageType::Postgres && self.database_url.is_none() {
            return Err(A2AError::invalid_argument(
                "STORAGE_TYPE=postgres requires DATABASE_URL",
            ));
        }
        if self.scheduler_type == SchedulerType::Redis && self.redis_url.is_none() {
            return Err(A2AError::invalid_argument(
                "SCHEDULER_TYPE=redis requires REDIS_URL",
            ));
        }
        if self.auth_enabled && self.auth_admin_url.is_none() {
            return Err(A2AError::invalid_argument(
                "AUTH_ENABLED=true requires AUTH_ADMIN_URL",
            ));
        }
        Ok(())
    }
}
