//! A2A error types — a single taxonomy shared by the JSON-RPC and gRPC surfaces.
//!
//! Each variant carries a human-readable message and an optional structured
//! `data` payload, and maps to exactly one JSON-RPC code and one gRPC status
//! through [`A2AError::code`] / [`A2AError::grpc_code`]. `identifier-mismatch`
//! and `failed-precondition` share JSON-RPC code `-32005` and gRPC status
//! `FAILED_PRECONDITION` — both directions go through this one table, so the
//! two wire adapters can never disagree on a mapping.

use crate::types::JsonRpcError;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s), or a malformed/missing field.
pub const INVALID_PARAMS: i64 = -32602;

/// Unexpected storage/scheduler failure.
pub const INTERNAL_ERROR: i64 = -32000;

/// The requested task, context, or push config id is unknown.
pub const NOT_FOUND: i64 = -32001;

/// A message's `context_id` conflicts with its task's, or a capability is
/// missing, or the task is in the wrong state for the request.
pub const FAILED_PRECONDITION: i64 = -32005;

/// Missing or invalid bearer token.
pub const UNAUTHENTICATED: i64 = -32003;

// ---------------------------------------------------------------------------
// A2AError enum
// ---------------------------------------------------------------------------

/// Unified error type for the task execution core.
///
/// `handler-error` (a failed user handler invocation) is deliberately not a
/// variant here — it never crosses the RPC boundary as a protocol error, but
/// is instead surfaced as a terminal `status-update(failed, metadata.error)`
/// event by the worker boundary (see `server::worker`).
#[derive(Debug, Clone, thiserror::Error)]
pub enum A2AError {
    /// Malformed request or missing required field (JSON-RPC `-32602`).
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A message's `context_id` does not match its task's `context_id`
    /// (JSON-RPC `-32005`).
    #[error("Identifier mismatch: {message}")]
    IdentifierMismatch {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Task, context, or push config id unknown (JSON-RPC `-32001`).
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Capability missing, or task in the wrong state for this request
    /// (JSON-RPC `-32005`, same code as `IdentifierMismatch`).
    #[error("Failed precondition: {message}")]
    FailedPrecondition {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Missing or invalid bearer token (JSON-RPC `-32003`).
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Unexpected storage/scheduler failure, or any error the process did
    /// not anticipate (JSON-RPC `-32000`).
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Raw JSON failed to parse (JSON-RPC `-32700`).
    #[error("Parse error: {message}")]
    ParseError {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The JSON-RPC method name is not one this server implements
    /// (JSON-RPC `-32601`).
    #[error("Method not found: {message}")]
    MethodNotFound {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Catch-all for errors that don't fit another category.
    #[error("{0}")]
    Other(String),
}

/// Convenience result type for A2A operations.
pub type A2AResult<T> = Result<T, A2AError>;

impl A2AError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            data: None,
        }
    }

    pub fn identifier_mismatch(message: impl Into<String>) -> Self {
        Self::IdentifierMismatch {
            message: message.into(),
            data: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            data: None,
        }
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            message: message.into(),
            data: None,
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            data: None,
        }
    }

    /// The JSON-RPC 2.0 error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            Self::InvalidArgument { .. } => INVALID_PARAMS,
            Self::IdentifierMismatch { .. } => FAILED_PRECONDITION,
            Self::NotFound { .. } => NOT_FOUND,
            Self::FailedPrecondition { .. } => FAILED_PRECONDITION,
            Self::Unauthenticated { .. } => UNAUTHENTICATED,
            Self::Internal { .. } => INTERNAL_ERROR,
            Self::ParseError { .. } => PARSE_ERROR,
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            Self::Other(_) => INTERNAL_ERROR,
        }
    }

    /// The gRPC status code for this error.
    pub fn grpc_code(&self) -> tonic::Code {
        match self {
            Self::InvalidArgument { .. } => tonic::Code::InvalidArgument,
            Self::IdentifierMismatch { .. } => tonic::Code::FailedPrecondition,
            Self::NotFound { .. } => tonic::Code::NotFound,
            Self::FailedPrecondition { .. } => tonic::Code::FailedPrecondition,
            Self::Unauthenticated { .. } => tonic::Code::Unauthenticated,
            Self::Internal { .. } => tonic::Code::Internal,
            Self::ParseError { .. } => tonic::Code::InvalidArgument,
            Self::MethodNotFound { .. } => tonic::Code::Unimplemented,
            Self::Other(_) => tonic::Code::Internal,
        }
    }

    fn default_message(&self) -> String {
        self.to_string()
    }

    fn data(&self) -> Option<serde_json::Value> {
        match self {
            Self::InvalidArgument { data, .. }
            | Self::IdentifierMismatch { data, .. }
            | Self::NotFound { data, .. }
            | Self::FailedPrecondition { data, .. }
            | Self::Unauthenticated { data, .. }
            | Self::Internal { data, .. }
            | Self::ParseError { data, .. }
            | Self::MethodNotFound { data, .. } => data.clone(),
            Self::Other(_) => None,
        }
    }
}

impl From<A2AError> for JsonRpcError {
    fn from(err: A2AError) -> Self {
        JsonRpcError {
            code: err.code(),
            message: err.default_message(),
            data: err.data(),
        }
    }
}

impl From<A2AError> for tonic::Status {
    fn from(err: A2AError) -> Self {
        tonic::Status::new(err.grpc_code(), err.default_message())
    }
}

impl From<serde_json::Error> for A2AError {
    fn from(err: serde_json::Error) -> Self {
        A2AError::ParseError {
            message: err.to_string(),
            data: None,
        }
    }
}
