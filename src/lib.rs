//! # a2a-rs — task execution core for the Agent-to-Agent (A2A) Protocol v0.3
//!
//! This crate provides a Rust implementation of an
//! [A2A protocol](https://a2a-protocol.org/latest/specification/) agent
//! server: a JSON-RPC 2.0 + SSE surface (and a wire-equivalent gRPC surface)
//! through which callers send messages that become tasks, which a
//! user-supplied handler drives through a lifecycle to completion.
//!
//! ## Overview
//!
//! An agent built on this crate can:
//! - Accept messages and turn them into task-based responses
//! - Stream real-time status and artifact updates via SSE or gRPC
//! - Maintain multi-turn conversations grouped by context
//! - Cancel running tasks cooperatively
//! - Gate access behind bearer-token auth with an additive DID signature check
//! - Deliver task events to registered push-notification webhooks
//!
//! This crate provides:
//! - **Complete type definitions** matching the A2A v0.3 protobuf specification
//! - **Task execution core**: storage, scheduling, and a worker loop driving a
//!   user-supplied [`server::AgentExecutor`] through the task lifecycle
//! - **Dual-protocol surface**: a JSON-RPC + SSE router ([`server::a2a_router`])
//!   and a wire-equivalent gRPC servicer ([`server::grpc::GrpcService`])
//! - **Auth**: bearer-token introspection plus an additive DID signature
//!   co-check ([`server::auth`])
//! - **Push-notification delivery** to registered webhooks ([`server::push_dispatcher`])
//! - **Ergonomic builders** for constructing complex types ([`AgentCardBuilder`], [`ServerBuilder`])
//!
//! ## Quick Start: Server
//!
//! Implement [`server::AgentExecutor`] to define your agent's behavior:
//!
//! ```rust,ignore
//! use a2a_rs::server::{AgentExecutor, RequestContext, EventQueue, TaskUpdater};
//! use a2a_rs::error::A2AResult;
//! use async_trait::async_trait;
//!
//! struct EchoAgent;
//!
//! #[async_trait]
//! impl AgentExecutor for EchoAgent {
//!     async fn execute(
//!         &self,
//!         context: RequestContext,
//!         event_queue: EventQueue,
//!     ) -> A2AResult<()> {
//!         let updater = TaskUpdater::new(
//!             event_queue,
//!             context.task_id.clone(),
//!             context.context_id.clone(),
//!         );
//!
//!         let text = context.get_user_input("\n");
//!         let response = format!("Echo: {}", text);
//!         updater.complete_with_text(&response).await?;
//!
//!         Ok(())
//!     }
//!
//!     async fn cancel(
//!         &self,
//!         context: RequestContext,
//!         event_queue: EventQueue,
//!     ) -> A2AResult<()> {
//!         let updater = TaskUpdater::new(
//!             event_queue,
//!             context.task_id,
//!             context.context_id,
//!         );
//!         updater.cancel(None).await?;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Then set up the HTTP server:
//!
//! ```rust,ignore
//! use a2a_rs::server::{a2a_router, DefaultRequestHandler, InMemoryTaskStore};
//! use a2a_rs::AgentCardBuilder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build an agent card
//!     let agent_card = AgentCardBuilder::new(
//!         "Echo Agent",
//!         "A simple agent that echoes back your messages",
//!         "1.0.0",
//!     )
//!     .with_jsonrpc_interface("http://localhost:3000/a2a")
//!     .with_streaming(true)
//!     .build();
//!
//!     let executor = Arc::new(EchoAgent);
//!     let store = Arc::new(InMemoryTaskStore::new());
//!     let handler = Arc::new(DefaultRequestHandler::new(executor, store));
//!
//!     // Build the router with A2A routes (pass Some(auth_context) to require bearer tokens)
//!     let app = a2a_router(handler, agent_card, None);
//!
//!     // Start the server
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! The server automatically provides:
//! - `POST /a2a` — JSON-RPC 2.0 endpoint for all A2A methods
//! - `GET /.well-known/agent.json` — Agent card discovery
//! - `GET /docs`, `GET /favicon.ico`, `GET /metrics` — well-known auxiliary endpoints
//!
//! ## Protocol Compliance
//!
//! This crate implements **A2A protocol v0.3** as defined in the
//! [official specification](https://a2a-protocol.org/latest/specification/).
//!
//! All types match the protobuf definitions at
//! [`a2a.proto`](https://github.com/a2aproject/A2A/blob/main/specification/a2a.proto).
//!
//! Supported JSON-RPC methods:
//! - `message/send` — Send a message and get a task
//! - `message/stream` — Send a message with SSE streaming
//! - `tasks/get` — Retrieve a task by ID
//! - `tasks/list` — List tasks with filtering
//! - `tasks/cancel` — Cancel a running task
//! - `tasks/subscribe` / `tasks/resubscribe` — Subscribe to task updates (SSE)
//! - `tasks/feedback` — Attach feedback to a task
//! - `contexts/list` / `contexts/clear` — List or purge conversational contexts
//! - `tasks/pushNotificationConfig/{set,get,list,delete}` — Manage webhook registrations
//!
//! ## Architecture
//!
//! ### Server
//!
//! - [`server::AgentExecutor`] — Trait for implementing your agent's logic
//! - [`server::RequestHandler`] — Trait for handling JSON-RPC requests
//! - [`server::DefaultRequestHandler`] — Reference implementation of `RequestHandler`
//! - [`server::TaskStore`] — Trait for task persistence
//! - [`server::InMemoryTaskStore`] — In-memory task store implementation
//! - [`server::EventQueue`] — Broadcast channel for SSE events
//! - [`server::TaskUpdater`] — Helper for publishing task status/artifact updates
//! - [`server::a2a_router`] — Creates an axum `Router` with A2A routes
//!
//! ### Core Types
//!
//! - [`types::Task`] — A2A task with status, history, and artifacts
//! - [`types::Message`] — A message with text/file/data parts
//! - [`types::Part`] — Content part (text, file, or structured data)
//! - [`types::TaskState`] — Task lifecycle state machine
//! - [`types::StreamResponse`] — SSE event types (status updates, artifact updates)
//! - [`types::AgentCard`] — Agent metadata and capabilities
//! - [`error::A2AError`] — Error types with JSON-RPC error codes

pub mod builders;
pub mod config;
pub mod error;
pub mod server;
pub mod types;
pub mod utils;

/// Prelude module that re-exports commonly used types and traits.
///
/// Import this module with `use a2a_rs::prelude::*;` to get access to the most
/// frequently used types without having to import them individually.
///
/// # Example
///
/// ```
/// use a2a_rs::prelude::*;
///
/// // Now you have access to common types like:
/// // - Message, Part, Task, TaskState, Role
/// // - AgentCard, AgentSkill, AgentCapabilities
/// // - A2AError, A2AResult
/// // - builders like AgentCardBuilder
/// ```
pub mod prelude {
    // Core types
    pub use crate::types::{
        AgentCapabilities, AgentCard, AgentInterface, AgentSkill, Artifact, FileContent,
        FileWithBytes, FileWithUri, Message, Part, Role, SendMessageConfiguration,
        SendMessageParams, StreamResponse, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
        TaskStatusUpdateEvent,
    };

    // Error types
    pub use crate::error::{A2AError, A2AResult};

    // Builders
    pub use crate::builders::{AgentCardBuilder, ServerBuilder};

    // Configuration
    pub use crate::config::AgentConfig;

    pub use crate::server::{
        a2a_router, AgentExecutor, EventConsumer, EventQueue, InMemoryQueueManager,
        InMemoryTaskStore, QueueManager, RequestContext, RequestContextBuilder, ServerCallContext,
        SimpleRequestContextBuilder, TaskManager, TaskStore, TaskUpdater,
    };
}

// Re-export core types at crate root for convenience.
pub use builders::{AgentCardBuilder, ServerBuilder};
pub use error::{A2AError, A2AResult};
pub use types::*;
