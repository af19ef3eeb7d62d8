//! gRPC surface — wire-equivalent to the JSON-RPC router, sharing the same
//! [`RequestHandler`].
//!
//! [`GrpcService`] implements the generated `A2aService` trait by building
//! the same request param structs the JSON-RPC router builds, delegating to
//! [`RequestHandler`], and converting the result to protobuf. Every RPC
//! follows the pattern from the source servicer: decode request, call the
//! handler, map `A2AError` to a `tonic::Status` (already implemented via
//! `From<A2AError> for tonic::Status` in [`crate::error`]), encode response.

use std::pin::Pin;

use futures::Stream;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::error::A2AError;
use crate::types::{
    Artifact, ContextSummary, Message, Part, PushNotificationConfig,
    PushNotificationAuthenticationInfo, Role, SendMessageResponse, StreamResponse, Task,
    TaskPushNotificationConfig, TaskState, TaskStatus,
};

use super::request_handler::{CancelTaskParams, GetTaskParams, RequestHandler};
use super::task_store::TaskListParams;

pub mod proto {
    tonic::include_proto!("a2a");
}

pub use proto::a2a_service_server::{A2aService, A2aServiceServer};

/// Parse a string as a UUID, falling back to the nil UUID on empty or
/// malformed input rather than rejecting the request outright. Mirrors the
/// source's zero-UUID convention for ids it treats as optional over the wire.
pub fn str_to_uuid(s: &str) -> Uuid {
    if s.is_empty() {
        return Uuid::nil();
    }
    Uuid::parse_str(s).unwrap_or(Uuid::nil())
}

/// Render a UUID as a string, collapsing the nil UUID to `""`.
pub fn uuid_to_str(id: Uuid) -> String {
    if id.is_nil() {
        String::new()
    } else {
        id.to_string()
    }
}

mod convert {
    use super::*;

    pub fn part_to_proto(part: &Part) -> proto::Part {
        match part {
            Part::Text { text, metadata } => proto::Part {
                content: Some(proto::part::Content::Text(proto::TextPart {
                    text: text.clone(),
                })),
                mime_type: String::new(),
                metadata_json: metadata_to_json(metadata),
            },
            Part::File { file, metadata } => proto::Part {
                content: Some(proto::part::Content::File(file_to_proto(file))),
                mime_type: String::new(),
                metadata_json: metadata_to_json(metadata),
            },
            Part::Data { data, metadata } => proto::Part {
                content: Some(proto::part::Content::Data(
                    serde_json::to_vec(data).unwrap_or_default(),
                )),
                mime_type: String::new(),
                metadata_json: metadata_to_json(metadata),
            },
        }
    }

    fn file_to_proto(file: &crate::types::FileContent) -> proto::FilePart {
        use crate::types::FileContent;
        match file {
            FileContent::Bytes(f) => proto::FilePart {
                source: Some(proto::file_part::Source::Bytes(f.bytes.clone().into_bytes())),
                mime_type: f.mime_type.clone().unwrap_or_default(),
                name: f.name.clone().unwrap_or_default(),
            },
            FileContent::Uri(f) => proto::FilePart {
                source: Some(proto::file_part::Source::Uri(f.uri.clone())),
                mime_type: f.mime_type.clone().unwrap_or_default(),
                name: f.name.clone().unwrap_or_default(),
            },
        }
    }

    pub fn proto_to_part(proto: proto::Part) -> Result<Part, Status> {
        let metadata = json_to_metadata(&proto.metadata_json);
        match proto.content {
            Some(proto::part::Content::Text(t)) => Ok(Part::Text {
                text: t.text,
                metadata,
            }),
            Some(proto::part::Content::Data(bytes)) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| Status::invalid_argument(format!("malformed data part: {e}")))?;
                Ok(Part::Data { data: value, metadata })
            }
            Some(proto::part::Content::File(f)) => {
                let mime_type = non_empty(f.mime_type.clone());
                let name = non_empty(f.name.clone());
                let file = match f.source {
                    Some(proto::file_part::Source::Bytes(b)) => {
                        crate::types::FileContent::Bytes(crate::types::FileWithBytes {
                            bytes: String::from_utf8_lossy(&b).to_string(),
                            mime_type,
                            name,
                        })
                    }
                    Some(proto::file_part::Source::Uri(uri)) => {
                        crate::types::FileContent::Uri(crate::types::FileWithUri {
                            uri,
                            mime_type,
                            name,
                        })
                    }
                    None => return Err(Status::invalid_argument("file part missing source")),
                };
                Ok(Part::File { file, metadata })
            }
            None => Err(Status::invalid_argument("part missing content")),
        }
    }

    pub fn message_to_proto(message: &Message) -> proto::Message {
        proto::Message {
            message_id: message.message_id.clone(),
            role: role_to_str(message.role).to_string(),
            parts: message.parts.iter().map(part_to_proto).collect(),
            context_id: message.context_id.clone().unwrap_or_default(),
            task_id: message.task_id.clone().unwrap_or_default(),
            metadata_json: metadata_to_json(&message.metadata),
        }
    }

    pub fn proto_to_message(proto: proto::Message) -> Result<Message, Status> {
        let parts = proto
            .parts
            .into_iter()
            .map(proto_to_part)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Message {
            message_id: if proto.message_id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                proto.message_id
            },
            role: str_to_role(&proto.role),
            kind: "message".to_string(),
            parts,
            context_id: non_empty(proto.context_id),
            task_id: non_empty(proto.task_id),
            reference_task_ids: None,
            extensions: None,
            metadata: json_to_metadata(&proto.metadata_json),
        })
    }

    fn role_to_str(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Unspecified => "unspecified",
        }
    }

    fn str_to_role(s: &str) -> Role {
        match s {
            "agent" => Role::Agent,
            _ => Role::User,
        }
    }

    pub fn task_status_to_proto(status: &TaskStatus) -> proto::TaskStatus {
        proto::TaskStatus {
            state: task_state_to_str(status.state).to_string(),
            message: status.message.as_ref().map(message_to_proto),
            timestamp: status.timestamp.clone().unwrap_or_default(),
        }
    }

    pub fn task_state_to_str(state: TaskState) -> &'static str {
        match state {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
            TaskState::InputRequired => "input-required",
            TaskState::Rejected => "rejected",
            TaskState::AuthRequired => "auth-required",
            TaskState::Unknown => "unknown",
        }
    }

    pub fn artifact_to_proto(artifact: &Artifact) -> proto::Artifact {
        proto::Artifact {
            artifact_id: artifact.artifact_id.clone(),
            name: artifact.name.clone().unwrap_or_default(),
            parts: artifact.parts.iter().map(part_to_proto).collect(),
            metadata_json: metadata_to_json(&artifact.metadata),
        }
    }

    pub fn task_to_proto(task: &Task) -> proto::Task {
        proto::Task {
            id: task.id.clone(),
            context_id: task.context_id.clone(),
            status: Some(task_status_to_proto(&task.status)),
            artifacts: task.artifacts.iter().flatten().map(artifact_to_proto).collect(),
            history: task.history.iter().flatten().map(message_to_proto).collect(),
            metadata_json: metadata_to_json(&task.metadata),
        }
    }

    pub fn task_event_to_proto(event: &StreamResponse) -> Option<proto::TaskEvent> {
        match event {
            StreamResponse::StatusUpdate(update) => Some(proto::TaskEvent {
                event: Some(proto::task_event::Event::StatusUpdate(proto::TaskStatusUpdate {
                    task_id: update.task_id.clone(),
                    context_id: update.context_id.clone(),
                    status: Some(task_status_to_proto(&update.status)),
                    r#final: update.r#final,
                    metadata_json: metadata_to_json(&update.metadata),
                })),
            }),
            StreamResponse::ArtifactUpdate(update) => Some(proto::TaskEvent {
                event: Some(proto::task_event::Event::ArtifactUpdate(proto::TaskArtifactUpdate {
                    task_id: update.task_id.clone(),
                    context_id: update.context_id.clone(),
                    artifact: Some(artifact_to_proto(&update.artifact)),
                    append: update.append.unwrap_or(false),
                    last_chunk: update.last_chunk.unwrap_or(false),
                    metadata_json: metadata_to_json(&update.metadata),
                })),
            }),
            StreamResponse::Task(task) => {
                // A full task snapshot arrives as the first resubscribe event;
                // encode it as a non-final status update so streaming clients
                // see one uniform TaskEvent shape.
                Some(proto::TaskEvent {
                    event: Some(proto::task_event::Event::StatusUpdate(proto::TaskStatusUpdate {
                        task_id: task.id.clone(),
                        context_id: task.context_id.clone(),
                        status: Some(task_status_to_proto(&task.status)),
                        r#final: is_terminal(task.status.state),
                        metadata_json: metadata_to_json(&task.metadata),
                    })),
                })
            }
            StreamResponse::Message(_) => None,
        }
    }

    fn is_terminal(state: TaskState) -> bool {
        matches!(
            state,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Rejected
        )
    }

    pub fn context_summary_to_proto(summary: &ContextSummary) -> proto::ContextSummary {
        proto::ContextSummary {
            context_id: summary.context_id.clone(),
            metadata: std::collections::HashMap::from([(
                "task_count".to_string(),
                summary.task_count.to_string(),
            )]),
        }
    }

    pub fn push_config_to_proto(config: &PushNotificationConfig) -> proto::PushNotificationConfig {
        proto::PushNotificationConfig {
            id: config.id.clone().unwrap_or_default(),
            url: config.url.clone(),
            token: config.token.clone().unwrap_or_default(),
            auth_schemes: config
                .authentication
                .as_ref()
                .map(|a| a.schemes.clone())
                .unwrap_or_default(),
            auth_credentials: config
                .authentication
                .as_ref()
                .and_then(|a| a.credentials.clone())
                .unwrap_or_default(),
        }
    }

    pub fn proto_to_push_config(proto: proto::PushNotificationConfig) -> PushNotificationConfig {
        let authentication = if proto.auth_schemes.is_empty() {
            None
        } else {
            Some(PushNotificationAuthenticationInfo {
                schemes: proto.auth_schemes,
                credentials: non_empty(proto.auth_credentials),
            })
        };
        PushNotificationConfig {
            id: non_empty(proto.id),
            url: proto.url,
            token: non_empty(proto.token),
            authentication,
        }
    }

    pub fn task_push_config_to_proto(
        config: &TaskPushNotificationConfig,
    ) -> proto::TaskPushNotificationConfig {
        proto::TaskPushNotificationConfig {
            id: config.id.clone().unwrap_or_default(),
            task_id: config.task_id.clone(),
            config: Some(push_config_to_proto(&config.push_notification_config)),
        }
    }

    fn metadata_to_json(metadata: &Option<serde_json::Value>) -> String {
        metadata
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    fn json_to_metadata(s: &str) -> Option<serde_json::Value> {
        if s.is_empty() {
            None
        } else {
            serde_json::from_str(s).ok()
        }
    }

    fn non_empty(s: String) -> Option<String> {
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

use convert::*;

type EventStream = Pin<Box<dyn Stream<Item = Result<proto::TaskEvent, Status>> + Send + 'static>>;

/// Thin `A2aService` implementation wrapping one [`RequestHandler`], mirroring
/// the source's one-servicer-wraps-one-task-manager shape.
pub struct GrpcService {
    handler: std::sync::Arc<dyn RequestHandler>,
}

impl GrpcService {
    pub fn new(handler: std::sync::Arc<dyn RequestHandler>) -> Self {
        Self { handler }
    }
}

fn map_err(err: A2AError) -> Status {
    err.into()
}

#[tonic::async_trait]
impl A2aService for GrpcService {
    async fn send_message(
        &self,
        request: Request<proto::SendMessageRequest>,
    ) -> Result<Response<proto::Task>, Status> {
        let req = request.into_inner();
        let message_proto = req
            .message
            .ok_or_else(|| Status::invalid_argument("missing message"))?;
        let message = proto_to_message(message_proto)?;

        let params = super::request_handler::SendMessageParams {
            message,
            configuration: None,
            metadata: None,
            tenant: None,
        };

        let response = self.handler.on_message_send(params).await.map_err(map_err)?;
        match response {
            SendMessageResponse::Task(task) => Ok(Response::new(task_to_proto(&task))),
            SendMessageResponse::Message(_) => Err(Status::internal(
                "agent returned a direct message; gRPC SendMessage expects a Task",
            )),
        }
    }

    type StreamMessageStream = EventStream;

    async fn stream_message(
        &self,
        request: Request<proto::SendMessageRequest>,
    ) -> Result<Response<Self::StreamMessageStream>, Status> {
        let req = request.into_inner();
        let message_proto = req
            .message
            .ok_or_else(|| Status::invalid_argument("missing message"))?;
        let message = proto_to_message(message_proto)?;

        let params = super::request_handler::SendMessageParams {
            message,
            configuration: None,
            metadata: None,
            tenant: None,
        };

        let mut rx = self
            .handler
            .on_message_send_stream(params)
            .await
            .map_err(map_err)?;

        let stream = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(proto_event) = task_event_to_proto(&event) {
                            yield Ok(proto_event);
                        }
                    }
                    Err(_) => break,
                }
            }
        };

        Ok(Response::new(Box::pin(stream)))
    }

    async fn get_task(
        &self,
        request: Request<proto::GetTaskRequest>,
    ) -> Result<Response<proto::Task>, Status> {
        let req = request.into_inner();
        let params = GetTaskParams {
            id: req.task_id,
            history_length: if req.history_length > 0 {
                Some(req.history_length as usize)
            } else {
                None
            },
            metadata: None,
            tenant: None,
        };
        let task = self.handler.on_get_task(params).await.map_err(map_err)?;
        Ok(Response::new(task_to_proto(&task)))
    }

    async fn list_tasks(
        &self,
        request: Request<proto::ListTasksRequest>,
    ) -> Result<Response<proto::TaskList>, Status> {
        let req = request.into_inner();
        let params = TaskListParams {
            context_id: non_empty_local(req.context_id),
            status: None,
            page_size: if req.limit > 0 { Some(req.limit as usize) } else { None },
            page_token: None,
        };
        let response = self.handler.on_list_tasks(params).await.map_err(map_err)?;
        Ok(Response::new(proto::TaskList {
            tasks: response.tasks.iter().map(task_to_proto).collect(),
        }))
    }

    async fn cancel_task(
        &self,
        request: Request<proto::TaskIdRequest>,
    ) -> Result<Response<proto::Task>, Status> {
        let req = request.into_inner();
        let params = CancelTaskParams {
            id: req.task_id,
            metadata: None,
            tenant: None,
        };
        let task = self.handler.on_cancel_task(params).await.map_err(map_err)?;
        Ok(Response::new(task_to_proto(&task)))
    }

    async fn task_feedback(
        &self,
        request: Request<proto::TaskFeedbackRequest>,
    ) -> Result<Response<proto::TaskFeedbackResponse>, Status> {
        let req = request.into_inner();
        let rating = if req.rating != 0 { Some(req.rating) } else { None };
        self.handler
            .on_task_feedback(&req.task_id, &req.feedback, rating, None)
            .await
            .map_err(map_err)?;
        Ok(Response::new(proto::TaskFeedbackResponse {
            success: true,
            message: "feedback recorded".to_string(),
        }))
    }

    async fn list_contexts(
        &self,
        request: Request<proto::ListContextsRequest>,
    ) -> Result<Response<proto::ContextList>, Status> {
        let req = request.into_inner();
        let limit = if req.limit > 0 { Some(req.limit) } else { None };
        let summaries = self.handler.on_list_contexts(limit).await.map_err(map_err)?;
        Ok(Response::new(proto::ContextList {
            contexts: summaries.iter().map(context_summary_to_proto).collect(),
        }))
    }

    async fn clear_context(
        &self,
        request: Request<proto::ContextIdRequest>,
    ) -> Result<Response<proto::ClearContextResponse>, Status> {
        let req = request.into_inner();
        let deleted = self
            .handler
            .on_clear_context(&req.context_id)
            .await
            .map_err(map_err)?;
        Ok(Response::new(proto::ClearContextResponse {
            success: true,
            message: format!("cleared {deleted} task(s)"),
        }))
    }

    async fn set_task_push_notification(
        &self,
        request: Request<proto::SetPushNotificationRequest>,
    ) -> Result<Response<proto::TaskPushNotificationConfig>, Status> {
        let req = request.into_inner();
        let config_proto = req
            .config
            .ok_or_else(|| Status::invalid_argument("missing config"))?;
        let config = proto_to_push_config(config_proto);
        let saved = self
            .handler
            .on_set_task_push_notification_config(&req.task_id, config)
            .await
            .map_err(map_err)?;
        Ok(Response::new(task_push_config_to_proto(&saved)))
    }

    async fn get_task_push_notification(
        &self,
        request: Request<proto::TaskIdRequest>,
    ) -> Result<Response<proto::TaskPushNotificationConfig>, Status> {
        let req = request.into_inner();
        let config = self
            .handler
            .on_get_task_push_notification_config(&req.task_id, None)
            .await
            .map_err(map_err)?;
        Ok(Response::new(task_push_config_to_proto(&config)))
    }

    async fn list_task_push_notifications(
        &self,
        request: Request<proto::TaskIdRequest>,
    ) -> Result<Response<proto::TaskPushNotificationConfigList>, Status> {
        let req = request.into_inner();
        let configs = self
            .handler
            .on_list_task_push_notification_config(&req.task_id)
            .await
            .map_err(map_err)?;
        Ok(Response::new(proto::TaskPushNotificationConfigList {
            configs: configs.iter().map(task_push_config_to_proto).collect(),
        }))
    }

    async fn delete_task_push_notification(
        &self,
        request: Request<proto::DeletePushNotificationRequest>,
    ) -> Result<Response<proto::TaskPushNotificationConfig>, Status> {
        let req = request.into_inner();
        self.handler
            .on_delete_task_push_notification_config(
                &req.task_id,
                &req.push_notification_config_id,
            )
            .await
            .map_err(map_err)?;
        Ok(Response::new(proto::TaskPushNotificationConfig {
            id: req.push_notification_config_id,
            task_id: req.task_id,
            config: None,
        }))
    }

    async fn health_check(
        &self,
        _request: Request<proto::HealthCheckRequest>,
    ) -> Result<Response<proto::HealthCheckResponse>, Status> {
        Ok(Response::new(proto::HealthCheckResponse {
            status: proto::health_check_response::ServingStatus::Serving as i32,
        }))
    }
}

fn non_empty_local(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
