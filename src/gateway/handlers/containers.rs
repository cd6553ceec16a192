//! Container lifecycle pass-through.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};

use crate::gateway::error::GatewayError;
use crate::gateway::handlers::json_body;
use crate::gateway::server::GatewayState;
use crate::gateway::types::{ContainerActionResponse, ContainerLogsResponse, CreateContainerBody};
use crate::runtime::{ContainerSummary, CreateContainerRequest};

fn action_response(message: &str, container_id: String) -> Json<ContainerActionResponse> {
    Json(ContainerActionResponse {
        message: message.to_string(),
        container_id,
    })
}

/// `GET /containers`: every container, running or not.
pub async fn list_containers(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<ContainerSummary>>, GatewayError> {
    Ok(Json(state.runtime.list_containers().await?))
}

pub async fn create_container(
    State(state): State<GatewayState>,
    body: Result<Json<CreateContainerBody>, JsonRejection>,
) -> Result<Json<ContainerActionResponse>, GatewayError> {
    let body = json_body(body)?;
    let image = body
        .image
        .filter(|i| !i.is_empty())
        .ok_or_else(|| GatewayError::Validation("Image name is required".to_string()))?;

    let container_id = state
        .runtime
        .create_container(CreateContainerRequest {
            image,
            command: body.command.map(|c| c.into_args()),
            name: body.name.filter(|n| !n.is_empty()),
        })
        .await?;

    tracing::info!(container_id = %container_id, "Container created");
    Ok(action_response("Container created", container_id))
}

pub async fn start_container(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<ContainerActionResponse>, GatewayError> {
    state.runtime.start_container(&id).await?;
    Ok(action_response("Container started", id))
}

pub async fn stop_container(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<ContainerActionResponse>, GatewayError> {
    state.runtime.stop_container(&id).await?;
    Ok(action_response("Container stopped", id))
}

/// Force-removes, so a running container goes too.
pub async fn remove_container(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<ContainerActionResponse>, GatewayError> {
    state.runtime.remove_container(&id).await?;
    Ok(action_response("Container removed", id))
}

pub async fn container_logs(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<ContainerLogsResponse>, GatewayError> {
    let logs = state.runtime.container_logs(&id).await?;
    Ok(Json(ContainerLogsResponse {
        container_id: id,
        logs,
    }))
}
