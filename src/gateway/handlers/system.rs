//! Discovery routes.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::gateway::error::GatewayError;
use crate::gateway::server::GatewayState;

/// `GET /instructions`: a machine-readable description of the API.
pub async fn instructions() -> Json<Value> {
    Json(json!({
        "name": "remotedocker",
        "version": env!("CARGO_PKG_VERSION"),
        "authentication": {
            "scheme": "Bearer",
            "header": "Authorization: Bearer <token>",
            "issuing": "remotedocker token --username <name> [--expires <minutes>]",
        },
        "endpoints": [
            {"method": "GET", "path": "/instructions", "description": "This document"},
            {"method": "GET", "path": "/version", "description": "Docker engine version"},
            {"method": "GET", "path": "/images", "description": "List images"},
            {"method": "POST", "path": "/images/pull", "body": {"repository": "string", "tag": "string (default: latest)"}},
            {"method": "POST", "path": "/build", "multipart": {"context": "tar archive", "tag": "string (default: latest)", "dockerfile": "string (default: Dockerfile)"}, "description": "Start an asynchronous build; returns build_id"},
            {"method": "GET", "path": "/builds", "description": "List known builds"},
            {"method": "GET", "path": "/builds/{build_id}/logs", "description": "Build status and logs"},
            {"method": "GET", "path": "/containers", "description": "List all containers"},
            {"method": "POST", "path": "/containers/create", "body": {"image": "string", "command": "string or [string]", "name": "string"}},
            {"method": "POST", "path": "/containers/{id}/start"},
            {"method": "POST", "path": "/containers/{id}/stop"},
            {"method": "POST", "path": "/containers/{id}/remove", "description": "Force remove"},
            {"method": "GET", "path": "/containers/{id}/logs"},
            {"method": "POST", "path": "/networks/create", "body": {"name": "string", "driver": "string (default: bridge)", "options": "object", "labels": "object"}},
            {"method": "GET", "path": "/networks"},
            {"method": "GET", "path": "/networks/{id}/inspect"},
            {"method": "GET", "path": "/networks/{id}/containers"},
            {"method": "POST", "path": "/compose/{up|down|ps|logs|config}", "multipart": {"compose_file": "file", "project_name": "string"}},
        ],
    }))
}

pub async fn version(State(state): State<GatewayState>) -> Result<Json<Value>, GatewayError> {
    Ok(Json(state.runtime.version().await?))
}
