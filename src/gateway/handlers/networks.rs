//! Network management and debugging.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};

use crate::gateway::error::GatewayError;
use crate::gateway::handlers::json_body;
use crate::gateway::server::GatewayState;
use crate::gateway::types::{CreateNetworkBody, CreateNetworkResponse};
use crate::runtime::{CreateNetworkRequest, NetworkEndpoint, NetworkSummary};

const DEFAULT_DRIVER: &str = "bridge";

pub async fn create_network(
    State(state): State<GatewayState>,
    body: Result<Json<CreateNetworkBody>, JsonRejection>,
) -> Result<Json<CreateNetworkResponse>, GatewayError> {
    let body = json_body(body)?;
    let name = body
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| GatewayError::Validation("Network name is required".to_string()))?;

    let network_id = state
        .runtime
        .create_network(CreateNetworkRequest {
            name,
            driver: body
                .driver
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_DRIVER.to_string()),
            options: body.options.unwrap_or_default(),
            labels: body.labels.unwrap_or_default(),
        })
        .await?;

    tracing::info!(network_id = %network_id, "Network created");
    Ok(Json(CreateNetworkResponse {
        message: "Network created".to_string(),
        network_id,
    }))
}

pub async fn list_networks(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<NetworkSummary>>, GatewayError> {
    Ok(Json(state.runtime.list_networks().await?))
}

/// Raw daemon document, passed through untouched.
pub async fn inspect_network(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    Ok(Json(state.runtime.inspect_network(&id).await?))
}

pub async fn network_containers(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<NetworkEndpoint>>, GatewayError> {
    Ok(Json(state.runtime.network_containers(&id).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::gateway::handlers::test_support::harness;

    #[tokio::test]
    async fn create_defaults_to_bridge() {
        let h = harness();
        let (status, body) = h
            .send(h.post_json("/networks/create", json!({"name": "backend"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Network created");
        let id = body["network_id"].as_str().unwrap().to_string();

        let (_, listed) = h.send(h.get("/networks")).await;
        assert_eq!(listed, json!([{"id": id, "name": "backend", "driver": "bridge"}]));

        let (status, doc) = h.send(h.get(&format!("/networks/{}/inspect", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["Name"], "backend");
    }

    #[tokio::test]
    async fn create_requires_name() {
        let h = harness();
        let (status, body) = h
            .send(h.post_json("/networks/create", json!({"driver": "overlay"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Network name is required");
    }

    #[tokio::test]
    async fn lists_attached_containers() {
        let h = harness();
        let (_, body) = h
            .send(h.post_json("/networks/create", json!({"name": "app", "driver": "bridge"})))
            .await;
        let id = body["network_id"].as_str().unwrap().to_string();
        h.runtime.connect(&id, "c1").unwrap();

        let (status, endpoints) = h.send(h.get(&format!("/networks/{}/containers", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(endpoints[0]["container_id"], "c1");
        assert_eq!(endpoints[0]["ipv4_address"], "172.18.0.2/16");
        assert!(endpoints[0]["mac_address"].is_null());
    }

    #[tokio::test]
    async fn unknown_network_is_not_found() {
        let h = harness();
        let (status, _) = h.send(h.get("/networks/nope/inspect")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
