//! Image listing and pulls.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::gateway::error::GatewayError;
use crate::gateway::handlers::json_body;
use crate::gateway::server::GatewayState;
use crate::gateway::types::{PullImageRequest, PullImageResponse};
use crate::runtime::ImageSummary;

pub async fn list_images(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<ImageSummary>>, GatewayError> {
    Ok(Json(state.runtime.list_images().await?))
}

/// `POST /images/pull`: synchronous pull; `tag` defaults to `latest`.
pub async fn pull_image(
    State(state): State<GatewayState>,
    body: Result<Json<PullImageRequest>, JsonRejection>,
) -> Result<Json<PullImageResponse>, GatewayError> {
    let request = json_body(body)?;
    let repository = request
        .repository
        .filter(|r| !r.is_empty())
        .ok_or_else(|| GatewayError::Validation("Repository is required".to_string()))?;
    let tag = request
        .tag
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "latest".to_string());

    tracing::info!(repository = %repository, tag = %tag, "Pulling image");
    let image_id = state.runtime.pull_image(&repository, &tag).await?;

    Ok(Json(PullImageResponse {
        message: "Image pulled successfully".to_string(),
        image_id,
    }))
}
