//! `docker compose` actions on an uploaded compose file.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};

use crate::gateway::error::GatewayError;
use crate::gateway::handlers::UploadForm;
use crate::gateway::server::GatewayState;
use crate::gateway::types::ComposeResponse;
use crate::runtime::ComposeAction;

/// `POST /compose/{action}` with multipart `compose_file` and optional
/// `project_name`.
pub async fn run_compose(
    State(state): State<GatewayState>,
    Path(action): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ComposeResponse>, GatewayError> {
    let action: ComposeAction = action.parse().map_err(GatewayError::NotFound)?;

    let mut form = UploadForm::read(multipart).await?;
    let compose_file = form.file("compose_file").ok_or_else(|| {
        GatewayError::Validation("No compose file provided. Use 'compose_file'.".to_string())
    })?;
    let project_name = form.text("project_name")?;

    tracing::info!(action = %action, project = ?project_name, "Running compose action");
    let stdout = state
        .compose
        .run(action, &compose_file, project_name.as_deref())
        .await?;

    Ok(Json(ComposeResponse {
        message: format!("Compose {} executed successfully", action),
        stdout,
    }))
}
