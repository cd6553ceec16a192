//! Asynchronous image builds.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::auth::AuthenticatedSubject;
use crate::builds::BuildSummary;
use crate::gateway::error::GatewayError;
use crate::gateway::handlers::UploadForm;
use crate::gateway::server::GatewayState;
use crate::gateway::types::{BuildAccepted, BuildLogsResponse};
use crate::runtime::BuildRequest;

const DEFAULT_TAG: &str = "latest";
const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// `POST /build`: accept a build context and start building in the
/// background.
///
/// The form is fully read and validated before a job exists, so a rejected
/// request leaves the registry untouched.
pub async fn submit_build(
    State(state): State<GatewayState>,
    Extension(subject): Extension<AuthenticatedSubject>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<BuildAccepted>), GatewayError> {
    let mut form = UploadForm::read(multipart).await?;

    let context = form.file("context").ok_or_else(|| {
        GatewayError::Validation(r#"No context file uploaded. Use field "context"."#.to_string())
    })?;
    let tag = form
        .text("tag")?
        .unwrap_or_else(|| DEFAULT_TAG.to_string());
    let dockerfile = form
        .text("dockerfile")?
        .unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string());

    let build_id = state
        .executor
        .submit(BuildRequest {
            context,
            tag,
            dockerfile,
        })
        .await;

    tracing::info!(subject = %subject.0, build_id = %build_id, "Build submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(BuildAccepted {
            message: "Build started".to_string(),
            build_id,
        }),
    ))
}

/// `GET /builds/{build_id}/logs`: current snapshot of one build.
pub async fn build_logs(
    State(state): State<GatewayState>,
    Path(build_id): Path<String>,
) -> Result<Json<BuildLogsResponse>, GatewayError> {
    // Ids are opaque to callers; anything unparsable is simply unknown.
    let id = Uuid::parse_str(&build_id)
        .map_err(|_| GatewayError::NotFound("Build ID not found".to_string()))?;
    let job = state.registry().get(id).await?;
    Ok(Json(job.into()))
}

/// `GET /builds`
pub async fn list_builds(State(state): State<GatewayState>) -> Json<Vec<BuildSummary>> {
    Json(state.registry().list().await)
}
