//! Bearer-token gate applied to every gateway route.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::codec::CredentialCodec;
use crate::error::AuthError;
use crate::gateway::error::GatewayError;

/// Identity of the verified caller, inserted into request extensions.
///
/// Used for audit logging only; it carries no authorization weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub String);

/// Pull the token out of an `Authorization: Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Reject any request that does not carry a valid bearer token.
///
/// Runs before the handler, so a rejected request never touches the runtime
/// or the job registry.
pub async fn auth_middleware(
    State(codec): State<Arc<CredentialCodec>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AuthError::MissingCredential);

    let subject = match token.and_then(|t| codec.verify(t)) {
        Ok(subject) => subject,
        Err(e) => {
            tracing::debug!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = e.kind(),
                "Rejected unauthenticated request"
            );
            return Err(GatewayError::Unauthorized(e));
        }
    };

    tracing::trace!(subject = %subject, path = %request.uri().path(), "Authenticated request");
    request
        .extensions_mut()
        .insert(AuthenticatedSubject(subject));

    Ok(next.run(request).await)
}
