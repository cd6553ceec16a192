//! Route handlers.
//!
//! Handlers run behind the auth gate's route_layer, so none of them look at
//! credentials. Body errors are mapped to [`GatewayError`] here instead of
//! axum's plain-text rejections, so every failure has the same JSON shape.

pub mod builds;
pub mod compose;
pub mod containers;
pub mod images;
pub mod networks;
pub mod system;

use std::collections::HashMap;

use axum::Json;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::gateway::error::GatewayError;

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, GatewayError> {
    body.map(|Json(value)| value)
        .map_err(|e| GatewayError::Validation(e.body_text()))
}

fn multipart_error(e: MultipartError) -> GatewayError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge(e.body_text())
    } else {
        GatewayError::Validation(e.body_text())
    }
}

/// A fully buffered multipart form. Later fields with the same name replace
/// earlier ones.
pub(crate) struct UploadForm {
    fields: HashMap<String, Bytes>,
}

impl UploadForm {
    pub(crate) async fn read(
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Self, GatewayError> {
        let mut multipart = multipart.map_err(|e| GatewayError::Validation(e.body_text()))?;
        let mut fields = HashMap::new();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let data = field.bytes().await.map_err(multipart_error)?;
            fields.insert(name, data);
        }

        Ok(Self { fields })
    }

    /// Take a file field's raw bytes.
    pub(crate) fn file(&mut self, name: &str) -> Option<Bytes> {
        self.fields.remove(name)
    }

    /// A text field; empty values count as absent.
    pub(crate) fn text(&self, name: &str) -> Result<Option<String>, GatewayError> {
        let Some(raw) = self.fields.get(name) else {
            return Ok(None);
        };
        let value = std::str::from_utf8(raw)
            .map_err(|_| GatewayError::Validation(format!("Field '{}' must be UTF-8 text", name)))?
            .trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::CredentialCodec;
    use crate::gateway::{GatewayApi, GatewayState};
    use crate::runtime::ComposeRunner;
    use crate::testing::StubRuntime;

    const BOUNDARY: &str = "remotedocker-test-boundary";

    pub(crate) enum Part<'a> {
        File(&'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    pub(crate) struct Harness {
        pub router: Router,
        pub runtime: Arc<StubRuntime>,
        pub state: GatewayState,
        pub token: String,
    }

    pub(crate) fn harness() -> Harness {
        harness_with(ComposeRunner::default())
    }

    pub(crate) fn harness_with(compose: ComposeRunner) -> Harness {
        let codec = Arc::new(CredentialCodec::new(
            &SecretString::from("handler-tests-secret-0123456789abcdef".to_string()),
            Duration::from_secs(3600),
        ));
        let token = codec.issue("tester", None).unwrap().token;
        let runtime = Arc::new(StubRuntime::new());
        let state = GatewayState::new(codec, runtime.clone(), compose);
        Harness {
            router: GatewayApi::router(state.clone()),
            runtime,
            state,
            token,
        }
    }

    impl Harness {
        fn authorized(&self, method: &str, uri: &str) -> axum::http::request::Builder {
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
        }

        pub(crate) fn get(&self, uri: &str) -> Request<Body> {
            self.authorized("GET", uri).body(Body::empty()).unwrap()
        }

        pub(crate) fn post_empty(&self, uri: &str) -> Request<Body> {
            self.authorized("POST", uri).body(Body::empty()).unwrap()
        }

        pub(crate) fn post_json(&self, uri: &str, body: Value) -> Request<Body> {
            self.authorized("POST", uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        }

        pub(crate) fn post_multipart(&self, uri: &str, parts: &[Part<'_>]) -> Request<Body> {
            let mut body = Vec::new();
            for part in parts {
                body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
                match part {
                    Part::File(name, data) => {
                        body.extend_from_slice(
                            format!(
                                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.bin\"\r\n\
                                 Content-Type: application/octet-stream\r\n\r\n",
                                name, name
                            )
                            .as_bytes(),
                        );
                        body.extend_from_slice(data);
                    }
                    Part::Text(name, value) => {
                        body.extend_from_slice(
                            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                                .as_bytes(),
                        );
                        body.extend_from_slice(value.as_bytes());
                    }
                }
                body.extend_from_slice(b"\r\n");
            }
            body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

            self.authorized("POST", uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap()
        }

        /// Send a request and decode the JSON body (`Null` when empty).
        pub(crate) async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let resp = self.router.clone().oneshot(request).await.unwrap();
            let status = resp.status();
            let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
                .await
                .unwrap();
            if bytes.is_empty() {
                return (status, Value::Null);
            }
            let value = serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
            (status, value)
        }
    }
}
