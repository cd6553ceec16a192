//! Router assembly and listener.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::auth::{CredentialCodec, auth_middleware};
use crate::builds::{BuildExecutor, JobRegistry};
use crate::gateway::handlers::{builds, compose, containers, images, networks, system};
use crate::runtime::{ComposeRunner, RuntimeAdapter};

/// Default request body limit: 512 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Shared state for every gateway route.
#[derive(Clone)]
pub struct GatewayState {
    pub codec: Arc<CredentialCodec>,
    pub executor: BuildExecutor,
    pub runtime: Arc<dyn RuntimeAdapter>,
    pub compose: ComposeRunner,
    /// Largest accepted request body (build contexts, compose files).
    pub max_upload_bytes: usize,
}

impl GatewayState {
    /// State with a fresh, empty job registry.
    pub fn new(
        codec: Arc<CredentialCodec>,
        runtime: Arc<dyn RuntimeAdapter>,
        compose: ComposeRunner,
    ) -> Self {
        let executor = BuildExecutor::new(JobRegistry::new(), Arc::clone(&runtime));
        Self {
            codec,
            executor,
            runtime,
            compose,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        self.executor.registry()
    }
}

/// The public HTTP gateway.
pub struct GatewayApi;

impl GatewayApi {
    /// Build the router. Every route sits behind the bearer-token gate.
    pub fn router(state: GatewayState) -> Router {
        let max_upload_bytes = state.max_upload_bytes;

        Router::new()
            .route("/instructions", get(system::instructions))
            .route("/version", get(system::version))
            // Builds
            .route("/build", post(builds::submit_build))
            .route("/builds", get(builds::list_builds))
            .route("/builds/{build_id}/logs", get(builds::build_logs))
            // Images
            .route("/images", get(images::list_images))
            .route("/images/pull", post(images::pull_image))
            // Containers
            .route("/containers", get(containers::list_containers))
            .route("/containers/create", post(containers::create_container))
            .route("/containers/{id}/start", post(containers::start_container))
            .route("/containers/{id}/stop", post(containers::stop_container))
            .route("/containers/{id}/remove", post(containers::remove_container))
            .route("/containers/{id}/logs", get(containers::container_logs))
            // Networks
            .route("/networks", get(networks::list_networks))
            .route("/networks/create", post(networks::create_network))
            .route("/networks/{id}/inspect", get(networks::inspect_network))
            .route(
                "/networks/{id}/containers",
                get(networks::network_containers),
            )
            // Compose
            .route("/compose/{action}", post(compose::run_compose))
            .route_layer(axum::middleware::from_fn_with_state(
                Arc::clone(&state.codec),
                auth_middleware,
            ))
            .layer(DefaultBodyLimit::max(max_upload_bytes))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind `addr` and serve in a background task until `shutdown` resolves.
    ///
    /// Returns the bound address (useful with port 0) and the server task.
    pub async fn start<F>(
        state: GatewayState,
        addr: SocketAddr,
        shutdown: F,
    ) -> std::io::Result<(SocketAddr, JoinHandle<std::io::Result<()>>)>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = Self::router(state);
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Gateway listening on {}", local_addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
        });

        Ok((local_addr, handle))
    }
}
