//! Container runtime façade.
//!
//! [`RuntimeAdapter`] is the only seam between the gateway and the Docker
//! daemon. Everything except [`RuntimeAdapter::build`] is a plain
//! request/response call; `build` hands back a lazy stream of
//! [`BuildEvent`]s that the build executor drains.

pub mod compose;
pub mod docker;

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

pub use compose::{ComposeAction, ComposeRunner};
pub use docker::DockerRuntime;

/// One item of a build's progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// A line of build output.
    Log(String),
    /// An error line embedded in the output.
    ErrorLine(String),
    /// Terminal: the build produced an image.
    Success { image_id: String },
    /// Terminal: the runtime classified the build as failed. `partial_logs`
    /// holds fragments the runtime buffered but never emitted as events.
    Failure {
        partial_logs: Vec<String>,
        message: String,
    },
}

/// Lazy, finite build progress. An `Err` item is an unclassified runtime
/// failure and ends the build.
pub type BuildStream = Pin<Box<dyn Stream<Item = Result<BuildEvent, RuntimeError>> + Send>>;

/// Parameters of an image build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Tar archive of the build context.
    pub context: Bytes,
    pub tag: String,
    /// Dockerfile path inside the context.
    pub dockerfile: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub image: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateContainerRequest {
    pub image: String,
    pub command: Option<Vec<String>>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub driver: String,
    pub options: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
    pub driver: String,
}

/// A container attached to a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub container_id: String,
    pub name: Option<String>,
    pub ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub mac_address: Option<String>,
}

/// Operations the gateway needs from a container runtime.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Engine version and platform details.
    async fn version(&self) -> Result<serde_json::Value, RuntimeError>;

    async fn list_images(&self) -> Result<Vec<ImageSummary>, RuntimeError>;

    /// Pull `repository:tag`, returning the resulting image id.
    async fn pull_image(&self, repository: &str, tag: &str) -> Result<String, RuntimeError>;

    /// Start an image build. The returned stream does no work until polled.
    fn build(&self, request: BuildRequest) -> BuildStream;

    /// All containers, running or not.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Create (but do not start) a container, returning its id.
    async fn create_container(&self, request: CreateContainerRequest)
    -> Result<String, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Force-remove a container.
    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Combined stdout/stderr of a container.
    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError>;

    /// Create a network, returning its id.
    async fn create_network(&self, request: CreateNetworkRequest) -> Result<String, RuntimeError>;

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, RuntimeError>;

    /// Raw network document as reported by the daemon.
    async fn inspect_network(&self, id: &str) -> Result<serde_json::Value, RuntimeError>;

    async fn network_containers(&self, id: &str) -> Result<Vec<NetworkEndpoint>, RuntimeError>;
}
