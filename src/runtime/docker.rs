//! [`RuntimeAdapter`] backed by the local Docker daemon via bollard.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
};
use bollard::image::{BuildImageOptions, CreateImageOptions, ListImagesOptions};
use bollard::models::BuildInfo;
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions, ListNetworksOptions};
use futures::{StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::RuntimeError;
use crate::runtime::{
    BuildEvent, BuildRequest, BuildStream, ContainerSummary, CreateContainerRequest,
    CreateNetworkRequest, ImageSummary, NetworkEndpoint, NetworkSummary, RuntimeAdapter,
};

/// Buffered build events between the daemon pump and the consumer.
const BUILD_EVENT_BUFFER: usize = 64;

/// Connect to the daemon using the local defaults and make sure it answers.
pub async fn connect_docker() -> Result<Docker, RuntimeError> {
    let docker = Docker::connect_with_local_defaults().map_err(docker_error)?;
    docker.ping().await.map_err(docker_error)?;
    Ok(docker)
}

fn docker_error(e: bollard::errors::Error) -> RuntimeError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        other => RuntimeError::Docker {
            reason: other.to_string(),
        },
    }
}

fn serialize_error(e: serde_json::Error) -> RuntimeError {
    RuntimeError::Docker {
        reason: format!("failed to encode daemon response: {}", e),
    }
}

/// Docker implementation of the runtime façade.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect with local defaults (`DOCKER_HOST`, then the platform socket).
    pub async fn connect() -> Result<Self, RuntimeError> {
        Ok(Self::new(connect_docker().await?))
    }
}

/// Extract the image id from the legacy `Successfully built <id>` line.
fn parse_built_image_id(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix("Successfully built ")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// Translate one daemon progress record into build events.
///
/// An `error` record ends the build: it is surfaced as an error line and
/// then as the classified failure.
fn translate_build_info(info: BuildInfo, image_id: &mut Option<String>) -> Vec<BuildEvent> {
    let mut events = Vec::new();

    if let Some(id) = info.aux.and_then(|aux| aux.id) {
        *image_id = Some(id);
    }

    if let Some(line) = info.stream {
        if image_id.is_none()
            && let Some(id) = parse_built_image_id(&line)
        {
            *image_id = Some(id);
        }
        events.push(BuildEvent::Log(line));
    }

    let error = info
        .error
        .or_else(|| info.error_detail.and_then(|detail| detail.message));
    if let Some(message) = error {
        events.push(BuildEvent::ErrorLine(message.clone()));
        events.push(BuildEvent::Failure {
            partial_logs: Vec::new(),
            message,
        });
    }

    events
}

/// Drain the daemon's build stream into `tx`, ending with exactly one
/// terminal item unless the receiver goes away first.
async fn pump_build(
    docker: Docker,
    request: BuildRequest,
    tx: mpsc::Sender<Result<BuildEvent, RuntimeError>>,
) {
    let options = BuildImageOptions {
        dockerfile: request.dockerfile,
        t: request.tag,
        rm: true,
        ..Default::default()
    };
    let mut stream = Box::pin(docker.build_image(options, None, Some(request.context)));
    let mut image_id: Option<String> = None;

    while let Some(item) = stream.next().await {
        let (events, terminal): (Vec<Result<BuildEvent, RuntimeError>>, bool) = match item {
            Ok(info) => {
                let events = translate_build_info(info, &mut image_id);
                let terminal = events
                    .iter()
                    .any(|e| matches!(e, BuildEvent::Failure { .. }));
                (events.into_iter().map(Ok).collect(), terminal)
            }
            Err(bollard::errors::Error::DockerStreamError { error }) => (
                vec![
                    Ok(BuildEvent::ErrorLine(error.clone())),
                    Ok(BuildEvent::Failure {
                        partial_logs: Vec::new(),
                        message: error,
                    }),
                ],
                true,
            ),
            Err(e) => (vec![Err(docker_error(e))], true),
        };

        for event in events {
            if tx.send(event).await.is_err() {
                return;
            }
        }
        if terminal {
            return;
        }
    }

    let last = match image_id {
        Some(image_id) => BuildEvent::Success { image_id },
        None => BuildEvent::Failure {
            partial_logs: Vec::new(),
            message: "build finished without reporting an image id".to_string(),
        },
    };
    let _ = tx.send(Ok(last)).await;
}

#[async_trait]
impl RuntimeAdapter for DockerRuntime {
    async fn version(&self) -> Result<serde_json::Value, RuntimeError> {
        let version = self.docker.version().await.map_err(docker_error)?;
        serde_json::to_value(version).map_err(serialize_error)
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, RuntimeError> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(docker_error)?;

        Ok(images
            .into_iter()
            .map(|image| ImageSummary {
                id: image.id,
                tags: image
                    .repo_tags
                    .into_iter()
                    .filter(|t| t != "<none>:<none>")
                    .collect(),
            })
            .collect())
    }

    async fn pull_image(&self, repository: &str, tag: &str) -> Result<String, RuntimeError> {
        let options = CreateImageOptions {
            from_image: repository.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));
        while let Some(item) = progress.next().await {
            let info = item.map_err(docker_error)?;
            if let Some(status) = info.status {
                tracing::debug!(repository, tag, status = %status, "Pull progress");
            }
        }

        let reference = format!("{}:{}", repository, tag);
        let image = self
            .docker
            .inspect_image(&reference)
            .await
            .map_err(docker_error)?;
        image.id.ok_or_else(|| RuntimeError::Docker {
            reason: format!("pulled image {} has no id", reference),
        })
    }

    fn build(&self, request: BuildRequest) -> BuildStream {
        let docker = self.docker.clone();
        // Nothing reaches the daemon until the stream is first polled.
        let started = futures::stream::once(async move {
            let (tx, rx) = mpsc::channel(BUILD_EVENT_BUFFER);
            tokio::spawn(pump_build(docker, request, tx));
            ReceiverStream::new(rx)
        });
        Box::pin(started.flatten())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(docker_error)?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                name: c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                status: c.state.unwrap_or_default(),
                image: c.image.into_iter().collect(),
            })
            .collect())
    }

    async fn create_container(
        &self,
        request: CreateContainerRequest,
    ) -> Result<String, RuntimeError> {
        let options = request.name.map(|name| CreateContainerOptions {
            name,
            ..Default::default()
        });
        let config = Config {
            image: Some(request.image),
            cmd: request.command,
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(options, config)
            .await
            .map_err(docker_error)?;
        for warning in &response.warnings {
            tracing::warn!(container_id = %response.id, "Daemon warning: {}", warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container::<String>(id, None)
            .await
            .map_err(docker_error)
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(id, None)
            .await
            .map_err(docker_error)
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(docker_error)
    }

    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let chunks: Vec<_> = self
            .docker
            .logs(id, Some(options))
            .try_collect()
            .await
            .map_err(docker_error)?;

        let mut logs = String::new();
        for chunk in chunks {
            logs.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }
        Ok(logs)
    }

    async fn create_network(&self, request: CreateNetworkRequest) -> Result<String, RuntimeError> {
        let name = request.name.clone();
        let options = CreateNetworkOptions {
            name: request.name,
            driver: request.driver,
            options: request.options,
            labels: request.labels,
            ..Default::default()
        };
        self.docker
            .create_network(options)
            .await
            .map_err(docker_error)?;

        let network = self
            .docker
            .inspect_network(&name, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(docker_error)?;
        network.id.ok_or_else(|| RuntimeError::Docker {
            reason: format!("network {} was created without an id", name),
        })
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, RuntimeError> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(docker_error)?;

        Ok(networks
            .into_iter()
            .map(|n| NetworkSummary {
                id: n.id.unwrap_or_default(),
                name: n.name.unwrap_or_default(),
                driver: n.driver.unwrap_or_default(),
            })
            .collect())
    }

    async fn inspect_network(&self, id: &str) -> Result<serde_json::Value, RuntimeError> {
        let network = self
            .docker
            .inspect_network(id, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(docker_error)?;
        serde_json::to_value(network).map_err(serialize_error)
    }

    async fn network_containers(&self, id: &str) -> Result<Vec<NetworkEndpoint>, RuntimeError> {
        let network = self
            .docker
            .inspect_network(id, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(docker_error)?;

        let mut endpoints: Vec<NetworkEndpoint> = network
            .containers
            .unwrap_or_default()
            .into_iter()
            .map(|(container_id, c)| NetworkEndpoint {
                container_id,
                name: c.name,
                ipv4_address: c.ipv4_address,
                ipv6_address: c.ipv6_address,
                mac_address: c.mac_address,
            })
            .collect();
        endpoints.sort_by(|a, b| a.container_id.cmp(&b.container_id));
        Ok(endpoints)
    }
}
