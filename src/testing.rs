//! In-memory runtime for tests.
//!
//! [`StubRuntime`] implements [`RuntimeAdapter`] without a Docker daemon.
//! Builds replay scripts queued with [`StubRuntime::push_build`]; the other
//! operations act on small in-memory tables.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::error::RuntimeError;
use crate::runtime::{
    BuildEvent, BuildRequest, BuildStream, ContainerSummary, CreateContainerRequest,
    CreateNetworkRequest, ImageSummary, NetworkEndpoint, NetworkSummary, RuntimeAdapter,
};

/// One step of a scripted build.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Emit(BuildEvent),
    /// Yield an unclassified `RuntimeError::Docker` with this reason.
    Fail(String),
    /// Let other tasks run before the next step.
    Yield,
    /// Panic inside the consuming task.
    Panic(&'static str),
}

impl ScriptStep {
    pub fn log(line: impl Into<String>) -> Self {
        Self::Emit(BuildEvent::Log(line.into()))
    }

    pub fn error_line(line: impl Into<String>) -> Self {
        Self::Emit(BuildEvent::ErrorLine(line.into()))
    }

    pub fn success(image_id: impl Into<String>) -> Self {
        Self::Emit(BuildEvent::Success {
            image_id: image_id.into(),
        })
    }

    pub fn failure<I, S>(partial_logs: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Emit(BuildEvent::Failure {
            partial_logs: partial_logs.into_iter().map(Into::into).collect(),
            message: message.into(),
        })
    }
}

/// Image id reported by builds that have no queued script.
pub const DEFAULT_IMAGE_ID: &str = "sha256:stub";

#[derive(Default)]
struct State {
    scripts: VecDeque<Vec<ScriptStep>>,
    build_requests: Vec<BuildRequest>,
    images: Vec<ImageSummary>,
    containers: Vec<ContainerSummary>,
    networks: Vec<(NetworkSummary, Vec<NetworkEndpoint>)>,
    next_id: usize,
}

/// Scriptable [`RuntimeAdapter`].
#[derive(Default)]
pub struct StubRuntime {
    state: Mutex<State>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StubRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next unscripted build. Scripts are consumed in
    /// the order builds are started.
    pub fn push_build(&self, script: Vec<ScriptStep>) {
        lock(&self.state).scripts.push_back(script);
    }

    /// Make every later build wait for a permit on the returned semaphore
    /// before producing its first event.
    pub fn hold_builds(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *lock(&self.gate) = Some(Arc::clone(&gate));
        gate
    }

    /// Requests passed to [`RuntimeAdapter::build`], oldest first.
    pub fn build_requests(&self) -> Vec<BuildRequest> {
        lock(&self.state).build_requests.clone()
    }

    pub fn add_image(&self, id: impl Into<String>, tags: &[&str]) {
        lock(&self.state).images.push(ImageSummary {
            id: id.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
    }

    /// Attach a container to an existing network.
    pub fn connect(&self, network_id: &str, container_id: &str) -> Result<(), RuntimeError> {
        let mut state = lock(&self.state);
        let (_, endpoints) = state
            .networks
            .iter_mut()
            .find(|(n, _)| n.id == network_id)
            .ok_or_else(|| RuntimeError::NotFound(format!("network {}", network_id)))?;
        endpoints.push(NetworkEndpoint {
            container_id: container_id.to_string(),
            name: None,
            ipv4_address: Some("172.18.0.2/16".to_string()),
            ipv6_address: None,
            mac_address: None,
        });
        Ok(())
    }

    fn with_container<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ContainerSummary) -> R,
    ) -> Result<R, RuntimeError> {
        let mut state = lock(&self.state);
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id || c.name == id)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {}", id)))?;
        Ok(f(container))
    }
}

fn default_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::log("Step 1/1 : FROM scratch"),
        ScriptStep::success(DEFAULT_IMAGE_ID),
    ]
}

fn run_step(step: ScriptStep) -> Option<Result<BuildEvent, RuntimeError>> {
    match step {
        ScriptStep::Emit(event) => Some(Ok(event)),
        ScriptStep::Fail(reason) => Some(Err(RuntimeError::Docker { reason })),
        ScriptStep::Yield => None,
        ScriptStep::Panic(message) => panic!("{}", message),
    }
}

#[async_trait]
impl RuntimeAdapter for StubRuntime {
    async fn version(&self) -> Result<serde_json::Value, RuntimeError> {
        Ok(json!({
            "Version": "stub",
            "ApiVersion": "1.47",
            "Os": std::env::consts::OS,
            "Arch": std::env::consts::ARCH,
        }))
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, RuntimeError> {
        Ok(lock(&self.state).images.clone())
    }

    async fn pull_image(&self, repository: &str, tag: &str) -> Result<String, RuntimeError> {
        let reference = format!("{}:{}", repository, tag);
        let id = format!("sha256:{}", reference.replace([':', '/'], "-"));
        let mut state = lock(&self.state);
        if !state.images.iter().any(|i| i.id == id) {
            state.images.push(ImageSummary {
                id: id.clone(),
                tags: vec![reference],
            });
        }
        Ok(id)
    }

    fn build(&self, request: BuildRequest) -> BuildStream {
        let script = {
            let mut state = lock(&self.state);
            state.build_requests.push(request);
            state.scripts.pop_front().unwrap_or_else(default_script)
        };
        let gate = lock(&self.gate).clone();

        Box::pin(
            futures::stream::once(async move {
                if let Some(gate) = gate {
                    if let Ok(permit) = gate.acquire_owned().await {
                        permit.forget();
                    }
                }
                futures::stream::iter(script).filter_map(|step| async move {
                    if matches!(step, ScriptStep::Yield) {
                        tokio::task::yield_now().await;
                    }
                    run_step(step)
                })
            })
            .flatten(),
        )
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        Ok(lock(&self.state).containers.clone())
    }

    async fn create_container(
        &self,
        request: CreateContainerRequest,
    ) -> Result<String, RuntimeError> {
        let mut state = lock(&self.state);
        if !state
            .images
            .iter()
            .any(|i| i.id == request.image || i.tags.contains(&request.image))
        {
            return Err(RuntimeError::NotFound(format!("image {}", request.image)));
        }
        state.next_id += 1;
        let id = format!("stub-container-{}", state.next_id);
        let name = request.name.unwrap_or_else(|| id.clone());
        state.containers.push(ContainerSummary {
            id: id.clone(),
            name,
            status: "created".to_string(),
            image: vec![request.image],
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.with_container(id, |c| c.status = "running".to_string())
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.with_container(id, |c| c.status = "exited".to_string())
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = lock(&self.state);
        let before = state.containers.len();
        state.containers.retain(|c| c.id != id && c.name != id);
        if state.containers.len() == before {
            return Err(RuntimeError::NotFound(format!("container {}", id)));
        }
        Ok(())
    }

    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError> {
        self.with_container(id, |c| format!("{} is {}\n", c.name, c.status))
    }

    async fn create_network(&self, request: CreateNetworkRequest) -> Result<String, RuntimeError> {
        let mut state = lock(&self.state);
        if state.networks.iter().any(|(n, _)| n.name == request.name) {
            return Err(RuntimeError::Docker {
                reason: format!("network with name {} already exists", request.name),
            });
        }
        let id = format!("stub-network-{}", request.name);
        state.networks.push((
            NetworkSummary {
                id: id.clone(),
                name: request.name,
                driver: request.driver,
            },
            Vec::new(),
        ));
        Ok(id)
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, RuntimeError> {
        Ok(lock(&self.state)
            .networks
            .iter()
            .map(|(n, _)| n.clone())
            .collect())
    }

    async fn inspect_network(&self, id: &str) -> Result<serde_json::Value, RuntimeError> {
        let state = lock(&self.state);
        let (network, endpoints) = state
            .networks
            .iter()
            .find(|(n, _)| n.id == id || n.name == id)
            .ok_or_else(|| RuntimeError::NotFound(format!("network {}", id)))?;
        Ok(json!({
            "Id": network.id,
            "Name": network.name,
            "Driver": network.driver,
            "Containers": endpoints.len(),
        }))
    }

    async fn network_containers(&self, id: &str) -> Result<Vec<NetworkEndpoint>, RuntimeError> {
        let state = lock(&self.state);
        state
            .networks
            .iter()
            .find(|(n, _)| n.id == id || n.name == id)
            .map(|(_, endpoints)| endpoints.clone())
            .ok_or_else(|| RuntimeError::NotFound(format!("network {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn request() -> BuildRequest {
        BuildRequest {
            context: Bytes::new(),
            tag: "t".to_string(),
            dockerfile: "Dockerfile".to_string(),
        }
    }

    #[tokio::test]
    async fn scripts_replay_in_order_and_skip_yields() {
        let runtime = StubRuntime::new();
        runtime.push_build(vec![
            ScriptStep::log("a"),
            ScriptStep::Yield,
            ScriptStep::success("sha256:1"),
        ]);

        let events: Vec<_> = runtime.build(request()).collect().await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            [
                BuildEvent::Log("a".to_string()),
                BuildEvent::Success {
                    image_id: "sha256:1".to_string()
                }
            ]
        );

        // Falls back to the default script once the queue is empty.
        let events: Vec<_> = runtime.build(request()).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(runtime.build_requests().len(), 2);
    }

    #[tokio::test]
    async fn container_lifecycle() {
        let runtime = StubRuntime::new();
        runtime.pull_image("alpine", "3.20").await.unwrap();

        let id = runtime
            .create_container(CreateContainerRequest {
                image: "alpine:3.20".to_string(),
                command: None,
                name: Some("web".to_string()),
            })
            .await
            .unwrap();
        runtime.start_container(&id).await.unwrap();
        assert_eq!(runtime.list_containers().await.unwrap()[0].status, "running");

        runtime.remove_container("web").await.unwrap();
        assert!(matches!(
            runtime.stop_container(&id).await,
            Err(RuntimeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_image_cannot_be_used() {
        let runtime = StubRuntime::new();
        let err = runtime
            .create_container(CreateContainerRequest {
                image: "ghost".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound(_)));
    }
}
