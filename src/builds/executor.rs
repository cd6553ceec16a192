//! Runs image builds in the background and records their progress.
//!
//! ```text
//!  submit() ──► registry.create()            status: queued
//!     │
//!     └─► spawn ──► set_status(Running)      status: running
//!                   drain BuildStream
//!                     Log / ErrorLine   ──► append_log
//!                     Success           ──► Completed { image_id }
//!                     Failure           ──► append partial logs, Failed { message }
//!                     Err(RuntimeError) ──► append message, Failed { message }
//!                     end of stream     ──► Failed
//! ```
//!
//! Each job has exactly one writer: the task spawned for it. Every log line
//! is appended before the terminal transition is requested. A supervisor
//! awaits the task and fails the job if the task panics, so no job is left
//! queued or running.
//!
//! There is no cap on concurrent builds and no retry; a failed build stays
//! failed until the caller resubmits.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::builds::registry::{JobRegistry, Transition};
use crate::error::RegistryError;
use crate::runtime::{BuildEvent, BuildRequest, BuildStream, RuntimeAdapter};

/// Accepts build requests and drives each one to a terminal state.
#[derive(Clone)]
pub struct BuildExecutor {
    registry: JobRegistry,
    runtime: Arc<dyn RuntimeAdapter>,
}

impl BuildExecutor {
    pub fn new(registry: JobRegistry, runtime: Arc<dyn RuntimeAdapter>) -> Self {
        Self { registry, runtime }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Register a job and start building in the background.
    ///
    /// Returns as soon as the job is visible in the registry; it never waits
    /// on the build itself.
    pub async fn submit(&self, request: BuildRequest) -> Uuid {
        let build_id = self.registry.create().await;

        tracing::info!(
            build_id = %build_id,
            tag = %request.tag,
            dockerfile = %request.dockerfile,
            context_bytes = request.context.len(),
            "Build accepted"
        );

        let worker = tokio::spawn(run_build(
            self.registry.clone(),
            Arc::clone(&self.runtime),
            build_id,
            request,
        ));
        tokio::spawn(supervise(self.registry.clone(), build_id, worker));

        build_id
    }
}

/// Turn an abnormal task exit into a `failed` job.
async fn supervise(registry: JobRegistry, build_id: Uuid, worker: JoinHandle<()>) {
    let Err(join_error) = worker.await else {
        return;
    };

    let reason = if join_error.is_panic() {
        "panicked"
    } else {
        "was cancelled"
    };
    tracing::error!(build_id = %build_id, "Build task {}", reason);

    finalize(
        &registry,
        build_id,
        Transition::Failed {
            error: format!("build task aborted: task {}", reason),
        },
    )
    .await;
}

async fn run_build(
    registry: JobRegistry,
    runtime: Arc<dyn RuntimeAdapter>,
    build_id: Uuid,
    request: BuildRequest,
) {
    if let Err(e) = registry.set_status(build_id, Transition::Running).await {
        tracing::error!(build_id = %build_id, error = %e, "Could not mark build running");
        return;
    }
    tracing::debug!(build_id = %build_id, "Build running");

    let outcome = drain(&registry, build_id, runtime.build(request)).await;
    finalize(&registry, build_id, outcome).await;
}

/// Consume the stream up to its first terminal item and decide the outcome.
async fn drain(registry: &JobRegistry, build_id: Uuid, mut stream: BuildStream) -> Transition {
    while let Some(item) = stream.next().await {
        match item {
            Ok(BuildEvent::Log(line)) | Ok(BuildEvent::ErrorLine(line)) => {
                record(registry, build_id, vec![line]).await;
            }
            Ok(BuildEvent::Success { image_id }) => {
                return Transition::Completed { image_id };
            }
            Ok(BuildEvent::Failure {
                partial_logs,
                message,
            }) => {
                record(registry, build_id, partial_logs).await;
                return Transition::Failed { error: message };
            }
            Err(e) => {
                let message = e.to_string();
                record(registry, build_id, vec![message.clone()]).await;
                return Transition::Failed { error: message };
            }
        }
    }

    Transition::Failed {
        error: "build stream ended without a result".to_string(),
    }
}

async fn record(registry: &JobRegistry, build_id: Uuid, lines: Vec<String>) {
    if lines.is_empty() {
        return;
    }
    for line in &lines {
        tracing::debug!(build_id = %build_id, "{}", line.trim_end());
    }
    if let Err(e) = registry.append_logs(build_id, lines).await {
        tracing::error!(build_id = %build_id, error = %e, "Dropped build log lines");
    }
}

async fn finalize(registry: &JobRegistry, build_id: Uuid, transition: Transition) {
    let summary = match &transition {
        Transition::Completed { image_id } => format!("completed with image {}", image_id),
        Transition::Failed { error } => format!("failed: {}", error),
        Transition::Running => "running".to_string(),
    };

    match registry.set_status(build_id, transition).await {
        Ok(_) => tracing::info!(build_id = %build_id, "Build {}", summary),
        Err(RegistryError::InvalidTransition { from, .. }) if from.is_terminal() => {
            tracing::debug!(build_id = %build_id, status = %from, "Build already finalized");
        }
        Err(e) => {
            tracing::error!(build_id = %build_id, error = %e, "Could not finalize build");
        }
    }
}
