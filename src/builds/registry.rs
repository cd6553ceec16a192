//! Process-wide store of build jobs, polled by clients.
//!
//! A single map-level `RwLock` guards every job. Each mutation (append a log
//! line, change status) runs under one write guard and each read clones the
//! job under one read guard, so a snapshot can never observe a half-applied
//! update. Because the executor appends every log line before it requests
//! the terminal transition, any snapshot that shows `completed` or `failed`
//! also shows the full log.
//!
//! Entries are never evicted; memory grows with the number of builds
//! submitted over the life of the process.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::RegistryError;

/// Lifecycle of a build job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal move.
    ///
    /// `queued -> failed` is allowed so a build whose task dies before it
    /// starts draining still reaches a terminal state.
    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A requested status change.
///
/// Terminal payloads live on the variant, so a completed job always has an
/// image id and never an error, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Running,
    Completed { image_id: String },
    Failed { error: String },
}

impl Transition {
    pub fn status(&self) -> BuildStatus {
        match self {
            Self::Running => BuildStatus::Running,
            Self::Completed { .. } => BuildStatus::Completed,
            Self::Failed { .. } => BuildStatus::Failed,
        }
    }
}

/// Snapshot of one build job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildJob {
    pub id: Uuid,
    pub status: BuildStatus,
    pub logs: Vec<String>,
    pub image_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BuildJob {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: BuildStatus::Queued,
            logs: Vec::new(),
            image_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Short listing entry for a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub build_id: Uuid,
    pub status: BuildStatus,
    pub log_lines: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Concurrent map from build id to job state.
///
/// Cheap to clone; all clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, BuildJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and insert a `queued` job under it.
    ///
    /// The insert has completed by the time this returns, so a `get` issued
    /// afterwards always finds the job.
    pub async fn create(&self) -> Uuid {
        let mut jobs = self.jobs.write().await;
        loop {
            let id = Uuid::new_v4();
            if let Entry::Vacant(slot) = jobs.entry(id) {
                slot.insert(BuildJob::new(id));
                return id;
            }
        }
    }

    /// Append one log line.
    pub async fn append_log(&self, id: Uuid, line: impl Into<String>) -> Result<(), RegistryError> {
        self.append_logs(id, std::iter::once(line.into())).await
    }

    /// Append several lines atomically, in iteration order.
    pub async fn append_logs<I>(&self, id: Uuid, lines: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        if job.status.is_terminal() {
            return Err(RegistryError::Finalized(id));
        }
        job.logs.extend(lines);
        job.updated_at = Utc::now();
        Ok(())
    }

    /// Apply a status transition, returning the previous status.
    pub async fn set_status(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<BuildStatus, RegistryError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;

        let from = job.status;
        let to = transition.status();
        if !from.can_transition_to(to) {
            return Err(RegistryError::InvalidTransition { id, from, to });
        }

        match transition {
            Transition::Running => {}
            Transition::Completed { image_id } => job.image_id = Some(image_id),
            Transition::Failed { error } => job.error = Some(error),
        }
        job.status = to;
        job.updated_at = Utc::now();

        Ok(from)
    }

    /// Consistent snapshot of a job.
    pub async fn get(&self, id: Uuid) -> Result<BuildJob, RegistryError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Summaries of every known job, oldest first.
    pub async fn list(&self) -> Vec<BuildSummary> {
        let jobs = self.jobs.read().await;
        let mut summaries: Vec<BuildSummary> = jobs
            .values()
            .map(|job| BuildSummary {
                build_id: job.id,
                status: job.status,
                log_lines: job.logs.len(),
                created_at: job.created_at,
                updated_at: job.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.build_id.cmp(&b.build_id))
        });
        summaries
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
