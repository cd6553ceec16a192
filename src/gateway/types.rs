//! Request and response bodies for the gateway routes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builds::{BuildJob, BuildStatus};

// -- Builds --

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildAccepted {
    pub message: String,
    pub build_id: Uuid,
}

/// Poll response for one build. `image_id` and `error` serialize as `null`
/// when absent.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildLogsResponse {
    pub build_id: Uuid,
    pub status: BuildStatus,
    pub logs: Vec<String>,
    pub image_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BuildJob> for BuildLogsResponse {
    fn from(job: BuildJob) -> Self {
        Self {
            build_id: job.id,
            status: job.status,
            logs: job.logs,
            image_id: job.image_id,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

// -- Images --

#[derive(Debug, Default, Deserialize)]
pub struct PullImageRequest {
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullImageResponse {
    pub message: String,
    pub image_id: String,
}

// -- Containers --

/// A container command given either as one shell-like line or as argv.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Args(Vec<String>),
}

impl CommandSpec {
    /// Split into argv. A line is split on whitespace; quoting is not
    /// interpreted.
    pub fn into_args(self) -> Vec<String> {
        match self {
            Self::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            Self::Args(args) => args,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateContainerBody {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub command: Option<CommandSpec>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContainerActionResponse {
    pub message: String,
    pub container_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContainerLogsResponse {
    pub container_id: String,
    pub logs: String,
}

// -- Networks --

#[derive(Debug, Default, Deserialize)]
pub struct CreateNetworkBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub options: Option<HashMap<String, String>>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateNetworkResponse {
    pub message: String,
    pub network_id: String,
}

// -- Compose --

#[derive(Debug, Serialize, Deserialize)]
pub struct ComposeResponse {
    pub message: String,
    pub stdout: String,
}
