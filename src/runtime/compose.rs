//! `docker compose` subprocess runner.

use std::path::Path;

use tokio::process::Command;

use crate::error::RuntimeError;

/// Compose sub-commands exposed through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    Up,
    Down,
    Ps,
    Logs,
    /// Validate and print the resolved file.
    Config,
}

impl ComposeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Ps => "ps",
            Self::Logs => "logs",
            Self::Config => "config",
        }
    }

    /// `config` only inspects the file, so it never targets a project.
    fn uses_project(&self) -> bool {
        !matches!(self, Self::Config)
    }

    /// Trailing arguments after `-f <file>`.
    fn args(&self) -> &'static [&'static str] {
        match self {
            Self::Up => &["up", "-d"],
            Self::Down => &["down"],
            Self::Ps => &["ps"],
            Self::Logs => &["logs"],
            Self::Config => &["config"],
        }
    }
}

impl std::str::FromStr for ComposeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "ps" => Ok(Self::Ps),
            "logs" => Ok(Self::Logs),
            "config" => Ok(Self::Config),
            other => Err(format!("unknown compose action: {}", other)),
        }
    }
}

impl std::fmt::Display for ComposeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runs compose actions against an uploaded compose file.
#[derive(Debug, Clone)]
pub struct ComposeRunner {
    binary: String,
}

impl Default for ComposeRunner {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ComposeRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command_args(
        action: ComposeAction,
        file: &Path,
        project_name: Option<&str>,
    ) -> Vec<String> {
        let mut args = vec!["compose".to_string()];
        if let Some(project) = project_name.filter(|_| action.uses_project()) {
            args.push("-p".to_string());
            args.push(project.to_string());
        }
        args.push("-f".to_string());
        args.push(file.display().to_string());
        args.extend(action.args().iter().map(|a| a.to_string()));
        args
    }

    /// Write `compose_file` to a scratch directory and run `action` on it.
    ///
    /// Returns stdout on success; a non-zero exit becomes
    /// [`RuntimeError::Compose`] carrying stderr.
    pub async fn run(
        &self,
        action: ComposeAction,
        compose_file: &[u8],
        project_name: Option<&str>,
    ) -> Result<String, RuntimeError> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("docker-compose.yml");
        tokio::fs::write(&file, compose_file).await?;

        let args = Self::command_args(action, &file, project_name);
        tracing::debug!(binary = %self.binary, args = ?args, "Running compose");

        let output = Command::new(&self.binary).args(&args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(action = %action, status = %output.status, "Compose command failed");
            return Err(RuntimeError::Compose {
                action: action.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
