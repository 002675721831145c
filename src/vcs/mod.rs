//! Version-control synchronization of rendered reports.
//!
//! `SyncTool` is the capability the sync agent drives; `P4Tool` implements it
//! by shelling out to the Perforce CLI. Tests substitute a fake.

pub mod agent;
pub mod command;
pub mod mask;
pub mod p4;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

pub use agent::{RepositorySyncAgent, SyncOutcome, SyncSession, SyncState};
pub use p4::P4Tool;

/// Failure of a single tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },
    #[error("`{command}` exited with status {status:?}: {output}")]
    Failed {
        command: String,
        status: Option<i32>,
        output: String,
    },
    #[error("Not logged in and no password available")]
    LoginRequired,
}

impl ToolError {
    /// One-line description without command lines or tool output.
    pub fn summary(&self) -> String {
        match self {
            Self::Spawn { .. } => "tool could not be run".to_string(),
            Self::Timeout { timeout_secs, .. } => format!("timed out after {timeout_secs}s"),
            Self::Failed {
                status: Some(code), ..
            } => format!("exited with status {code}"),
            Self::Failed { status: None, .. } => "terminated by signal".to_string(),
            Self::LoginRequired => "not logged in".to_string(),
        }
    }
}

/// Step of a sync session, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    Stage,
    Synchronize,
    Resolve,
    Status,
    Submit,
}

impl SyncStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Synchronize => "sync",
            Self::Resolve => "resolve",
            Self::Status => "status",
            Self::Submit => "submit",
        }
    }
}

impl std::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed sync session, tagged with the step that failed.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct SyncError {
    pub step: SyncStep,
    #[source]
    pub source: ToolError,
}

impl SyncError {
    pub fn new(step: SyncStep, source: ToolError) -> Self {
        Self { step, source }
    }

    /// Step and failure kind, safe to return to clients.
    pub fn summary(&self) -> String {
        format!("{} failed: {}", self.step, self.source.summary())
    }
}

/// A customer's directory inside the version-controlled working root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub customer_id: String,
    pub path: PathBuf,
}

impl Workspace {
    /// `working_root/customer_id`, made absolute so file specs do not depend
    /// on the tool's working directory.
    pub fn new(working_root: &Path, customer_id: &str) -> Self {
        let joined = working_root.join(customer_id);
        let path = std::path::absolute(&joined).unwrap_or(joined);
        Self {
            customer_id: customer_id.to_string(),
            path,
        }
    }

    /// Tool file spec covering everything under this workspace.
    pub fn file_spec(&self) -> String {
        format!("{}/...", self.path.display())
    }
}

/// The version-control operations a sync session needs.
#[async_trait]
pub trait SyncTool: Send + Sync + 'static {
    /// Reconcile local additions, edits and deletions into the pending changelist.
    async fn stage(&self, workspace: &Workspace) -> Result<(), ToolError>;

    /// Pull the latest shared state into the working copy.
    async fn synchronize(&self, workspace: &Workspace) -> Result<(), ToolError>;

    /// Resolve conflicts in favour of the local version.
    async fn resolve_own(&self, workspace: &Workspace) -> Result<(), ToolError>;

    /// Whether anything under the workspace is still open for commit.
    async fn has_local_changes(&self, workspace: &Workspace) -> Result<bool, ToolError>;

    /// Commit the pending changes under the workspace.
    async fn commit(&self, workspace: &Workspace, description: &str) -> Result<(), ToolError>;
}
