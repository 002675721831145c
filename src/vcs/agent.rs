//! Repository sync agent: stage → sync → resolve → {submit | nothing}.
//!
//! Each step aborts the session on failure; nothing is retried. The commit is
//! only issued when the status query reports open files under the customer's
//! workspace.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::{SyncError, SyncStep, SyncTool, Workspace};

/// Position of a session in the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Started,
    Staged,
    Synced,
    Resolved,
    Submitted,
    NoChanges,
}

/// Terminal result of a successful session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Submitted,
    NoChanges,
}

/// Ephemeral state of one sync run.
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub customer_id: String,
    pub instance_id: String,
    pub working_path: PathBuf,
    pub has_pending_changes: bool,
    pub state: SyncState,
}

impl SyncSession {
    fn advance(&mut self, state: SyncState) {
        tracing::debug!(
            customer = %self.customer_id,
            instance = %self.instance_id,
            from = ?self.state,
            to = ?state,
            "Sync state change"
        );
        self.state = state;
    }
}

/// Commit description recorded with every submit.
pub fn submit_description(customer_id: &str, instance_id: &str) -> String {
    format!("Customer: {customer_id}, Instance: {instance_id}, monitoring submit")
}

#[derive(Clone)]
pub struct RepositorySyncAgent {
    tool: Arc<dyn SyncTool>,
}

impl RepositorySyncAgent {
    pub fn new(tool: Arc<dyn SyncTool>) -> Self {
        Self { tool }
    }

    /// Reconcile `working_root/customer_id` with the shared repository.
    pub async fn sync(
        &self,
        customer_id: &str,
        instance_id: &str,
        working_root: &Path,
    ) -> Result<SyncOutcome, SyncError> {
        let workspace = Workspace::new(working_root, customer_id);
        let mut session = SyncSession {
            customer_id: customer_id.to_string(),
            instance_id: instance_id.to_string(),
            working_path: workspace.path.clone(),
            has_pending_changes: false,
            state: SyncState::Started,
        };

        let result = self.drive(&workspace, &mut session).await;
        match &result {
            Ok(outcome) => tracing::info!(
                customer = customer_id,
                instance = instance_id,
                outcome = ?outcome,
                "Sync completed"
            ),
            Err(err) => tracing::error!(
                customer = customer_id,
                instance = instance_id,
                step = %err.step,
                error = %err.source,
                "Sync aborted"
            ),
        }
        result
    }

    async fn drive(
        &self,
        workspace: &Workspace,
        session: &mut SyncSession,
    ) -> Result<SyncOutcome, SyncError> {
        tracing::info!(customer = %session.customer_id, step = %SyncStep::Stage, "Running sync step");
        self.tool
            .stage(workspace)
            .await
            .map_err(|e| SyncError::new(SyncStep::Stage, e))?;
        session.advance(SyncState::Staged);

        tracing::info!(customer = %session.customer_id, step = %SyncStep::Synchronize, "Running sync step");
        self.tool
            .synchronize(workspace)
            .await
            .map_err(|e| SyncError::new(SyncStep::Synchronize, e))?;
        session.advance(SyncState::Synced);

        tracing::info!(customer = %session.customer_id, step = %SyncStep::Resolve, "Running sync step");
        self.tool
            .resolve_own(workspace)
            .await
            .map_err(|e| SyncError::new(SyncStep::Resolve, e))?;
        session.advance(SyncState::Resolved);

        session.has_pending_changes = self
            .tool
            .has_local_changes(workspace)
            .await
            .map_err(|e| SyncError::new(SyncStep::Status, e))?;

        if !session.has_pending_changes {
            tracing::info!(customer = %session.customer_id, "No changes to submit");
            session.advance(SyncState::NoChanges);
            return Ok(SyncOutcome::NoChanges);
        }

        let description = submit_description(&session.customer_id, &session.instance_id);
        tracing::info!(customer = %session.customer_id, step = %SyncStep::Submit, "Running sync step");
        self.tool
            .commit(workspace, &description)
            .await
            .map_err(|e| SyncError::new(SyncStep::Submit, e))?;
        session.advance(SyncState::Submitted);
        Ok(SyncOutcome::Submitted)
    }
}
