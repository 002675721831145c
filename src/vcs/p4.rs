//! Perforce adapter.
//!
//! Every invocation runs the configured `p4` binary with `P4CONFIG` set on the
//! child only, scoped to the customer's workspace, and bounded by the tool
//! timeout.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use zeroize::{Zeroize, Zeroizing};

use super::command::{run_captured, run_checked, CommandSpec};
use super::{SyncTool, ToolError, Workspace};
use crate::config::AppConfig;

/// Depot paths in `p4 opened` output start with this.
const DEPOT_PATH_MARKER: &str = "//";
/// `p4 opened` report when nothing is pending.
const NOT_OPENED_MARKER: &str = "not opened";
const TRUST_ESTABLISHED_MARKER: &str = "Trust already established";
const VALID_TICKET_MARKER: &str = "ticket expires in";

/// How a login bootstrap ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    AlreadyLoggedIn,
    LoggedIn,
}

#[derive(Debug, Clone)]
pub struct P4Tool {
    binary: String,
    p4config: Option<PathBuf>,
    timeout: Duration,
}

impl P4Tool {
    pub fn new(binary: impl Into<String>, p4config: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            p4config,
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig, timeout: Duration) -> Self {
        Self::new(config.p4_binary(), config.p4_config_path(), timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn base_command(&self) -> CommandSpec {
        let spec = CommandSpec::new(self.binary.clone());
        match &self.p4config {
            Some(path) => spec.env("P4CONFIG", path.as_os_str()),
            None => spec,
        }
    }

    /// `p4 -d <ws> <args>` run from inside the workspace.
    fn workspace_command<'a>(
        &self,
        workspace: &Workspace,
        args: impl IntoIterator<Item = &'a str>,
    ) -> CommandSpec {
        self.base_command()
            .current_dir(&workspace.path)
            .arg("-d")
            .arg(workspace.path.display().to_string())
            .args(args)
    }

    async fn run_step<'a>(
        &self,
        workspace: &Workspace,
        args: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ToolError> {
        let spec = self.workspace_command(workspace, args);
        tracing::info!(customer = %workspace.customer_id, command = %spec.display(), "Running P4 command");
        run_checked(&spec, self.timeout).await.map(|_| ())
    }

    /// Whether the current ticket is accepted (`p4 login -s`).
    pub async fn login_status(&self) -> Result<bool, ToolError> {
        let spec = self.base_command().args(["login", "-s"]);
        Ok(run_captured(&spec, self.timeout).await?.success())
    }

    /// Whether `p4 tickets` lists an unexpired ticket.
    pub async fn has_valid_ticket(&self) -> bool {
        let spec = self.base_command().arg("tickets");
        match run_captured(&spec, self.timeout).await {
            Ok(capture) if capture.success() => capture.output.contains(VALID_TICKET_MARKER),
            Ok(capture) => {
                tracing::debug!(output = %capture.output, "Error checking tickets");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "Error checking tickets");
                false
            }
        }
    }

    /// Accept the server fingerprint unless trust is already established.
    pub async fn ensure_trust(&self) -> Result<(), ToolError> {
        let check = self.base_command().args(["trust", "-l"]);
        if let Ok(capture) = run_captured(&check, self.timeout).await {
            if capture.success() && capture.output.contains(TRUST_ESTABLISHED_MARKER) {
                tracing::info!("Perforce trust already established");
                return Ok(());
            }
        }
        let establish = self.base_command().args(["trust", "-y"]);
        let capture = run_checked(&establish, self.timeout).await?;
        tracing::info!(output = %capture.output.trim(), "p4 trust");
        Ok(())
    }

    /// `p4 login -a` with the password on stdin.
    pub async fn login(&self, password: &str) -> Result<(), ToolError> {
        let input = Zeroizing::new(format!("{password}\n"));
        let mut spec = self
            .base_command()
            .args(["login", "-a"])
            .stdin(input.as_bytes().to_vec());
        let result = run_checked(&spec, self.timeout).await;
        if let Some(buf) = spec.stdin.as_mut() {
            buf.zeroize();
        }
        let capture = result?;
        tracing::info!(output = %capture.output.trim(), "p4 login");
        Ok(())
    }

    /// Make sure the service account holds a ticket before serving.
    pub async fn ensure_login(&self, password: Option<&str>) -> Result<LoginState, ToolError> {
        if self.login_status().await? {
            tracing::info!("Already logged in to Perforce");
            return Ok(LoginState::AlreadyLoggedIn);
        }
        self.ensure_trust().await?;
        let password = password.ok_or(ToolError::LoginRequired)?;
        self.login(password).await?;
        Ok(LoginState::LoggedIn)
    }
}

#[async_trait]
impl SyncTool for P4Tool {
    async fn stage(&self, workspace: &Workspace) -> Result<(), ToolError> {
        self.run_step(workspace, ["rec"]).await
    }

    async fn synchronize(&self, workspace: &Workspace) -> Result<(), ToolError> {
        self.run_step(workspace, ["sync"]).await
    }

    async fn resolve_own(&self, workspace: &Workspace) -> Result<(), ToolError> {
        self.run_step(workspace, ["resolve", "-ay"]).await
    }

    async fn has_local_changes(&self, workspace: &Workspace) -> Result<bool, ToolError> {
        let file_spec = workspace.file_spec();
        let spec = self
            .base_command()
            .current_dir(&workspace.path)
            .args(["opened", file_spec.as_str()]);
        let capture = run_captured(&spec, self.timeout).await?;

        if capture.output.contains(NOT_OPENED_MARKER) {
            return Ok(false);
        }
        if !capture.success() {
            tracing::error!(command = %spec.display(), status = ?capture.status, "Error checking for changes");
            return Err(ToolError::Failed {
                command: spec.display(),
                status: capture.status,
                output: capture.output,
            });
        }
        Ok(capture.output.contains(DEPOT_PATH_MARKER))
    }

    async fn commit(&self, workspace: &Workspace, description: &str) -> Result<(), ToolError> {
        let file_spec = workspace.file_spec();
        let spec = self
            .base_command()
            .current_dir(&workspace.path)
            .args(["submit", "-d", description, file_spec.as_str()]);
        tracing::info!(customer = %workspace.customer_id, command = %spec.display(), "Running P4 command");
        run_checked(&spec, self.timeout).await.map(|_| ())
    }
}
