//! Process-wide state shared by every request handler.
//!
//! Built once at startup from the CLI and config files, then wrapped in `Arc`.
//! Everything inside is either immutable or synchronises itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::UserDirectory;
use crate::pipeline::customer_lock::CustomerLocks;
use crate::pipeline::taxonomy::TaxonomySource;
use crate::vcs::{RepositorySyncAgent, SyncTool};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    /// Basic-auth users, loaded once.
    users: Arc<UserDirectory>,
    /// Working root: rendered reports and raw uploads live under `<data>/<customer>`.
    data_dir: PathBuf,
    taxonomy: TaxonomySource,
    agent: RepositorySyncAgent,
    /// Serialises render + sync per customer.
    locks: CustomerLocks,
}

impl CoreState {
    pub fn new(
        users: UserDirectory,
        data_dir: PathBuf,
        taxonomy: TaxonomySource,
        tool: Arc<dyn SyncTool>,
    ) -> Self {
        Self {
            users: Arc::new(users),
            data_dir,
            taxonomy,
            agent: RepositorySyncAgent::new(tool),
            locks: CustomerLocks::new(),
        }
    }

    pub fn users(&self) -> &Arc<UserDirectory> {
        &self.users
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn taxonomy(&self) -> &TaxonomySource {
        &self.taxonomy
    }

    pub fn agent(&self) -> &RepositorySyncAgent {
        &self.agent
    }

    pub fn locks(&self) -> &CustomerLocks {
        &self.locks
    }
}
