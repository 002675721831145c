//! Raw upload persistence for the `/data/` endpoint.

use std::path::{Path, PathBuf};

/// Sub-directory of a customer holding one file per instance.
pub const SERVERS_DIR: &str = "servers";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Path of an instance's raw upload: `<data>/<customer>/servers/<instance>.md`.
pub fn data_path(data_dir: &Path, customer_id: &str, instance_id: &str) -> PathBuf {
    data_dir
        .join(customer_id)
        .join(SERVERS_DIR)
        .join(format!("{instance_id}.md"))
}

/// Overwrite the instance's upload with `body`, creating directories as needed.
pub fn save_data(
    data_dir: &Path,
    customer_id: &str,
    instance_id: &str,
    body: &[u8],
) -> Result<PathBuf, StoreError> {
    let path = data_path(data_dir, customer_id, instance_id);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(&path, body).map_err(|source| StoreError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = body.len(), "Saved data");
    Ok(path)
}
