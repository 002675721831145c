use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Application-level constants
pub const APP_NAME: &str = "datapushgateway";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Token in taxonomy paths and names replaced with the instance identifier.
pub const INSTANCE_PLACEHOLDER: &str = "%INSTANCE%";

/// Default location of the application config (P4CONFIG, p4bin).
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default location of the taxonomy (sort) config.
pub const DEFAULT_SORT_CONFIG_FILE: &str = "mdconfigs/sort.yaml";

/// Default upper bound for a single external tool invocation.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

/// Request body limit for the upload endpoints.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter(debug: bool) -> &'static str {
    if debug {
        "datapushgateway=debug,axum::rejection=trace"
    } else {
        "datapushgateway=info"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// `applicationConfig` block of config.yaml.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ApplicationConfig {
    /// Path to the `.p4config` file exported as `P4CONFIG` to the tool.
    #[serde(rename = "P4CONFIG", default)]
    pub p4config: String,
    /// Perforce binary; `p4` on the PATH when empty.
    #[serde(rename = "p4bin", default)]
    pub p4bin: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(rename = "applicationConfig", default)]
    pub application: ApplicationConfig,
}

impl AppConfig {
    /// Load config.yaml. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Application config not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Binary to invoke, falling back to `p4` on the PATH.
    pub fn p4_binary(&self) -> &str {
        if self.application.p4bin.trim().is_empty() {
            "p4"
        } else {
            self.application.p4bin.trim()
        }
    }

    /// P4CONFIG value, if one was configured.
    pub fn p4_config_path(&self) -> Option<PathBuf> {
        let trimmed = self.application.p4config.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}
