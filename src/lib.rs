pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod core_state;
pub mod pipeline;
pub mod store;
pub mod vcs;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use crate::auth::{AuthError, UserDirectory};
use crate::cli::Args;
use crate::config::{AppConfig, ConfigError};
use crate::core_state::CoreState;
use crate::pipeline::taxonomy::{Taxonomy, TaxonomyError, TaxonomySource};
use crate::vcs::p4::LoginState;
use crate::vcs::P4Tool;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
    #[error("Failed to create data directory {path}: {source}")]
    DataDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Install the global tracing subscriber. `RUST_LOG` overrides `--debug`.
pub fn init_tracing(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter(debug))),
        )
        .init();
}

/// Load configuration, log in to Perforce and serve until Ctrl-C.
pub async fn run(mut args: Args) -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    tracing::debug!("Debugging is enabled");

    let users = UserDirectory::load(&args.auth_file)?;
    let app_config = AppConfig::load(&args.config)?;
    let taxonomy = taxonomy_source(&args.sort_config, args.cache_taxonomy)?;

    std::fs::create_dir_all(&args.data_dir).map_err(|source| StartupError::DataDir {
        path: args.data_dir.clone(),
        source,
    })?;

    let timeout = Duration::from_secs(args.p4_timeout_secs);
    let p4 = P4Tool::from_config(&app_config, timeout);
    if app_config.p4_config_path().is_none() {
        tracing::warn!(config = %args.config.display(), "P4CONFIG not set, p4 will use its environment defaults");
    }
    let password = args.p4_password.take().map(Zeroizing::new);
    bootstrap_login(&p4, password.as_deref().map(String::as_str)).await;
    drop(password);

    let core = Arc::new(CoreState::new(
        users,
        args.data_dir.clone(),
        taxonomy,
        Arc::new(p4),
    ));

    let listener = api::server::bind(&args.port).await?;
    api::serve_on(listener, core, api::server::shutdown_signal()).await?;
    Ok(())
}

/// Cached: loaded now and fatal if broken. Otherwise read per request, with a
/// startup check that only warns.
pub fn taxonomy_source(path: &Path, cache: bool) -> Result<TaxonomySource, TaxonomyError> {
    if cache {
        let taxonomy = Taxonomy::load(path)?;
        tracing::info!(path = %path.display(), documents = taxonomy.entries().len(), "Taxonomy cached");
        return Ok(TaxonomySource::Cached(Arc::new(taxonomy)));
    }
    if let Err(e) = Taxonomy::load(path) {
        tracing::warn!(path = %path.display(), error = %e, "Taxonomy not loadable yet, JSON uploads will fail until fixed");
    }
    Ok(TaxonomySource::File(path.to_path_buf()))
}

/// Best effort: a failed login is logged, not fatal.
async fn bootstrap_login(p4: &P4Tool, password: Option<&str>) {
    match p4.ensure_login(password).await {
        Ok(LoginState::AlreadyLoggedIn) => {}
        Ok(LoginState::LoggedIn) => tracing::info!("Logged in to Perforce"),
        Err(e) => {
            tracing::warn!(error = %e, "Perforce login failed, syncs will fail until a ticket is available");
            return;
        }
    }
    if !p4.has_valid_ticket().await {
        tracing::warn!("No valid Perforce ticket found");
    }
}
