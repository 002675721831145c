use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_CONFIG_FILE, DEFAULT_SORT_CONFIG_FILE, DEFAULT_TOOL_TIMEOUT_SECS};

/// Companion to the Prometheus pushgateway: accepts monitoring data per
/// customer and instance and checks the rendered reports into Perforce.
#[derive(Parser, Debug, Clone)]
#[command(name = "datapushgateway", version, about)]
pub struct Args {
    /// Pushgateway web config listing basic_auth_users and their bcrypt hashes
    #[arg(long = "auth.file")]
    pub auth_file: PathBuf,

    /// Address to listen on; `:PORT` binds every interface
    #[arg(long, default_value = ":9092")]
    pub port: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Directory where uploaded data is stored
    #[arg(short = 'd', long = "data", default_value = "data")]
    pub data_dir: PathBuf,

    /// Application config (P4CONFIG, p4bin)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Taxonomy mapping monitor tags to report files
    #[arg(long, default_value = DEFAULT_SORT_CONFIG_FILE)]
    pub sort_config: PathBuf,

    /// Load the taxonomy once at startup instead of on every request
    #[arg(long)]
    pub cache_taxonomy: bool,

    /// Upper bound in seconds for a single p4 invocation
    #[arg(long, default_value_t = DEFAULT_TOOL_TIMEOUT_SECS)]
    pub p4_timeout_secs: u64,

    /// Perforce password used when no valid ticket exists at startup
    #[arg(long, env = "DATAPUSHGATEWAY_P4_PASSWORD", hide_env_values = true)]
    pub p4_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pushgateway_companion() {
        let args = Args::try_parse_from(["datapushgateway", "--auth.file", "auth.yaml"]).unwrap();
        assert_eq!(args.auth_file, PathBuf::from("auth.yaml"));
        assert_eq!(args.port, ":9092");
        assert_eq!(args.data_dir, PathBuf::from("data"));
        assert_eq!(args.config, PathBuf::from("config.yaml"));
        assert_eq!(args.sort_config, PathBuf::from("mdconfigs/sort.yaml"));
        assert_eq!(args.p4_timeout_secs, 120);
        assert!(!args.debug);
        assert!(!args.cache_taxonomy);
    }

    #[test]
    fn short_data_flag_and_overrides() {
        let args = Args::try_parse_from([
            "datapushgateway",
            "--auth.file",
            "a.yaml",
            "-d",
            "/srv/data",
            "--port",
            "127.0.0.1:8080",
            "--p4-timeout-secs",
            "5",
            "--debug",
            "--cache-taxonomy",
        ])
        .unwrap();
        assert_eq!(args.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(args.port, "127.0.0.1:8080");
        assert_eq!(args.p4_timeout_secs, 5);
        assert!(args.debug);
        assert!(args.cache_taxonomy);
    }

    #[test]
    fn auth_file_is_required() {
        assert!(Args::try_parse_from(["datapushgateway"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
