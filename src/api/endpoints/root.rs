//! Landing endpoint.

/// Body of `GET /`, used by probes to identify the service.
pub const BANNER: &str = "Data PushGateway\n";

/// `GET /`
pub async fn banner() -> &'static str {
    BANNER
}
