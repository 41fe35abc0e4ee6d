mod config;

use httpmock::MockServer;

/// Config that lets the pipeline talk to a local mock server.
pub fn local_config(server: &MockServer) -> crate::config::Config {
    let mut config = crate::config::Config::default();
    config.policy.block_private_ips = false;
    config.request_timeout_ms = 2000;
    config.logo_service_base_url = server.url("/logo");
    config
}
