use anyhow::{Context, Result};
use replay_common::config::Config;

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("replay-client/", env!("CARGO_PKG_VERSION"));

/// Build the shared async HTTP client.
pub fn build_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.http_timeout())
        .build()
        .context("Cannot create HTTP client")
}
