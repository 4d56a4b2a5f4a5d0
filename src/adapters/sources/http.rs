//! Shared HTTP plumbing for source adapters.
//!
//! Builds a pooled `reqwest::Client` with the adapter's own timeout and a
//! browser User-Agent (several boards reject unknown agents), and maps
//! transport failures onto `FetchError`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::debug;

use crate::ports::price_source::FetchError;

const USER_AGENT: &str =
  "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Build an HTTP client with the given request timeout.
pub fn build_client(timeout: Duration) -> Result<Client> {
  Client::builder()
    .timeout(timeout)
    .user_agent(USER_AGENT)
    .pool_max_idle_per_host(2)
    .build()
    .context("Failed to build HTTP client")
}

/// GET `url` and return the body as text; non-2xx is an error.
pub async fn get_text(client: &Client, url: &str) -> Result<String, FetchError> {
  let response = client.get(url).send().await?;
  let status = response.status();
  if !status.is_success() {
    debug!(url, status = status.as_u16(), "Upstream returned error status");
    return Err(FetchError::Http { status: status.as_u16() });
  }
  Ok(response.text().await?)
}
