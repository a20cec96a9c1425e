//! Walk through the four client setups against a local server.
//!
//! ```text
//! RUST_LOG=debug cargo run -p breakwater --features observability --example client
//! ```

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use breakwater::{
    BackoffStrategy, CircuitBreakerClient, CircuitBreakerConfig, Client, HttpClient, HttpRequest,
    HttpResponse, ReqwestTransport, RequestLogger, Transport, TransportError,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{info, warn};

const BASE_URL: &str = "http://localhost:9090";

/// Sends basic-auth credentials for `username:passwd` on every request.
struct BasicAuthTransport {
    inner: ReqwestTransport,
}

#[async_trait]
impl Transport for BasicAuthTransport {
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcm5hbWU6cGFzc3dk"));
        self.inner.execute(request).await
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

fn command_config() -> anyhow::Result<CircuitBreakerConfig> {
    Ok(CircuitBreakerConfig::builder()
        .timeout(Duration::from_millis(1100))
        .max_concurrent_requests(100)
        .error_percent_threshold(25)
        .sleep_window(Duration::from_millis(10))
        .request_volume_threshold(10)
        .build()?)
}

fn constant_backoff() -> BackoffStrategy {
    BackoffStrategy::constant_with_jitter(Duration::from_millis(10), Duration::from_millis(5))
}

async fn http_client_usage() -> anyhow::Result<()> {
    let client = HttpClient::builder()
        .timeout(Duration::from_millis(100))
        .retry_count(2)
        .backoff(constant_backoff())
        .plugin(RequestLogger)
        .build()?;

    let response = client
        .get(BASE_URL, json_headers())
        .await
        .context("failed to make a request to server")?;
    info!(body = %response.text(), "retrying client response");
    Ok(())
}

async fn breaker_client_usage() -> anyhow::Result<()> {
    let client = CircuitBreakerClient::builder("MyCommand")
        .timeout(Duration::from_millis(100))
        .config(command_config()?)
        .plugin(RequestLogger)
        .build()?;

    let response = client
        .get(BASE_URL, HeaderMap::new())
        .await
        .context("failed to make a request to server")?;
    info!(body = %response.text(), "breaker client response");
    Ok(())
}

async fn custom_transport_usage() -> anyhow::Result<()> {
    let client = HttpClient::builder()
        .timeout(Duration::ZERO)
        .transport(BasicAuthTransport { inner: ReqwestTransport::new(Duration::from_millis(25))? })
        .retry_count(2)
        .backoff(constant_backoff())
        .build()?;

    let response = client
        .get(BASE_URL, json_headers())
        .await
        .context("failed to make a request to server")?;
    info!(body = %response.text(), "custom transport response");
    Ok(())
}

async fn custom_breaker_transport_usage() -> anyhow::Result<()> {
    let client = CircuitBreakerClient::builder("MyCommand")
        .timeout(Duration::ZERO)
        .config(command_config()?)
        .transport(BasicAuthTransport { inner: ReqwestTransport::new(Duration::from_millis(25))? })
        .build()?;

    let response = client
        .get(BASE_URL, HeaderMap::new())
        .await
        .context("failed to make a request to server")?;
    info!(body = %response.text(), "custom breaker transport response");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    breakwater_common::observability::init_tracing("info,breakwater=debug")?;

    for (name, outcome) in [
        ("http client", http_client_usage().await),
        ("breaker client", breaker_client_usage().await),
        ("custom transport", custom_transport_usage().await),
        ("custom breaker transport", custom_breaker_transport_usage().await),
    ] {
        if let Err(error) = outcome {
            warn!(demo = name, error = %format!("{error:#}"), "demo failed");
        }
    }
    Ok(())
}
