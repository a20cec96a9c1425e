//! Pluggable request executor.
//!
//! Both clients hand every attempt to a [`Transport`]. The default
//! [`ReqwestTransport`] pools connections; callers replace it to add auth,
//! custom TLS, or canned responses in tests. A transport never retries and
//! never consults a breaker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::TransportError;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Executes one fully formed request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// Connection-pooling transport backed by `reqwest`.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Transport with a client-wide timeout; `Duration::ZERO` disables it.
    ///
    /// Proxies are taken from the environment (`HTTP_PROXY`, `HTTPS_PROXY`,
    /// `NO_PROXY`).
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Self::build(reqwest::Client::builder(), timeout)
    }

    /// Like [`Self::new`], but connects directly and ignores proxy settings.
    pub fn direct(timeout: Duration) -> Result<Self, TransportError> {
        Self::build(reqwest::Client::builder().no_proxy(), timeout)
    }

    fn build(mut builder: reqwest::ClientBuilder, timeout: Duration) -> Result<Self, TransportError> {
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(TransportError::from)?;
        Ok(Self { client })
    }

    /// Wrap a preconfigured `reqwest` client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(method = %request.method(), url = %request.url(), %status, bytes = body.len(), "received HTTP response");

        Ok(HttpResponse::new(status, headers, body.to_vec()))
    }
}
