//! Retrying HTTP client.
//!
//! Every attempt sends a fresh clone of the request through the transport
//! under the per-attempt timeout. Transport errors, timeouts and responses
//! the classifier marks retryable are retried with the configured backoff
//! until the retry budget or the deadline runs out.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use breakwater_common::resilience::{
    Attempt, AttemptContext, BackoffStrategy, Retrier, RetryPolicy,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, instrument};

use crate::classifier::{DefaultClassifier, StatusClassifier};
use crate::client::Client;
use crate::config::ClientSettings;
use crate::error::{AttemptFailure, ClientError};
use crate::plugin::{Plugin, Plugins};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::transport::{ReqwestTransport, Transport};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with retry, backoff and per-attempt timeouts.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    retrier: Retrier,
    timeout: Option<Duration>,
    classifier: Arc<dyn StatusClassifier>,
    plugins: Plugins,
    default_headers: HeaderMap,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Client on the default transport that never retries.
    ///
    /// `Duration::ZERO` disables the timeout.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        Self::builder().timeout(timeout).build()
    }

    /// Client configured from loaded settings.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ClientError> {
        Self::builder().settings(settings)?.build()
    }

    pub fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Execute `request`, giving up once `deadline` passes.
    ///
    /// The deadline bounds every attempt and every backoff wait.
    pub async fn execute_with_deadline(
        &self,
        request: HttpRequest,
        deadline: Instant,
    ) -> Result<HttpResponse, ClientError> {
        self.send(request, Some(deadline)).await
    }

    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    async fn send(
        &self,
        mut request: HttpRequest,
        deadline: Option<Instant>,
    ) -> Result<HttpResponse, ClientError> {
        request.merge_default_headers(&self.default_headers);
        let request = &request;

        self.retrier
            .run(deadline, move |ctx| self.attempt(request, ctx))
            .await
            .map_err(ClientError::from)
    }

    async fn attempt(
        &self,
        request: &HttpRequest,
        ctx: AttemptContext,
    ) -> Attempt<HttpResponse, AttemptFailure> {
        self.plugins.request_start(request);
        let started = Instant::now();

        let outcome = match attempt_timeout(self.timeout, ctx.remaining()) {
            Some(limit) => tokio::time::timeout(limit, self.transport.execute(request.clone()))
                .await
                .map_err(|_| limit),
            None => Ok(self.transport.execute(request.clone()).await),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(response)) => {
                self.plugins.request_end(request, &response, elapsed);
                if self.classifier.is_retryable_status(response.status()) {
                    debug!(attempt = ctx.attempt + 1, status = %response.status(), "retryable status");
                    Attempt::Retryable(AttemptFailure::Status(response))
                } else {
                    Attempt::Done(response)
                }
            }
            Ok(Err(error)) => {
                self.plugins.error(request, &error, elapsed);
                if self.classifier.is_retryable_error(&error) {
                    Attempt::Retryable(AttemptFailure::Transport(error))
                } else {
                    Attempt::Fatal(AttemptFailure::Transport(error))
                }
            }
            Err(limit) => {
                let failure = AttemptFailure::Timeout { timeout: limit };
                self.plugins.error(request, &failure, elapsed);
                Attempt::Retryable(failure)
            }
        }
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        self.send(request, None).await
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("retrier", &self.retrier)
            .field("timeout", &self.timeout)
            .field("plugins", &self.plugins)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

/// The tighter of the configured timeout and the time left before the
/// deadline.
fn attempt_timeout(configured: Option<Duration>, remaining: Option<Duration>) -> Option<Duration> {
    match (configured, remaining) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    timeout: Duration,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: RetryPolicy,
    classifier: Arc<dyn StatusClassifier>,
    plugins: Plugins,
    default_headers: HeaderMap,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            transport: None,
            retry_policy: RetryPolicy::no_retry(),
            classifier: Arc::new(DefaultClassifier),
            plugins: Plugins::default(),
            default_headers: HeaderMap::new(),
        }
    }
}

impl HttpClientBuilder {
    /// Per-attempt timeout, also applied to the default transport.
    /// `Duration::ZERO` disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the default pooled transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Share one transport between several clients.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Retries allowed after the first attempt.
    pub fn retry_count(mut self, retries: u32) -> Self {
        self.retry_policy.max_retries = retries;
        self
    }

    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.retry_policy.backoff = backoff;
        self
    }

    pub fn classifier(mut self, classifier: impl StatusClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Headers added to every attempt unless the request sets them itself.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers.extend(headers);
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.append(name, value);
        self
    }

    /// Apply the timeout and retry section of `settings`.
    pub fn settings(self, settings: &ClientSettings) -> Result<Self, ClientError> {
        let policy = settings.retry_policy()?;
        Ok(self.timeout(settings.timeout).retry_policy(policy))
    }

    pub fn build(self) -> Result<HttpClient, ClientError> {
        let retrier = Retrier::new(self.retry_policy)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };

        Ok(HttpClient {
            transport,
            retrier,
            timeout: (!self.timeout.is_zero()).then_some(self.timeout),
            classifier: self.classifier,
            plugins: self.plugins,
            default_headers: self.default_headers,
        })
    }
}

impl fmt::Debug for HttpClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientBuilder")
            .field("timeout", &self.timeout)
            .field("custom_transport", &self.transport.is_some())
            .field("retry_policy", &self.retry_policy)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
