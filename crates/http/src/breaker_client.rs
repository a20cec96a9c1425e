//! Circuit-breaker protected HTTP client.
//!
//! Each call consults the breaker registered for the client's command name.
//! Admitted calls run exactly once under the breaker's timeout and report
//! their outcome; there is no retry loop. Responses the classifier marks
//! retryable (5xx by default) count as breaker failures but are still
//! returned to the caller.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use breakwater_common::resilience::{
    BreakerError, BreakerRegistry, CircuitBreaker, CircuitBreakerConfig,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, instrument};

use crate::classifier::{DefaultClassifier, StatusClassifier};
use crate::client::Client;
use crate::config::ClientSettings;
use crate::error::{ClientError, TransportError};
use crate::plugin::{Plugin, Plugins};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::transport::{ReqwestTransport, Transport};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Substitute result for a failed or rejected call.
pub type Fallback = Arc<dyn Fn(ClientError) -> Result<HttpResponse, ClientError> + Send + Sync>;

/// HTTP client guarded by a named circuit breaker.
#[derive(Clone)]
pub struct CircuitBreakerClient {
    command: String,
    breaker: Arc<CircuitBreaker>,
    transport: Arc<dyn Transport>,
    classifier: Arc<dyn StatusClassifier>,
    plugins: Plugins,
    default_headers: HeaderMap,
    fallback: Option<Fallback>,
}

impl CircuitBreakerClient {
    /// Start building a client for `command`.
    pub fn builder(command: impl Into<String>) -> CircuitBreakerClientBuilder {
        CircuitBreakerClientBuilder::new(command)
    }

    /// Client on the default transport and the global breaker registry.
    ///
    /// `timeout` bounds the transport; `config.timeout` bounds each call.
    pub fn new(
        command: impl Into<String>,
        timeout: Duration,
        config: CircuitBreakerConfig,
    ) -> Result<Self, ClientError> {
        Self::builder(command).timeout(timeout).config(config).build()
    }

    /// Client for `command` configured from loaded settings.
    pub fn from_settings(
        command: impl Into<String>,
        settings: &ClientSettings,
    ) -> Result<Self, ClientError> {
        Self::builder(command).settings(settings)?.build()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// The breaker this client shares with every client of the same command.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    #[instrument(skip_all, fields(command = %self.command, method = %request.method(), url = %request.url()))]
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, ClientError> {
        request.merge_default_headers(&self.default_headers);

        self.plugins.request_start(&request);
        let started = Instant::now();

        let classifier = &self.classifier;
        let outcome = self
            .breaker
            .execute_with(
                || self.transport.execute(request.clone()),
                |response: &HttpResponse| !classifier.is_retryable_status(response.status()),
            )
            .await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(response) => {
                self.plugins.request_end(&request, &response, elapsed);
                Ok(response)
            }
            Err(error) => {
                let error = into_client_error(error);
                self.plugins.error(&request, &error, elapsed);
                self.recover(error)
            }
        }
    }

    fn recover(&self, error: ClientError) -> Result<HttpResponse, ClientError> {
        match &self.fallback {
            Some(fallback) => {
                debug!(command = %self.command, error = %error, "invoking fallback");
                fallback(error)
            }
            None => Err(error),
        }
    }
}

fn into_client_error(error: BreakerError<TransportError>) -> ClientError {
    match error {
        BreakerError::Rejected(rejection) => rejection.into(),
        BreakerError::OperationFailed { source } => ClientError::Transport(source),
        BreakerError::Timeout { timeout } => ClientError::Timeout { timeout },
    }
}

#[async_trait]
impl Client for CircuitBreakerClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        self.send(request).await
    }
}

impl fmt::Debug for CircuitBreakerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerClient")
            .field("command", &self.command)
            .field("breaker", &self.breaker)
            .field("plugins", &self.plugins)
            .field("fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`CircuitBreakerClient`].
pub struct CircuitBreakerClientBuilder {
    command: String,
    timeout: Duration,
    config: CircuitBreakerConfig,
    registry: Option<Arc<BreakerRegistry>>,
    transport: Option<Arc<dyn Transport>>,
    classifier: Arc<dyn StatusClassifier>,
    plugins: Plugins,
    default_headers: HeaderMap,
    fallback: Option<Fallback>,
}

impl CircuitBreakerClientBuilder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_TIMEOUT,
            config: CircuitBreakerConfig::default(),
            registry: None,
            transport: None,
            classifier: Arc::new(DefaultClassifier),
            plugins: Plugins::default(),
            default_headers: HeaderMap::new(),
            fallback: None,
        }
    }

    /// Timeout of the default transport; `Duration::ZERO` disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Breaker configuration, used only if the command is not registered
    /// yet.
    pub fn config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Registry to look the breaker up in; the global registry by default.
    pub fn registry(mut self, registry: Arc<BreakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Decides which responses count as breaker failures.
    pub fn classifier(mut self, classifier: impl StatusClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers.extend(headers);
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.append(name, value);
        self
    }

    /// Called with the error of any rejected, timed out or failed call; its
    /// result replaces the error.
    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(ClientError) -> Result<HttpResponse, ClientError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Apply the timeout and this command's breaker section of `settings`.
    pub fn settings(self, settings: &ClientSettings) -> Result<Self, ClientError> {
        let config = settings.breaker_config(&self.command)?;
        Ok(self.timeout(settings.timeout).config(config))
    }

    pub fn build(self) -> Result<CircuitBreakerClient, ClientError> {
        let registry = self.registry.unwrap_or_else(BreakerRegistry::global);
        let breaker = registry.get_or_create(&self.command, &self.config)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };

        Ok(CircuitBreakerClient {
            command: self.command,
            breaker,
            transport,
            classifier: self.classifier,
            plugins: self.plugins,
            default_headers: self.default_headers,
            fallback: self.fallback,
        })
    }
}

impl fmt::Debug for CircuitBreakerClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerClientBuilder")
            .field("command", &self.command)
            .field("timeout", &self.timeout)
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}
