//! Resilient HTTP client.
//!
//! Two clients share one request surface ([`Client`]):
//!
//! - [`HttpClient`] retries transport errors, timeouts and retryable
//!   responses with a configurable backoff.
//! - [`CircuitBreakerClient`] runs each call once behind a named circuit
//!   breaker with concurrency admission.
//!
//! Both delegate network work to a [`Transport`]; the default
//! [`ReqwestTransport`] pools connections, and any caller-supplied transport
//! is used verbatim.
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use breakwater::{BackoffStrategy, Client, HttpClient};
//! use reqwest::header::HeaderMap;
//!
//! # async fn run() -> Result<(), breakwater::ClientError> {
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_millis(100))
//!     .retry_count(2)
//!     .backoff(BackoffStrategy::constant_with_jitter(
//!         Duration::from_millis(10),
//!         Duration::from_millis(5),
//!     ))
//!     .build()?;
//!
//! let response = client.get("http://localhost:9090", HeaderMap::new()).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod breaker_client;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod plugin;
pub mod request;
pub mod response;
pub mod transport;

pub use breaker_client::{CircuitBreakerClient, CircuitBreakerClientBuilder, Fallback};
pub use breakwater_common::resilience::{
    BackoffStrategy, BreakerRegistry, CircuitBreakerConfig, CircuitState, RetryPolicy,
};
pub use breakwater_common::{ErrorClassification, ErrorSeverity};
pub use classifier::{DefaultClassifier, StatusClassifier};
pub use client::Client;
pub use config::ClientSettings;
pub use error::{AttemptFailure, ClientError, TransportError, TransportErrorKind};
pub use http_client::{HttpClient, HttpClientBuilder};
pub use plugin::{Plugin, RequestLogger};
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use transport::{ReqwestTransport, Transport};
