//! Per-attempt hooks.
//!
//! Both clients call every registered [`Plugin`] once at the start of each
//! attempt and once when it ends, with either the response or the error.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Observer of request attempts. All hooks default to no-ops.
pub trait Plugin: Send + Sync {
    fn on_request_start(&self, _request: &HttpRequest) {}

    /// The attempt produced a response, whatever its status.
    fn on_request_end(&self, _request: &HttpRequest, _response: &HttpResponse, _elapsed: Duration) {}

    /// The attempt failed or was rejected before reaching the transport.
    fn on_error(&self, _request: &HttpRequest, _error: &(dyn Error + 'static), _elapsed: Duration) {}
}

/// Logs one `tracing` event per finished attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl Plugin for RequestLogger {
    fn on_request_end(&self, request: &HttpRequest, response: &HttpResponse, elapsed: Duration) {
        info!(
            method = %request.method(),
            url = %request.url(),
            status = response.status().as_u16(),
            elapsed_ms = elapsed_millis(elapsed),
            "request completed"
        );
    }

    fn on_error(&self, request: &HttpRequest, error: &(dyn Error + 'static), elapsed: Duration) {
        warn!(
            method = %request.method(),
            url = %request.url(),
            elapsed_ms = elapsed_millis(elapsed),
            error = %error,
            "request failed"
        );
    }
}

fn elapsed_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Ordered plugin list shared by a client and its clones.
#[derive(Clone, Default)]
pub(crate) struct Plugins(Vec<Arc<dyn Plugin>>);

impl Plugins {
    pub(crate) fn push(&mut self, plugin: Arc<dyn Plugin>) {
        self.0.push(plugin);
    }

    pub(crate) fn request_start(&self, request: &HttpRequest) {
        for plugin in &self.0 {
            plugin.on_request_start(request);
        }
    }

    pub(crate) fn request_end(&self, request: &HttpRequest, response: &HttpResponse, elapsed: Duration) {
        for plugin in &self.0 {
            plugin.on_request_end(request, response, elapsed);
        }
    }

    pub(crate) fn error(&self, request: &HttpRequest, error: &(dyn Error + 'static), elapsed: Duration) {
        for plugin in &self.0 {
            plugin.on_error(request, error, elapsed);
        }
    }
}

impl fmt::Debug for Plugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugins").field("count", &self.0.len()).finish()
    }
}
