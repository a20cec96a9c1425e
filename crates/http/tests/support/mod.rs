//! Shared test transports for `breakwater` integration tests.
//!
//! These stand in for the network so tests control exactly what each attempt
//! sees and can count how many attempts reached the transport.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use breakwater::{HttpRequest, HttpResponse, Transport, TransportError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;

/// What a scripted attempt produces.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(StatusCode, &'static str),
    Fail(&'static str),
    /// Respond after a delay.
    Slow(Duration, StatusCode),
}

/// Plays back a script of outcomes, repeating the last step once the script
/// runs out.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Step>>>,
    last: Arc<Mutex<Step>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let script: VecDeque<Step> = steps.into_iter().collect();
        let last = script.back().cloned().unwrap_or(Step::Respond(StatusCode::OK, ""));
        Self {
            script: Arc::new(Mutex::new(script)),
            last: Arc::new(Mutex::new(last)),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new([step])
    }

    pub fn ok() -> Self {
        Self::always(Step::Respond(StatusCode::OK, "ok"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(step) => step,
            None => self.last.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        match self.next_step() {
            Step::Respond(status, body) => Ok(response(status, body)),
            Step::Fail(message) => Err(TransportError::connect(message)),
            Step::Slow(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(response(status, ""))
            }
        }
    }
}

/// Adds basic-auth credentials to every request before delegating.
pub struct BasicAuthTransport<T> {
    inner: T,
    credentials: HeaderValue,
}

impl<T: Transport> BasicAuthTransport<T> {
    /// Credentials for `username:passwd`.
    pub fn new(inner: T) -> Self {
        Self { inner, credentials: HeaderValue::from_static("Basic dXNlcm5hbWU6cGFzc3dk") }
    }
}

#[async_trait]
impl<T: Transport> Transport for BasicAuthTransport<T> {
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        request.headers_mut().insert(AUTHORIZATION, self.credentials.clone());
        self.inner.execute(request).await
    }
}

pub fn response(status: StatusCode, body: &str) -> HttpResponse {
    HttpResponse::new(status, HeaderMap::new(), body.as_bytes().to_vec())
}

pub const BASE_URL: &str = "http://localhost:9090";
