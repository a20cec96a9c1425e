//! Outbound request model.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use crate::error::TransportError;

/// A fully formed outbound request.
///
/// The body is buffered so every attempt can resend it. Clients clone the
/// request per attempt; the caller's value is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: None }
    }

    /// Parse `url` and build a request.
    pub fn parse(method: Method, url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|err| {
            TransportError::invalid_request(format!("invalid URL '{url}'")).with_source(err)
        })?;
        Ok(Self::new(method, url))
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Copy each default header whose name the request does not set itself.
    pub(crate) fn merge_default_headers(&mut self, defaults: &HeaderMap) {
        for name in defaults.keys() {
            if !self.headers.contains_key(name) {
                for value in defaults.get_all(name) {
                    self.headers.append(name.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::{ACCEPT, CONTENT_TYPE};

    use super::*;

    #[test]
    fn test_parse_rejects_relative_urls() {
        let err = HttpRequest::parse(Method::GET, "/relative").unwrap_err();
        assert_eq!(err.kind(), crate::error::TransportErrorKind::InvalidRequest);
    }

    #[test]
    fn test_headers_are_multi_valued_and_case_insensitive() {
        let request = HttpRequest::parse(Method::GET, "http://localhost:9090")
            .unwrap()
            .with_header(ACCEPT, HeaderValue::from_static("text/plain"))
            .with_header(ACCEPT, HeaderValue::from_static("application/json"));

        assert_eq!(request.headers().get_all("Accept").iter().count(), 2);
    }

    #[test]
    fn test_merge_keeps_request_headers() {
        let mut defaults = HeaderMap::new();
        defaults.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        defaults.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let original = HttpRequest::parse(Method::POST, "http://localhost:9090")
            .unwrap()
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .with_body("hello");

        let mut attempt = original.clone();
        attempt.merge_default_headers(&defaults);

        assert_eq!(attempt.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(attempt.headers()[ACCEPT], "*/*");
        assert!(original.headers().get(ACCEPT).is_none());
        assert_eq!(attempt.body(), Some(&b"hello"[..]));
    }
}
