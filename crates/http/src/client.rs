//! Request surface shared by both resilient clients.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::error::ClientError;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// A resilient HTTP client.
///
/// Implementors only provide [`Client::execute`]; the verb helpers build an
/// [`HttpRequest`] and delegate to it. An empty `body` sends no body.
#[async_trait]
pub trait Client: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError>;

    async fn get(&self, url: &str, headers: HeaderMap) -> Result<HttpResponse, ClientError> {
        self.execute(build(Method::GET, url, headers, Vec::new())?).await
    }

    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<HttpResponse, ClientError> {
        self.execute(build(Method::POST, url, headers, body)?).await
    }

    async fn put(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<HttpResponse, ClientError> {
        self.execute(build(Method::PUT, url, headers, body)?).await
    }

    async fn patch(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<HttpResponse, ClientError> {
        self.execute(build(Method::PATCH, url, headers, body)?).await
    }

    async fn delete(&self, url: &str, headers: HeaderMap) -> Result<HttpResponse, ClientError> {
        self.execute(build(Method::DELETE, url, headers, Vec::new())?).await
    }
}

fn build(
    method: Method,
    url: &str,
    headers: HeaderMap,
    body: Vec<u8>,
) -> Result<HttpRequest, ClientError> {
    let request = HttpRequest::parse(method, url)?.with_headers(headers);
    Ok(if body.is_empty() { request } else { request.with_body(body) })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use reqwest::header::HeaderValue;
    use reqwest::StatusCode;

    use super::*;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Client for Recording {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Vec::new()))
        }
    }

    #[tokio::test]
    async fn verb_helpers_build_requests() {
        let client = Recording::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        client.get("http://localhost:9090/a", headers.clone()).await.unwrap();
        client.post("http://localhost:9090/b", b"{}".to_vec(), HeaderMap::new()).await.unwrap();
        client.put("http://localhost:9090/c", Vec::new(), HeaderMap::new()).await.unwrap();
        client.patch("http://localhost:9090/d", b"x".to_vec(), HeaderMap::new()).await.unwrap();
        client.delete("http://localhost:9090/e", HeaderMap::new()).await.unwrap();

        let seen = client.seen.lock().unwrap();
        let methods: Vec<_> = seen.iter().map(|r| r.method().clone()).collect();
        assert_eq!(methods, vec![Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE]);
        assert_eq!(seen[0].headers()["x-request-id"], "abc");
        assert_eq!(seen[1].body(), Some(&b"{}"[..]));
        assert_eq!(seen[2].body(), None);
        assert_eq!(seen[4].url().path(), "/e");
    }

    #[tokio::test]
    async fn invalid_url_fails_before_execute() {
        let client = Recording::default();
        let err = client.get("not a url", HeaderMap::new()).await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert!(client.seen.lock().unwrap().is_empty());
    }
}
