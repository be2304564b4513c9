//! API client over a pluggable HTTP backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::request::{Body, Part, Request, RequestBuilder};
use crate::timeout::{FetchPolicy, TimeoutConfig};
use crate::{FetchError, Method, Response};

/// Something that can execute a request.
///
/// Production code uses [`ReqwestBackend`]; tests plug in an in-memory one.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, FetchError>;
}

/// Supplies the bearer token for authenticated calls.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, mostly for tools and tests.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

/// [`HttpBackend`] backed by `reqwest`, with a cookie store for the
/// session endpoints.
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(timeout: &TimeoutConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(timeout.connect)
            .build()
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }

    fn form(parts: Vec<Part>) -> Result<reqwest::multipart::Form, FetchError> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            form = match part {
                Part::Text { name, value } => form.text(name, value),
                Part::File {
                    name,
                    filename,
                    mime,
                    bytes,
                } => {
                    let file = reqwest::multipart::Part::bytes(bytes)
                        .file_name(filename)
                        .mime_str(&mime)
                        .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
                    form.part(name, file)
                }
            };
        }
        Ok(form)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(0)
    } else if e.is_decode() {
        FetchError::Deserialization(e.to_string())
    } else if e.is_builder() {
        FetchError::InvalidRequest(e.to_string())
    } else {
        FetchError::Connection(e.to_string())
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: Request) -> Result<Response, FetchError> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Bytes(bytes) | Body::Json(bytes) => builder.body(bytes),
            Body::Multipart(parts) => builder.multipart(Self::form(parts)?),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(Response::new(status, headers, body))
    }
}

/// HTTP client for the marketplace API.
///
/// Cheap to clone; clones share the backend and token source.
#[derive(Clone)]
pub struct FetchClient {
    backend: Arc<dyn HttpBackend>,
    base_url: Option<String>,
    default_headers: HashMap<String, String>,
    token_source: Option<Arc<dyn TokenSource>>,
    policy: FetchPolicy,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .field("authenticated", &self.token_source.is_some())
            .finish()
    }
}

impl FetchClient {
    /// Create a client over `backend`.
    pub fn new(backend: Arc<dyn HttpBackend>) -> Self {
        let mut default_headers = HashMap::new();
        default_headers.insert("Accept".to_string(), "application/json".to_string());
        Self {
            backend,
            base_url: None,
            default_headers,
            token_source: None,
            policy: FetchPolicy::default(),
        }
    }

    /// Create a client backed by `reqwest`.
    pub fn reqwest(policy: FetchPolicy) -> Result<Self, FetchError> {
        let backend = ReqwestBackend::new(&policy.timeout)?;
        Ok(Self::new(Arc::new(backend)).with_policy(policy))
    }

    /// Create a client with a base URL that will be prepended to all requests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a default header that will be included in all requests.
    pub fn with_default_header(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    /// Attach `Authorization: Bearer` from `source` to every request.
    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Create a GET request.
    pub fn get(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Get, url)
    }

    /// Create a POST request.
    pub fn post(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Post, url)
    }

    /// Create a PUT request.
    pub fn put(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Put, url)
    }

    /// Create a PATCH request.
    pub fn patch(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Patch, url)
    }

    /// Create a DELETE request.
    pub fn delete(&self, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        self.request(Method::Delete, url)
    }

    /// Create a request with a custom method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> ClientRequestBuilder<'_> {
        let url = url.into();
        let full_url = match &self.base_url {
            Some(base) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                format!("{}{}", base.trim_end_matches('/'), url)
            }
            _ => url,
        };

        let mut builder = RequestBuilder::new(method, full_url);
        for (key, value) in &self.default_headers {
            builder = builder.header(key.clone(), value.clone());
        }

        ClientRequestBuilder {
            client: self,
            builder,
        }
    }

    async fn attempt(&self, request: Request) -> Result<Response, FetchError> {
        let total = self.policy.timeout.total;
        match tokio::time::timeout(total, self.backend.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.policy.timeout.total_millis())),
        }
    }

    /// Execute with the client's timeout, retrying safe methods.
    ///
    /// Retryable HTTP statuses are surfaced as errors only after the last
    /// attempt; other statuses are returned as responses.
    async fn execute(&self, request: Request) -> Result<Response, FetchError> {
        let retry = &self.policy.retry;
        let mut attempt = 0u32;
        loop {
            debug!(method = %request.method, url = %request.url, attempt, "api request");
            let outcome = match self.attempt(request.clone()).await {
                Ok(resp) if resp.is_server_error() => Err(resp),
                Ok(resp) => return Ok(resp),
                Err(e) => Ok(e),
            };
            let error = match &outcome {
                Ok(e) => e.clone(),
                Err(resp) => FetchError::Http {
                    status: resp.status,
                    message: format!("HTTP {}", resp.status),
                },
            };
            if !(request.method.is_safe() && retry.should_retry(&error, attempt)) {
                return match outcome {
                    Ok(e) => Err(e),
                    Err(resp) => Ok(resp),
                };
            }
            let delay = retry.backoff.delay_for_attempt(attempt);
            warn!(method = %request.method, url = %request.url, error = %error, ?delay, "retrying api request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// A request builder bound to a client.
pub struct ClientRequestBuilder<'a> {
    client: &'a FetchClient,
    builder: RequestBuilder,
}

impl<'a> ClientRequestBuilder<'a> {
    /// Add a header to the request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.header(key, value);
        self
    }

    /// Append query parameters.
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.builder = self.builder.query(pairs);
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, FetchError> {
        self.builder = self.builder.json(value)?;
        Ok(self)
    }

    /// Set a multipart form body.
    pub fn multipart(mut self, parts: Vec<Part>) -> Self {
        self.builder = self.builder.multipart(parts);
        self
    }

    /// Add a bearer token authorization header.
    pub fn bearer_auth(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_auth(token);
        self
    }

    /// Send the request and return the response, whatever its status.
    pub async fn send(self) -> Result<Response, FetchError> {
        let mut builder = self.builder;
        if !builder.has_header("Authorization") {
            if let Some(token) = self
                .client
                .token_source
                .as_ref()
                .and_then(|s| s.bearer_token())
            {
                builder = builder.bearer_auth(token);
            }
        }
        let request = builder.build();
        let method = request.method;
        let url = request.url.clone();
        let response = self.client.execute(request).await?;
        debug!(%method, %url, status = response.status, "api response");
        Ok(response)
    }

    /// Send and fail on non-2xx statuses.
    pub async fn execute(self) -> Result<Response, FetchError> {
        self.send().await?.error_for_status()
    }

    /// Send, fail on non-2xx statuses and decode the JSON body.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<T, FetchError> {
        self.execute().await?.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Scripted {
        replies: Mutex<Vec<Result<Response, FetchError>>>,
        seen: Mutex<Vec<Request>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Response, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HttpBackend for Scripted {
        async fn execute(&self, request: Request) -> Result<Response, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok(Response::new(200, HashMap::new(), b"{}".to_vec()))
            } else {
                replies.remove(0)
            }
        }
    }

    fn ok(body: &str) -> Result<Response, FetchError> {
        Ok(Response::new(200, HashMap::new(), body.as_bytes().to_vec()))
    }

    fn status(code: u16, body: &str) -> Result<Response, FetchError> {
        Ok(Response::new(code, HashMap::new(), body.as_bytes().to_vec()))
    }

    fn policy(retries: u32) -> FetchPolicy {
        FetchPolicy::new(
            TimeoutConfig::from_total(Duration::from_secs(5)),
            crate::RetryPolicy::new(retries).with_backoff(crate::BackoffStrategy::None),
        )
    }

    #[tokio::test]
    async fn test_base_url_and_token_are_applied() {
        let backend = Scripted::new(vec![ok(r#"{"n":1}"#)]);
        let client = FetchClient::new(backend.clone())
            .with_base_url("http://api.test/")
            .with_token_source(Arc::new(StaticToken("abc".into())));

        let value: serde_json::Value = client.get("/cart").fetch().await.unwrap();
        assert_eq!(value["n"], 1);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].url, "http://api.test/cart");
        assert_eq!(seen[0].header("Authorization"), Some("Bearer abc"));
        assert_eq!(seen[0].header("Accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_get_retries_server_errors() {
        let backend = Scripted::new(vec![status(503, ""), ok("[]")]);
        let client = FetchClient::new(backend.clone()).with_policy(policy(2));
        let list: Vec<u8> = client.get("http://api.test/order").fetch().await.unwrap();
        assert!(list.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mutations_are_not_retried() {
        let backend = Scripted::new(vec![Err(FetchError::Connection("reset".into()))]);
        let client = FetchClient::new(backend.clone()).with_policy(policy(3));
        let err = client
            .put("http://api.test/cart/update")
            .send()
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Connection("reset".into()));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_last_server_error_surfaces_body_message() {
        let backend = Scripted::new(vec![
            status(500, r#"{"message":"db down"}"#),
            status(500, r#"{"message":"db down"}"#),
        ]);
        let client = FetchClient::new(backend.clone()).with_policy(policy(1));
        let err = client.get("http://api.test/x").execute().await.unwrap_err();
        assert_eq!(err.user_message(), "db down");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    struct Slow;

    #[async_trait]
    impl HttpBackend for Slow {
        async fn execute(&self, _request: Request) -> Result<Response, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Response::new(200, HashMap::new(), Vec::new()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_timeout() {
        let client = FetchClient::new(Arc::new(Slow)).with_policy(FetchPolicy::single_attempt(
            Duration::from_secs(2),
        ));
        let err = client.get("http://api.test/slow").send().await.unwrap_err();
        assert_eq!(err, FetchError::Timeout(2000));
    }
}
