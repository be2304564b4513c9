//! In-memory [`HttpBackend`] for tests.
//!
//! Routes match on method and path; a `:name` segment matches any single
//! segment. The most recently registered matching route wins, so a test can
//! override a default reply mid-way.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{Body, FetchError, HttpBackend, Method, Part, Request, Response};

type Handler = Arc<dyn Fn(&Request) -> Result<Response, FetchError> + Send + Sync>;

struct Route {
    method: Method,
    pattern: String,
    handler: Handler,
    delay: Option<Duration>,
}

impl Route {
    fn matches(&self, method: Method, path: &str) -> bool {
        if self.method != method {
            return false;
        }
        let want: Vec<&str> = self.pattern.trim_matches('/').split('/').collect();
        let got: Vec<&str> = path.trim_matches('/').split('/').collect();
        want.len() == got.len()
            && want
                .iter()
                .zip(&got)
                .all(|(w, g)| w.starts_with(':') || w == g)
    }
}

/// A request as seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Multipart field names, in order.
    pub parts: Vec<String>,
    pub headers: HashMap<String, String>,
}

impl RecordedCall {
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Inner {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Mutex<Option<Duration>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Scriptable backend that records every call.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("calls", &self.calls().len())
            .finish()
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every reply without its own delay.
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut d) = self.inner.delay.lock() {
            *d = Some(delay);
        }
        self
    }

    fn push(&self, route: Route) {
        if let Ok(mut routes) = self.inner.routes.lock() {
            routes.push(route);
        }
    }

    /// Reply with a fixed status and JSON body.
    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.on_delayed(method, path, Duration::ZERO, status, body)
    }

    /// Reply after `delay`.
    pub fn on_delayed(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        status: u16,
        body: Value,
    ) -> &Self {
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        self.push(Route {
            method,
            pattern: path.to_string(),
            handler: Arc::new(move |_| Ok(Response::new(status, HashMap::new(), bytes.clone()))),
            delay: (!delay.is_zero()).then_some(delay),
        });
        self
    }

    /// Reply with a raw, possibly non-JSON body.
    pub fn on_raw(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        let bytes = body.as_bytes().to_vec();
        self.push(Route {
            method,
            pattern: path.to_string(),
            handler: Arc::new(move |_| Ok(Response::new(status, HashMap::new(), bytes.clone()))),
            delay: None,
        });
        self
    }

    /// Fail at the transport level, as if offline.
    pub fn fail(&self, method: Method, path: &str, error: FetchError) -> &Self {
        self.push(Route {
            method,
            pattern: path.to_string(),
            handler: Arc::new(move |_| Err(error.clone())),
            delay: None,
        });
        self
    }

    /// Compute the reply from the request.
    pub fn on_fn<F>(&self, method: Method, path: &str, f: F) -> &Self
    where
        F: Fn(&Request) -> (u16, Value) + Send + Sync + 'static,
    {
        self.push(Route {
            method,
            pattern: path.to_string(),
            handler: Arc::new(move |req| {
                let (status, body) = f(req);
                let bytes = serde_json::to_vec(&body).unwrap_or_default();
                Ok(Response::new(status, HashMap::new(), bytes))
            }),
            delay: None,
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner
            .calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Calls whose path matches `path` (`:name` segments allowed).
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        let matcher = Route {
            method,
            pattern: path.to_string(),
            handler: Arc::new(|_| Err(FetchError::Cancelled)),
            delay: None,
        };
        self.calls()
            .into_iter()
            .filter(|c| matcher.matches(c.method, &c.path))
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls_to(method, path).len()
    }

    /// Highest number of requests that were in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.inner.calls.lock() {
            calls.clear();
        }
        self.inner.peak.store(0, Ordering::SeqCst);
    }

    fn record(&self, request: &Request) {
        let (body, parts) = match &request.body {
            Body::Json(_) => (request.body.as_json(), Vec::new()),
            Body::Multipart(parts) => (None, parts.iter().map(|p: &Part| p.name().to_string()).collect()),
            _ => (None, Vec::new()),
        };
        let call = RecordedCall {
            method: request.method,
            path: request.path().to_string(),
            query: request.query.clone(),
            body,
            parts,
            headers: request.headers.clone(),
        };
        if let Ok(mut calls) = self.inner.calls.lock() {
            calls.push(call);
        }
    }

    fn route_for(&self, request: &Request) -> Option<(Handler, Option<Duration>)> {
        let routes = self.inner.routes.lock().ok()?;
        let path = request.path();
        routes
            .iter()
            .rev()
            .find(|r| r.matches(request.method, path))
            .map(|r| (r.handler.clone(), r.delay))
    }
}

#[async_trait]
impl HttpBackend for MockBackend {
    async fn execute(&self, request: Request) -> Result<Response, FetchError> {
        self.record(&request);
        let now = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.inner.active);

        let route = self.route_for(&request);
        let default_delay = self.inner.delay.lock().ok().and_then(|d| *d);
        let delay = route.as_ref().and_then(|(_, d)| *d).or(default_delay);
        match delay {
            Some(d) => tokio::time::sleep(d).await,
            None => tokio::task::yield_now().await,
        }

        match route {
            Some((handler, _)) => handler(&request),
            None => {
                let body = json!({"message": format!("No route for {} {}", request.method, request.path())});
                Ok(Response::new(
                    404,
                    HashMap::new(),
                    serde_json::to_vec(&body).unwrap_or_default(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchClient;

    #[tokio::test]
    async fn test_latest_route_wins_and_params_match() {
        let mock = MockBackend::new();
        mock.on(Method::Get, "/products/:id", 200, json!({"v": 1}));
        mock.on(Method::Get, "/products/:id", 200, json!({"v": 2}));
        let client = FetchClient::new(Arc::new(mock.clone()));

        let v: Value = client.get("/products/abc").fetch().await.unwrap();
        assert_eq!(v["v"], 2);
        assert_eq!(mock.count(Method::Get, "/products/:id"), 1);
        assert_eq!(mock.count(Method::Get, "/products/abc"), 1);
        assert_eq!(mock.count(Method::Get, "/products"), 0);
    }

    #[tokio::test]
    async fn test_unmatched_is_404() {
        let mock = MockBackend::new();
        let client = FetchClient::new(Arc::new(mock));
        let err = client.get("/nope").execute().await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_records_json_and_query() {
        let mock = MockBackend::new();
        mock.on(Method::Put, "/cart/update", 200, json!({}));
        let client = FetchClient::new(Arc::new(mock.clone()));
        client
            .put("/cart/update")
            .query([("a", "1")])
            .json(&json!({"item": {"quantity": 2}}))
            .unwrap()
            .execute()
            .await
            .unwrap();
        let call = &mock.calls()[0];
        assert_eq!(call.body.as_ref().unwrap()["item"]["quantity"], 2);
        assert_eq!(call.query_param("a"), Some("1"));
    }
}
