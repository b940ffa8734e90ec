use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// Minimal HTTP method enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Build a request carrying a JSON body.
    pub fn json(
        method: HttpMethod,
        url: impl Into<String>,
        headers: HttpHeaders,
        body: &serde_json::Value,
    ) -> Self {
        let mut headers = headers;
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        Self {
            method,
            url: url.into(),
            headers,
            body: body.to_string().into_bytes(),
        }
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error messages.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure classes used to decide whether a call is worth a reconnect and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Pool, connect or request timeout.
    Timeout,
    /// The connection was dropped under us.
    ConnectionReset,
    /// The upstream gateway answered 502.
    UpstreamUnavailable,
    /// Anything else.
    Other,
}

impl ErrorKind {
    #[must_use]
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("upstream unavailable (HTTP {status})")]
    UpstreamUnavailable { status: u16 },

    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

impl HttpError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            HttpError::Timeout(_) => ErrorKind::Timeout,
            HttpError::ConnectionReset(_) => ErrorKind::ConnectionReset,
            HttpError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            HttpError::Transport(_) | HttpError::NoMockResponse { .. } => ErrorKind::Other,
        }
    }
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Builds a fresh transport, used when a client drops its connection pool.
pub type TransportFactory =
    Arc<dyn Fn() -> Result<Arc<dyn HttpTransport>, HttpError> + Send + Sync>;

/// A transport handle that can be replaced while other calls hold the old one.
///
/// Callers clone the current `Arc` for the duration of a request, so a
/// `reset()` never interrupts a request already in flight; that request
/// simply finishes (or fails) on the old connection pool.
pub struct SwappableTransport {
    current: RwLock<Arc<dyn HttpTransport>>,
    factory: TransportFactory,
}

impl SwappableTransport {
    pub fn new(factory: TransportFactory) -> Result<Self, HttpError> {
        let initial = factory()?;
        Ok(Self {
            current: RwLock::new(initial),
            factory,
        })
    }

    /// The transport new requests should use.
    #[must_use]
    pub fn current(&self) -> Arc<dyn HttpTransport> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Replace the transport with a freshly built one.
    pub fn reset(&self) -> Result<(), HttpError> {
        let fresh = (self.factory)()?;
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = fresh;
        Ok(())
    }
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub mod reqwest_transport {
    use super::*;

    use std::error::Error as _;
    use std::time::Duration as StdDuration;

    /// A real HTTP transport backed by reqwest.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| HttpError::Transport(e.to_string()))?;
            Ok(Self { client })
        }

        /// Factory producing a new client (and connection pool) on every call.
        pub fn factory(timeout: StdDuration) -> TransportFactory {
            Arc::new(move || -> Result<Arc<dyn HttpTransport>, HttpError> {
                let transport = ReqwestTransport::with_timeout(timeout)?;
                Ok(Arc::new(transport) as Arc<dyn HttpTransport>)
            })
        }
    }

    /// Map a reqwest error onto the transport taxonomy.
    pub fn classify(e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            return HttpError::Timeout(e.to_string());
        }
        if e.is_connect() || has_connection_reset(&e) {
            return HttpError::ConnectionReset(e.to_string());
        }
        HttpError::Transport(e.to_string())
    }

    fn has_connection_reset(e: &reqwest::Error) -> bool {
        let mut source = e.source();
        while let Some(err) = source {
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                return matches!(
                    io.kind(),
                    std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::BrokenPipe
                );
            }
            source = err.source();
        }
        false
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Patch => reqwest::Method::PATCH,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self.client.request(method, &request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }

            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder.send().await.map_err(classify)?;

            let status = resp.status().as_u16();
            let mut headers: HttpHeaders = Vec::new();
            for (name, value) in resp.headers().iter() {
                headers.push((
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                ));
            }

            let body = resp.bytes().await.map_err(classify)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::Mutex;

/// In-memory mock transport.
///
/// This is designed for unit tests: no sockets, no loopback HTTP servers.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for a method + URL.
    ///
    /// If multiple responses are registered for the same key, they are returned
    /// in FIFO order.
    pub fn push_response(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        response: HttpResponse,
    ) {
        self.push(method, url, Ok(response));
    }

    /// Register a JSON response with the given status.
    pub fn push_json(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        status: u16,
        body: serde_json::Value,
    ) {
        self.push_response(
            method,
            url,
            HttpResponse {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: body.to_string().into_bytes(),
            },
        );
    }

    /// Register a transport failure for a method + URL.
    pub fn push_error(&self, method: HttpMethod, url: impl Into<String>, error: HttpError) {
        self.push(method, url, Err(error));
    }

    fn push(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        outcome: Result<HttpResponse, HttpError>,
    ) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner
            .routes
            .entry((method, url.into()))
            .or_default()
            .push_back(outcome);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner.requests.clone()
    }

    /// Factory that hands out this same mock, counting how often it was asked.
    pub fn factory(&self, builds: Arc<std::sync::atomic::AtomicUsize>) -> TransportFactory {
        let mock = self.clone();
        Arc::new(move || -> Result<Arc<dyn HttpTransport>, HttpError> {
            builds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Arc::new(mock.clone()) as Arc<dyn HttpTransport>)
        })
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");

        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(outcome) => outcome,
            None => Err(HttpError::NoMockResponse {
                method: key.0.as_str().to_string(),
                url: key.1,
            }),
        }
    }
}
