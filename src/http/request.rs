use std::collections::HashMap;

use tokio::sync::watch;

/// HTTP request methods understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
}

impl Method {
    /// Parses a method token. Matching is case-sensitive, as on the wire.
    ///
    /// ```
    /// # use holdfast::http::request::Method;
    /// assert_eq!(Method::from_str("POST"), Some(Method::POST));
    /// assert_eq!(Method::from_str("post"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
        }
    }
}

/// A parsed HTTP request head plus its body.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target as sent by the client, query string included.
    pub path: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Path component without the query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or("/")
    }

    /// Decoded query parameter, first occurrence wins.
    pub fn query(&self, name: &str) -> Option<String> {
        let url = url::Url::parse("http://localhost")
            .ok()?
            .join(&self.path)
            .ok()?;
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Query parameter parsed as milliseconds.
    pub fn query_millis(&self, name: &str) -> Option<u64> {
        self.query(name).and_then(|v| v.parse().ok())
    }
}

/// Builder for [`Request`], mostly used by tests and the demo routes.
#[derive(Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
        })
    }
}

/// Transport side of the client-disconnect notification.
///
/// The connection fires it when the peer goes away while the response is
/// still pending. Dropping it without firing means "never aborted".
#[derive(Debug)]
pub struct Aborter {
    tx: watch::Sender<bool>,
}

impl Aborter {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

/// Handler side of the client-disconnect notification.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn pair() -> (Aborter, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        (Aborter { tx }, AbortSignal { rx })
    }

    /// A signal that never fires.
    pub fn never() -> AbortSignal {
        let (_, signal) = Self::pair();
        signal
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the client disconnected. Pends forever if the
    /// transport dropped its [`Aborter`] without firing.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// An incoming request together with its abort notification.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub request: Request,
    pub abort: AbortSignal,
}

impl Incoming {
    pub fn new(request: Request, abort: AbortSignal) -> Self {
        Self { request, abort }
    }
}
