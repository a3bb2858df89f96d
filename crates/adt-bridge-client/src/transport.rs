// crates/adt-bridge-client/src/transport.rs
// ============================================================================
// Module: ADT Transport
// Description: Session-bearing HTTP conduit with CSRF and cookie handling.
// Purpose: Turn stateless HTTP into the session contract ADT expects.
// Dependencies: adt-bridge-core, reqwest, tokio, url
// ============================================================================

//! ## Overview
//! The transport owns everything the ADT wire contract needs beyond plain
//! HTTP: query composition (`sap-client`, `sap-language`), basic or
//! session-cookie authentication, a per-instance cookie jar, the CSRF token
//! lifecycle with a single retry on expiry, and the memoized discovery
//! probe that warms both before the first non-safe request.
//! Invariants:
//! - The cookie jar and token live behind one lock; readers never block on
//!   a refetch in flight for a different request.
//! - A `403` with `X-CSRF-Token: Required` triggers exactly one refetch and
//!   one retry; further rejections surface to the caller.
//! - Discovery runs at most once per transport instance.
//!
//! Security posture: response bodies are untrusted and error captures are
//! trimmed to a bounded prefix before they reach logs or envelopes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use adt_bridge_core::Config;
use adt_bridge_core::ErrorKind;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Discovery endpoint probed to warm the cookie jar and CSRF token.
pub const DISCOVERY_PATH: &str = "/sap/bc/adt/discovery";

/// CSRF token header name.
const CSRF_HEADER: &str = "x-csrf-token";

/// Session type header marking stateful (lock-bearing) requests.
const SESSION_TYPE_HEADER: &str = "X-sap-adt-sessiontype";

/// Maximum error body prefix captured into transport errors.
const MAX_ERROR_BODY_BYTES: usize = 2048;

/// Cookie name prefix that marks an authenticated SAP session.
const SESSION_COOKIE_PREFIX: &str = "SAP_SESSIONID";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the transport layer.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `body_prefix` payloads are bounded and lossily decoded.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request URL could not be composed.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    /// The HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    ClientBuild(String),
    /// The HTTP call failed before a response arrived.
    #[error("http request failed: {0}")]
    Http(String),
    /// The request deadline elapsed or the caller cancelled.
    #[error("request cancelled: {0}")]
    Cancelled(String),
    /// The discovery endpoint did not grant a CSRF token.
    #[error("csrf token was not granted by the discovery endpoint")]
    CsrfNotGranted,
    /// The target does not exist.
    #[error("{method} {path} returned 404: {body_prefix}")]
    NotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
        /// Bounded response body prefix.
        body_prefix: String,
    },
    /// The request conflicted with repository state (lock, CSRF, session).
    #[error("{method} {path} returned {status}: {body_prefix}")]
    Conflict {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Bounded response body prefix.
        body_prefix: String,
    },
    /// The upstream system reported an unexpected status.
    #[error("{method} {path} returned {status}: {body_prefix}")]
    Upstream {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Bounded response body prefix.
        body_prefix: String,
    },
}

impl TransportError {
    /// Maps the error onto the stable envelope taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidArgument,
            Self::ClientBuild(_) | Self::Http(_) => ErrorKind::Upstream,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::CsrfNotGranted | Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Upstream { .. } => ErrorKind::Upstream,
        }
    }
}

// ============================================================================
// SECTION: Request Options
// ============================================================================

/// Options for a single transport request.
///
/// # Invariants
/// - `accept` defaults to `application/xml` when unset.
/// - `content_type` defaults to `application/xml` when a body is present.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Query parameters appended to the composed URL (caller wins on
    /// conflicts with the standard `sap-client`/`sap-language` pair).
    pub query: Vec<(String, String)>,
    /// Additional request headers.
    pub headers: Vec<(String, String)>,
    /// Accept header override.
    pub accept: Option<String>,
    /// Content type override for the body.
    pub content_type: Option<String>,
    /// Request body bytes.
    pub body: Option<Vec<u8>>,
    /// Marks the request as stateful (required for lock handling).
    pub stateful: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            query: Vec::new(),
            headers: Vec::new(),
            accept: None,
            content_type: None,
            body: None,
            stateful: false,
        }
    }
}

impl RequestOptions {
    /// Creates GET options.
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    /// Creates POST options.
    #[must_use]
    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    /// Creates PUT options.
    #[must_use]
    pub fn put() -> Self {
        Self {
            method: Method::PUT,
            ..Self::default()
        }
    }

    /// Creates DELETE options.
    #[must_use]
    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Appends a request header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the Accept header.
    #[must_use]
    pub fn with_accept(mut self, accept: &str) -> Self {
        self.accept = Some(accept.to_string());
        self
    }

    /// Sets the request body and its content type.
    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.to_string());
        self.body = Some(body.into());
        self
    }

    /// Marks the request as stateful.
    #[must_use]
    pub const fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Successful transport response.
#[derive(Debug, Clone)]
pub struct AdtResponse {
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Content type reported by the server.
    pub content_type: Option<String>,
    /// Response body bytes (may be empty; an empty 200 is valid).
    pub body: Vec<u8>,
}

impl AdtResponse {
    /// Returns the body as lossily decoded text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Raw response capture used internally before status classification.
struct RawResponse {
    /// HTTP status.
    status: StatusCode,
    /// Response headers.
    headers: HeaderMap,
    /// Response body bytes.
    body: Vec<u8>,
}

// ============================================================================
// SECTION: Session State
// ============================================================================

/// Mutable session state shared by all requests of one transport.
///
/// # Invariants
/// - Guarded by the transport's `RwLock`; never held across an await point.
#[derive(Default)]
struct SessionState {
    /// Cookie jar (name to value).
    cookies: BTreeMap<String, String>,
    /// Cached CSRF token, when granted.
    csrf_token: Option<String>,
    /// Memoized discovery payload.
    discovery: Option<Vec<u8>>,
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Session-bearing HTTP conduit for one SAP system.
pub struct Transport {
    /// Connection configuration.
    config: Config,
    /// Underlying HTTP client (redirects disabled).
    client: reqwest::Client,
    /// Session state guarded for concurrent requests.
    state: std::sync::RwLock<SessionState>,
    /// Serializes CSRF refetches so concurrent misses coalesce.
    refresh: tokio::sync::Mutex<()>,
}

impl Transport {
    /// Builds a transport for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] when the HTTP client cannot
    /// be constructed.
    pub fn new(config: Config) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(config.timeout);
        if config.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(|err| TransportError::ClientBuild(err.to_string()))?;
        let mut state = SessionState::default();
        state.cookies.extend(config.cookies.clone());
        Ok(Self {
            config,
            client,
            state: std::sync::RwLock::new(state),
            refresh: tokio::sync::Mutex::new(()),
        })
    }

    /// Returns the connection configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true when the jar holds an authenticated SAP session cookie.
    #[must_use]
    pub fn has_session_cookie(&self) -> bool {
        self.state
            .read()
            .map(|state| {
                state.cookies.keys().any(|name| name.starts_with(SESSION_COOKIE_PREFIX))
            })
            .unwrap_or(false)
    }

    /// Issues a request against the composed ADT URL.
    ///
    /// Non-safe methods acquire a CSRF token first (probing discovery when
    /// necessary) and retry exactly once when the server reports an expired
    /// token.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] for composition failures, HTTP failures,
    /// and non-2xx statuses.
    pub async fn request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<AdtResponse, TransportError> {
        let needs_csrf = !is_safe_method(&options.method);
        if needs_csrf {
            self.ensure_csrf_token().await?;
        }
        let mut raw = self.send_raw(path, &options).await?;
        if needs_csrf && csrf_rejected(&raw) {
            self.invalidate_csrf_token();
            self.ensure_csrf_token().await?;
            raw = self.send_raw(path, &options).await?;
        }
        classify(path, &options.method, raw)
    }

    /// Returns the memoized discovery payload, probing it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the probe fails.
    pub async fn discovery_document(&self) -> Result<Vec<u8>, TransportError> {
        self.ensure_csrf_token().await?;
        let cached = self
            .state
            .read()
            .ok()
            .and_then(|state| state.discovery.clone());
        cached.ok_or(TransportError::CsrfNotGranted)
    }

    /// Ensures a CSRF token is cached, probing discovery when absent.
    ///
    /// Concurrent callers coalesce on one refetch; the double-check after
    /// acquiring the refresh lock keeps the probe single-flight.
    async fn ensure_csrf_token(&self) -> Result<(), TransportError> {
        if self.cached_csrf_token().is_some() {
            return Ok(());
        }
        let _guard = self.refresh.lock().await;
        if self.cached_csrf_token().is_some() {
            return Ok(());
        }
        let options = RequestOptions::get().with_header(CSRF_HEADER, "Fetch");
        let raw = self.send_raw(DISCOVERY_PATH, &options).await?;
        let token = raw
            .headers
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let Some(token) = token else {
            return Err(TransportError::CsrfNotGranted);
        };
        if let Ok(mut state) = self.state.write() {
            state.csrf_token = Some(token);
            if raw.status.is_success() && state.discovery.is_none() {
                state.discovery = Some(raw.body);
            }
        }
        Ok(())
    }

    /// Returns the cached CSRF token, if any.
    fn cached_csrf_token(&self) -> Option<String> {
        self.state.read().ok().and_then(|state| state.csrf_token.clone())
    }

    /// Purges the cached CSRF token after a rejection.
    fn invalidate_csrf_token(&self) {
        if let Ok(mut state) = self.state.write() {
            state.csrf_token = None;
        }
    }

    /// Sends a single HTTP request and captures cookies from the response.
    async fn send_raw(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<RawResponse, TransportError> {
        let url = self.build_url(path, &options.query)?;
        let mut request = self.client.request(options.method.clone(), url);

        let accept = options.accept.as_deref().unwrap_or("application/xml");
        request = request.header(reqwest::header::ACCEPT, accept);
        if let Some(body) = &options.body {
            let content_type = options.content_type.as_deref().unwrap_or("application/xml");
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
            request = request.body(body.clone());
        }
        if options.stateful {
            request = request.header(SESSION_TYPE_HEADER, "stateful");
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let (cookie_header, token, has_session) = self.session_headers();
        if let Some(cookie_header) = cookie_header {
            request = request.header(reqwest::header::COOKIE, cookie_header);
        }
        let sends_fetch = options
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CSRF_HEADER));
        if !sends_fetch
            && let Some(token) = token
            && !is_safe_method(&options.method)
        {
            request = request.header(CSRF_HEADER, token);
        }
        if !has_session {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        self.capture_cookies(&headers);
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    /// Snapshots cookie header, CSRF token, and session-cookie presence.
    fn session_headers(&self) -> (Option<String>, Option<String>, bool) {
        let Ok(state) = self.state.read() else {
            return (None, None, false);
        };
        let cookie_header = if state.cookies.is_empty() {
            None
        } else {
            Some(
                state
                    .cookies
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
        let has_session =
            state.cookies.keys().any(|name| name.starts_with(SESSION_COOKIE_PREFIX));
        (cookie_header, state.csrf_token.clone(), has_session)
    }

    /// Stores cookies from a response into the jar.
    fn capture_cookies(&self, headers: &HeaderMap) {
        let mut parsed = Vec::new();
        for value in headers.get_all(reqwest::header::SET_COOKIE) {
            if let Ok(raw) = value.to_str()
                && let Some(pair) = raw.split(';').next()
                && let Some((name, value)) = pair.split_once('=')
            {
                parsed.push((name.trim().to_string(), value.trim().to_string()));
            }
        }
        if parsed.is_empty() {
            return;
        }
        if let Ok(mut state) = self.state.write() {
            for (name, value) in parsed {
                state.cookies.insert(name, value);
            }
        }
    }

    /// Composes the request URL from base, path, and query parameters.
    fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<Url, TransportError> {
        let mut url = Url::parse(&format!("{}{path}", self.config.base_url))
            .map_err(|err| TransportError::InvalidUrl(err.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if !self.config.sap_client.is_empty()
                && !query.iter().any(|(key, _)| key == "sap-client")
            {
                pairs.append_pair("sap-client", &self.config.sap_client);
            }
            if !self.config.language.is_empty()
                && !query.iter().any(|(key, _)| key == "sap-language")
            {
                pairs.append_pair("sap-language", &self.config.language);
            }
        }
        Ok(url)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true for methods that never require a CSRF token.
fn is_safe_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

/// Returns true when a response signals an expired CSRF token.
fn csrf_rejected(raw: &RawResponse) -> bool {
    raw.status == StatusCode::FORBIDDEN
        && raw
            .headers
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("required"))
}

/// Maps reqwest failures onto transport errors.
fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Cancelled(err.to_string())
    } else {
        TransportError::Http(err.to_string())
    }
}

/// Classifies a raw response into a success or a typed failure.
fn classify(
    path: &str,
    method: &Method,
    raw: RawResponse,
) -> Result<AdtResponse, TransportError> {
    if raw.status.is_success() {
        let content_type = raw
            .headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        return Ok(AdtResponse {
            status: raw.status.as_u16(),
            content_type,
            body: raw.body,
        });
    }
    let body_prefix = bounded_body_prefix(&raw.body);
    let method = method.to_string();
    let path = path.to_string();
    match raw.status {
        StatusCode::NOT_FOUND => Err(TransportError::NotFound {
            method,
            path,
            body_prefix,
        }),
        StatusCode::FORBIDDEN | StatusCode::CONFLICT => Err(TransportError::Conflict {
            method,
            path,
            status: raw.status.as_u16(),
            body_prefix,
        }),
        other => Err(TransportError::Upstream {
            method,
            path,
            status: other.as_u16(),
            body_prefix,
        }),
    }
}

/// Trims a response body to the bounded error prefix.
fn bounded_body_prefix(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.len() <= MAX_ERROR_BODY_BYTES {
        return trimmed.to_string();
    }
    let mut cut = MAX_ERROR_BODY_BYTES;
    while cut > 0 && !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    trimmed[..cut].to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::*;

    /// Tests that error body prefixes stay bounded.
    #[test]
    fn error_body_prefix_is_bounded() {
        let body = vec![b'x'; MAX_ERROR_BODY_BYTES * 2];
        let prefix = bounded_body_prefix(&body);
        assert_eq!(prefix.len(), MAX_ERROR_BODY_BYTES);
    }

    /// Tests that multi-byte boundaries are respected when trimming.
    #[test]
    fn error_body_prefix_respects_char_boundaries() {
        let mut body = "ä".repeat(MAX_ERROR_BODY_BYTES);
        body.push('ä');
        let prefix = bounded_body_prefix(body.as_bytes());
        assert!(prefix.len() <= MAX_ERROR_BODY_BYTES);
        assert!(prefix.chars().all(|c| c == 'ä'));
    }

    /// Tests the CSRF rejection predicate.
    #[test]
    fn csrf_rejection_requires_header_marker() {
        let mut headers = HeaderMap::new();
        headers.insert(CSRF_HEADER, "Required".parse().unwrap());
        let rejected = RawResponse {
            status: StatusCode::FORBIDDEN,
            headers,
            body: Vec::new(),
        };
        assert!(csrf_rejected(&rejected));

        let plain_forbidden = RawResponse {
            status: StatusCode::FORBIDDEN,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        assert!(!csrf_rejected(&plain_forbidden));
    }

    /// Tests status classification for the error taxonomy.
    #[test]
    fn classify_maps_statuses_to_error_kinds() {
        let raw = |status: StatusCode| RawResponse {
            status,
            headers: HeaderMap::new(),
            body: b"detail".to_vec(),
        };
        let method = Method::GET;
        let not_found = classify("/x", &method, raw(StatusCode::NOT_FOUND)).unwrap_err();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        let conflict = classify("/x", &method, raw(StatusCode::CONFLICT)).unwrap_err();
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        let upstream = classify("/x", &method, raw(StatusCode::INTERNAL_SERVER_ERROR)).unwrap_err();
        assert_eq!(upstream.kind(), ErrorKind::Upstream);
        let ok = classify("/x", &method, raw(StatusCode::OK)).unwrap();
        assert_eq!(ok.status, 200);
    }

    /// Tests that an empty 200 body is a valid response.
    #[test]
    fn empty_success_body_is_valid() {
        let raw = RawResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        let response = classify("/nodestructure", &Method::POST, raw).unwrap();
        assert!(response.body.is_empty());
    }
}
