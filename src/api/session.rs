//! Authenticated session against the microblogging API

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiFailure, RequestError};
use crate::http::{Completion, Request, WorkerPool};
use crate::models::{RateLimit, Status, User, WireStatus};

/// Server used when none is given
pub const DEFAULT_SERVER: &str = "twitter.com";

/// Value of the `source` field sent with every update
pub const SOURCE: &str = "mitter";

/// Client identifier sent with every request
pub const USER_AGENT: &str = concat!("Mitter ", env!("CARGO_PKG_VERSION"));

/// Username, password and transport scheme of a session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
    /// Talk to the server over HTTPS
    pub https: bool,
}

impl Credentials {
    /// Bundle credentials
    pub fn new(username: &str, password: &str, https: bool) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            https,
        }
    }

    /// Value of the `Authorization` header
    pub fn basic_auth(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }

    const fn scheme(&self) -> &'static str {
        if self.https { "https" } else { "http" }
    }
}

/// Session with the microblogging server.
///
/// Every operation builds a request, queues it on the session's worker pool
/// and returns. The callback runs on a worker thread once the response has
/// been post-processed. A session created with a single worker runs each
/// request on the calling thread before returning instead; an operation
/// started from inside one of its callbacks completes once that callback
/// returns.
///
/// Credentials may change at any time; requests built afterwards use the new
/// values, requests already queued keep the old ones.
pub struct Session {
    credentials: RwLock<Credentials>,
    server: String,
    pool: WorkerPool,
}

impl Session {
    /// Open a session with the default server using `workers` workers
    pub fn new(username: &str, password: &str, https: bool, workers: usize) -> Self {
        Self::with_pool(
            Credentials::new(username, password, https),
            DEFAULT_SERVER,
            WorkerPool::new(workers),
        )
    }

    /// Open a session with `server` (host and optional port) on an existing
    /// pool
    pub fn with_pool(credentials: Credentials, server: &str, pool: WorkerPool) -> Self {
        tracing::debug!(
            "Session for {} on {server} with {} worker(s)",
            credentials.username,
            pool.workers()
        );
        Self {
            credentials: RwLock::new(credentials),
            server: server.trim_end_matches('/').to_string(),
            pool,
        }
    }

    /// Snapshot of the current credentials
    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace username and password, e.g. after the user re-authenticated
    pub fn set_credentials(&self, username: &str, password: &str) {
        let mut credentials = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        credentials.username = username.to_string();
        credentials.password = password.to_string();
    }

    /// Switch between HTTP and HTTPS
    pub fn set_https(&self, https: bool) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .https = https;
    }

    /// Whether requests run on background threads
    pub const fn is_threaded(&self) -> bool {
        self.pool.is_threaded()
    }

    /// Base URL derived from the current scheme
    pub fn server_url(&self) -> String {
        format!("{}://{}", self.credentials().scheme(), self.server)
    }

    /// Fetch the friends timeline
    pub fn friends_timeline<F>(&self, callback: F)
    where
        F: FnOnce(Result<Vec<Status>, RequestError>) + Send + 'static,
    {
        self.request("/statuses/friends_timeline", None, move |result| {
            callback(timeline(result));
        });
    }

    /// Fetch replies to the authenticated user
    pub fn replies<F>(&self, callback: F)
    where
        F: FnOnce(Result<Vec<Status>, RequestError>) + Send + 'static,
    {
        self.request("/statuses/replies", None, move |result| {
            callback(timeline(result));
        });
    }

    /// Post a status update
    pub fn update<F>(&self, status: &str, callback: F)
    where
        F: FnOnce(Result<Status, RequestError>) + Send + 'static,
    {
        let body = form(&[("status", status), ("source", SOURCE)]);
        tracing::debug!("Message to server: {body}");

        self.request("/statuses/update", Some(body), move |result| {
            callback(result.and_then(|payload| {
                let value = payload.into_json()?;
                if let Some(error) = server_error(&value) {
                    return Err(error);
                }
                let wire: WireStatus = decode(value)?;
                wire.into_status(false)
                    .map_err(|e| RequestError::Decode(e.to_string()))
            }));
        });
    }

    /// Delete one of the user's statuses.
    ///
    /// The callback gets the server's answer as is.
    pub fn destroy<F>(&self, status_id: u64, callback: F)
    where
        F: FnOnce(Result<Value, RequestError>) + Send + 'static,
    {
        let id = status_id.to_string();
        let body = form(&[("id", &id)]);
        self.request(&format!("/statuses/destroy/{id}"), Some(body), move |result| {
            callback(result.and_then(|payload| payload.into_json()));
        });
    }

    /// Fetch the users the authenticated user follows
    pub fn friends<F>(&self, callback: F)
    where
        F: FnOnce(Result<Vec<User>, RequestError>) + Send + 'static,
    {
        self.request("/statuses/friends", None, move |result| {
            callback(result.and_then(|payload| decode(payload.into_json()?)));
        });
    }

    /// Fetch the API usage left for this hour
    pub fn rate_limit_status<F>(&self, callback: F)
    where
        F: FnOnce(Result<RateLimit, RequestError>) + Send + 'static,
    {
        self.request("/account/rate_limit_status", None, move |result| {
            callback(result.and_then(|payload| decode(payload.into_json()?)));
        });
    }

    /// Download an arbitrary public resource, such as an avatar.
    ///
    /// No credentials are sent and the body is delivered as raw bytes.
    pub fn download<F>(&self, url: &str, callback: F)
    where
        F: FnOnce(Result<Vec<u8>, RequestError>) + Send + 'static,
    {
        let request = Request::new(url, move |result: Completion| {
            callback(result.map(crate::http::Payload::into_bytes));
        })
        .header("User-Agent", USER_AGENT)
        .raw();
        self.dispatch(request);
    }

    /// Stop the workers, waiting for every queued request to complete.
    ///
    /// Nothing to wait for with a single worker: its requests already ran.
    pub fn close(&mut self) {
        tracing::debug!("Closing session");
        self.pool.shutdown();
    }

    fn common_headers(credentials: &Credentials) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Authorization".to_string(), credentials.basic_auth()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ])
    }

    fn request<F>(&self, resource: &str, body: Option<String>, callback: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let credentials = self.credentials();
        let url = format!("{}://{}{resource}.json", credentials.scheme(), self.server);
        tracing::debug!("Request to {url}");

        let mut request = Request::new(&url, callback).headers(Self::common_headers(&credentials));
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body);
        }
        self.dispatch(request);
    }

    fn dispatch(&self, request: Request) {
        self.pool.submit(request);
        if !self.pool.is_threaded() {
            self.pool.drain();
        }
    }
}

/// Post-process a timeline-shaped response
fn timeline(result: Completion) -> Result<Vec<Status>, RequestError> {
    let value = result?.into_json()?;
    if let Some(error) = server_error(&value) {
        return Err(error);
    }

    let statuses: Vec<WireStatus> = decode(value)?;
    statuses
        .into_iter()
        .map(|s| s.into_status(true))
        .collect::<Result<_, _>>()
        .map_err(|e| RequestError::Decode(e.to_string()))
}

/// Error reported in the body of a successful response
fn server_error(value: &Value) -> Option<RequestError> {
    let message = value.get("error")?.as_str().unwrap_or_default();
    tracing::debug!("Server sent an error: {message}");
    Some(ApiFailure::classify(message).into())
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RequestError> {
    serde_json::from_value(value).map_err(|e| RequestError::Decode(e.to_string()))
}

fn form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
