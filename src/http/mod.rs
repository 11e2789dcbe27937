//! Threaded HTTP dispatcher
//!
//! Requests are plain descriptors carrying their own completion callback.
//! They are queued on a [`WorkerPool`], executed by a [`Transport`] on one of
//! the worker threads, and the callback receives the normalized result.

mod pool;
mod transport;

pub use pool::WorkerPool;
pub use transport::{Transport, UreqTransport};

use std::collections::BTreeMap;
use std::fmt;

use crate::error::RequestError;

/// Data delivered to a successful request callback
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Decoded JSON body
    Json(serde_json::Value),
    /// Raw response body
    Raw(Vec<u8>),
}

impl Payload {
    /// Take the JSON value, failing if the request was not decoded
    pub fn into_json(self) -> Result<serde_json::Value, RequestError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Raw(_) => Err(RequestError::Decode("expected a JSON body".to_string())),
        }
    }

    /// Take the body bytes, re-serializing decoded JSON if needed
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Raw(bytes) => bytes,
            Self::Json(value) => value.to_string().into_bytes(),
        }
    }
}

/// Result handed to a request callback
pub type Completion = Result<Payload, RequestError>;

type Callback = Box<dyn FnOnce(Completion) + Send + 'static>;

/// A unit of HTTP work plus its completion callback.
///
/// A request is consumed exactly once: by the worker that executes it, or by
/// the pool when it refuses it after shutdown.
pub struct Request {
    /// Fully qualified, percent-escaped URL
    pub url: String,
    /// Request headers, one value per name
    pub headers: BTreeMap<String, String>,
    /// Body bytes; a request with a body is sent as POST
    pub body: Option<Vec<u8>>,
    /// Decode the response body as JSON before delivery
    pub decode_json: bool,
    callback: Callback,
}

impl Request {
    /// Create a GET request for `url` that decodes JSON.
    ///
    /// The URL is percent-escaped, leaving its structural characters alone.
    pub fn new<F>(url: &str, callback: F) -> Self
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        Self {
            url: escape_url(url),
            headers: BTreeMap::new(),
            body: None,
            decode_json: true,
            callback: Box::new(callback),
        }
    }

    /// Set a header, replacing any previous value
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Merge a set of headers into the request
    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Attach a body, turning this into a POST
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Deliver the body as raw bytes instead of decoded JSON
    pub fn raw(mut self) -> Self {
        self.decode_json = false;
        self
    }

    /// HTTP method implied by the body
    pub const fn method(&self) -> &'static str {
        if self.body.is_some() { "POST" } else { "GET" }
    }

    /// Consume the request, handing `result` to its callback
    pub(crate) fn complete(self, result: Completion) {
        (self.callback)(result);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .field("decode_json", &self.decode_json)
            .finish_non_exhaustive()
    }
}

/// Percent-escape a URL, keeping the characters that give it structure
pub fn escape_url(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    let mut buf = [0u8; 4];
    for c in url.chars() {
        if c.is_ascii_alphanumeric() || "-_.~/:?=&%+".contains(c) {
            escaped.push(c);
        } else {
            escaped.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    escaped
}
