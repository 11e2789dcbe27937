//! Blocking HTTP execution

use std::io::Read;
use std::time::Duration;

use ureq::ErrorKind;

use super::Request;
use crate::error::{RequestError, TransportFailure};

/// Executes one request and returns the response body.
///
/// Implementations block for the whole request/response cycle and fold every
/// failure into a [`RequestError`].
pub trait Transport: Send + Sync {
    /// Perform the HTTP call described by `request`
    fn execute(&self, request: &Request) -> Result<Vec<u8>, RequestError>;
}

/// Transport backed by a `ureq` agent
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl UreqTransport {
    /// Create a transport with no request timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that gives up on requests after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &Request) -> Result<Vec<u8>, RequestError> {
        let mut call = self.agent.request(request.method(), &request.url);
        for (name, value) in &request.headers {
            tracing::trace!("Header: {name}={value}");
            call = call.set(name, value);
        }

        tracing::debug!("Starting request of {}", request.url);
        let result = match &request.body {
            Some(body) => call.send_bytes(body),
            None => call.call(),
        };

        let response = result.map_err(classify)?;
        let code = response.status();
        if !(200..300).contains(&code) {
            tracing::debug!("HTTP status {code} treated as an error");
            return Err(RequestError::Status(code));
        }

        let mut data = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut data)
            .map_err(|e| {
                tracing::error!("Socket error while reading {}: {e}", request.url);
                RequestError::Transport(TransportFailure::LowLevel)
            })?;

        tracing::debug!("Request completed ({} bytes)", data.len());
        Ok(data)
    }
}

/// Map a ureq error onto the request error taxonomy
fn classify(error: ureq::Error) -> RequestError {
    match error {
        ureq::Error::Status(code, response) => {
            tracing::debug!("HTTP error {code}");
            if let Ok(body) = response.into_string() {
                tracing::debug!("HTTP error response body:\n{body}");
            }
            RequestError::Status(code)
        }
        ureq::Error::Transport(transport) => {
            let failure = transport_failure(transport.kind());
            match failure {
                TransportFailure::InvalidResponse => {
                    tracing::error!("Bad status line from server: {transport}");
                }
                TransportFailure::LowLevel => {
                    tracing::error!("Socket connection error: {transport}");
                }
                TransportFailure::Dns | TransportFailure::Network => {
                    tracing::error!("URL error: {transport}");
                }
            }
            RequestError::Transport(failure)
        }
    }
}

const fn transport_failure(kind: ErrorKind) -> TransportFailure {
    match kind {
        ErrorKind::Dns
        | ErrorKind::ConnectionFailed
        | ErrorKind::InvalidUrl
        | ErrorKind::UnknownScheme
        | ErrorKind::InsecureRequestHttpsOnly
        | ErrorKind::InvalidProxyUrl
        | ErrorKind::ProxyConnect
        | ErrorKind::ProxyUnauthorized => TransportFailure::Dns,
        ErrorKind::BadStatus | ErrorKind::BadHeader => TransportFailure::InvalidResponse,
        ErrorKind::Io => TransportFailure::LowLevel,
        _ => TransportFailure::Network,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_mapping() {
        assert_eq!(transport_failure(ErrorKind::Dns), TransportFailure::Dns);
        assert_eq!(
            transport_failure(ErrorKind::ConnectionFailed),
            TransportFailure::Dns
        );
        assert_eq!(
            transport_failure(ErrorKind::BadStatus),
            TransportFailure::InvalidResponse
        );
        assert_eq!(transport_failure(ErrorKind::Io), TransportFailure::LowLevel);
        assert_eq!(
            transport_failure(ErrorKind::TooManyRedirects),
            TransportFailure::Network
        );
    }
}
