//! Errors delivered to request callbacks
//!
//! Every submitted request ends with exactly one callback invocation. When the
//! request did not succeed, the callback receives a [`RequestError`] that tells
//! the caller which layer failed: the server (HTTP status), the connection
//! (transport sentinel), the body (JSON decode) or the API itself (domain
//! error payload).

use thiserror::Error;

/// Failure of a request, as seen by its callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The server answered with a non-success HTTP status
    #[error("server returned HTTP {0}")]
    Status(u16),

    /// The request never produced a usable HTTP response
    #[error(transparent)]
    Transport(#[from] TransportFailure),

    /// The response body was not valid JSON
    #[error("invalid JSON response: {0}")]
    Decode(String),

    /// The server sent a well-formed error payload
    #[error(transparent)]
    Api(#[from] ApiFailure),

    /// The request was submitted to a pool that was already shut down
    #[error("worker pool is closed")]
    Closed,
}

impl RequestError {
    /// Numeric code for this error.
    ///
    /// HTTP statuses are always >= 100, transport failures use the reserved
    /// negative sentinels. Decode failures and closed pools have no code.
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Status(status) => Some(*status as i32),
            Self::Transport(failure) => Some(failure.code()),
            Self::Api(failure) => Some(failure.code()),
            Self::Decode(_) | Self::Closed => None,
        }
    }

    /// The server rejected the credentials
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Status(401))
    }

    /// The server refused the action (e.g. deleting someone else's post)
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::Status(403))
    }

    /// Worth trying again later
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Status(404 | 502 | 503) | Self::Api(ApiFailure::RateLimitExceeded)
        )
    }
}

/// Connection-level failures, reported with negative sentinel codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TransportFailure {
    /// Generic network failure that fits no other bucket
    #[error("network error")]
    Network,
    /// Name resolution, connection or URL failure
    #[error("could not reach the server")]
    Dns,
    /// The server sent a malformed status line or header
    #[error("invalid response from the server")]
    InvalidResponse,
    /// Socket failure while talking to the server
    #[error("low level socket error")]
    LowLevel,
}

impl TransportFailure {
    /// Code for a generic network failure
    pub const NETWORK_ERROR: i32 = -1;
    /// Code for a DNS or connection failure
    pub const DNS_ERROR: i32 = -2;
    /// Code for a malformed response
    pub const INVALID_RESPONSE: i32 = -3;
    /// Code for a socket failure
    pub const LOW_LEVEL_ERROR: i32 = -4;

    /// The reserved sentinel code of this failure
    pub const fn code(self) -> i32 {
        match self {
            Self::Network => Self::NETWORK_ERROR,
            Self::Dns => Self::DNS_ERROR,
            Self::InvalidResponse => Self::INVALID_RESPONSE,
            Self::LowLevel => Self::LOW_LEVEL_ERROR,
        }
    }
}

/// Application errors carried inside a well-formed response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiFailure {
    /// The account ran out of API calls for this hour
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    /// Any other error message sent by the server
    #[error("server error: {0}")]
    Unknown(String),
}

impl ApiFailure {
    /// Code for [`ApiFailure::RateLimitExceeded`]
    pub const RATE_LIMIT_EXCEEDED: i32 = 1;
    /// Code for [`ApiFailure::Unknown`]
    pub const UNKNOWN_ERROR: i32 = -1;

    /// Classify the `error` message of a response payload
    pub fn classify(message: &str) -> Self {
        if message.contains("Rate limit exceeded") {
            Self::RateLimitExceeded
        } else {
            Self::Unknown(message.to_string())
        }
    }

    /// Numeric code of this failure
    pub const fn code(&self) -> i32 {
        match self {
            Self::RateLimitExceeded => Self::RATE_LIMIT_EXCEEDED,
            Self::Unknown(_) => Self::UNKNOWN_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_codes_are_negative_and_distinct() {
        let codes = [
            TransportFailure::Network.code(),
            TransportFailure::Dns.code(),
            TransportFailure::InvalidResponse.code(),
            TransportFailure::LowLevel.code(),
        ];
        for (i, code) in codes.iter().enumerate() {
            assert!(*code < 0);
            assert!(!codes[i + 1..].contains(code));
        }
    }

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(
            ApiFailure::classify("Rate limit exceeded. Try again later."),
            ApiFailure::RateLimitExceeded
        );
        assert_eq!(
            ApiFailure::classify("Not found"),
            ApiFailure::Unknown("Not found".to_string())
        );
    }

    #[test]
    fn test_request_error_codes() {
        assert_eq!(RequestError::Status(503).code(), Some(503));
        assert_eq!(
            RequestError::from(TransportFailure::InvalidResponse).code(),
            Some(-3)
        );
        assert_eq!(RequestError::Decode("eof".into()).code(), None);
        assert!(RequestError::Status(401).is_auth_failure());
        assert!(RequestError::Status(502).is_transient());
        assert!(!RequestError::Status(500).is_transient());
    }
}
