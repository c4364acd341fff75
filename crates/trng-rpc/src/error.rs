//! Error types for request dispatch.
//!
//! This module defines the central [`Error`] enum. Remote error envelopes are
//! classified into an [`ErrorKind`] (see [`classify`]) so callers can branch
//! on them, while failures of the underlying exchange are carried through
//! untouched in [`Error::Transport`].
//!
//! ## Error Cases
//! - `Transport`: the exchange itself failed (connection, timeout, body).
//! - `MalformedResponse`: the body was JSON but not a response envelope.
//! - `Remote`: the service answered with an error envelope.
//! - `SendTimeout`: the request could not be sent within the blocking budget.
//! - `CacheEmpty`: a cache had no ready result.
//! - `InvalidRequest`: a request or cache description was rejected locally.
//! - `Shutdown`: the dispatcher no longer accepts work.
//!
//! [`classify`]: crate::classify()

use crate::TransportError;
use core::fmt;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Classification of a remote error code.
///
/// Every code the service can return maps onto exactly one kind. Codes the
/// service does not document fall back to [`ErrorKind::Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// JSON-RPC level failure (parse error, invalid request, server error).
    Protocol,
    /// The identity does not exist.
    KeyNonExistent,
    /// The identity exists but is not running.
    KeyNotRunning,
    /// The daily request allowance is exhausted. Triggers a backoff until the
    /// next UTC midnight.
    InsufficientRequests,
    /// The request needs more bits than the identity has left.
    InsufficientBits,
    /// The identity may not call the requested method.
    KeyInvalidAccess,
    /// The identity may not use this protocol version.
    KeyInvalidVersion,
    /// The ticket does not exist.
    TicketNonExistent,
    /// The ticket exists but belongs to another identity.
    TicketKeyMismatch,
    /// The ticket has already been used.
    TicketAlreadyUsed,
    /// The identity holds the maximum number of singleton tickets.
    TooManySingletonTickets,
    /// The identity requires license data on signed requests.
    LicenseDataRequired,
    /// The identity does not accept license data.
    LicenseDataNotAllowed,
    /// Any other service error, usually a parameter validation failure.
    Value,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            Self::Protocol => "protocol error",
            Self::KeyNonExistent => "identity does not exist",
            Self::KeyNotRunning => "identity not active",
            Self::InsufficientRequests => "requests allowance exceeded",
            Self::InsufficientBits => "bits allowance exceeded",
            Self::KeyInvalidAccess => "identity not valid for this method",
            Self::KeyInvalidVersion => "identity not valid for this protocol version",
            Self::TicketNonExistent => "ticket does not exist",
            Self::TicketKeyMismatch => "ticket does not belong to identity",
            Self::TicketAlreadyUsed => "ticket already used",
            Self::TooManySingletonTickets => "singleton ticket limit reached",
            Self::LicenseDataRequired => "license data required",
            Self::LicenseDataNotAllowed => "license data not allowed",
            Self::Value => "value error",
        };
        fmt.write_str(text)
    }
}

/// Unified error type for request dispatch.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The exchange with the service failed before a response envelope could
    /// be read.
    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    /// The response was not a valid JSON-RPC envelope.
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// The service returned an error envelope.
    #[error("Error {code}: {message}")]
    Remote {
        kind: ErrorKind,
        code: i64,
        message: String,
    },

    /// Waiting to send would exceed the caller's blocking budget.
    #[error("Send timeout: {reason}")]
    SendTimeout { reason: String },

    /// No cached result is ready yet.
    #[error("Cache is empty")]
    CacheEmpty,

    /// The request was rejected before reaching the service.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The dispatcher has been shut down.
    #[error("Dispatcher is shut down")]
    Shutdown,
}

impl Error {
    /// Returns the classification of a remote error, if this is one.
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the same call may reasonably succeed if retried later.
    ///
    /// Quota backoff is not retryable in this sense: it lasts until the next
    /// UTC midnight.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CacheEmpty | Self::SendTimeout { .. } | Self::Transport(_)
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_displays_service_format() {
        let err = Error::Remote {
            kind: ErrorKind::KeyNonExistent,
            code: 400,
            message: "The API key you specified does not exist".into(),
        };
        assert_eq!(
            err.to_string(),
            "Error 400: The API key you specified does not exist"
        );
        assert_eq!(err.kind(), Some(ErrorKind::KeyNonExistent));
        assert!(!err.is_retryable());
    }

    #[test]
    fn empty_cache_is_retryable() {
        assert!(Error::CacheEmpty.is_retryable());
        assert_eq!(Error::CacheEmpty.kind(), None);
        assert!(!Error::Shutdown.is_retryable());
    }
}
