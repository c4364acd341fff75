use crate::ErrorKind;

/// JSON-RPC parse error.
pub const PARSE_ERROR: i64 = -32700;

/// Request allowance exhausted. The only code that changes client state.
pub const QUOTA_EXCEEDED: i64 = 402;

/// Maps a remote error code onto its [`ErrorKind`].
///
/// This is a pure lookup consulted by the [`Gate`] on every error envelope.
///
/// # Example
/// ```
/// use trng_rpc::{ErrorKind, classify};
///
/// assert_eq!(classify(-32601), ErrorKind::Protocol);
/// assert_eq!(classify(402), ErrorKind::InsufficientRequests);
/// assert_eq!(classify(999), ErrorKind::Value);
/// ```
///
/// [`Gate`]: crate::Gate
pub const fn classify(code: i64) -> ErrorKind {
    match code {
        PARSE_ERROR | -32603..=-32601 | -32099..=-32000 => ErrorKind::Protocol,
        400 => ErrorKind::KeyNonExistent,
        401 => ErrorKind::KeyNotRunning,
        QUOTA_EXCEEDED => ErrorKind::InsufficientRequests,
        403 => ErrorKind::InsufficientBits,
        404 => ErrorKind::KeyInvalidAccess,
        405 => ErrorKind::KeyInvalidVersion,
        420 => ErrorKind::TicketNonExistent,
        421 => ErrorKind::TicketKeyMismatch,
        422 => ErrorKind::TicketAlreadyUsed,
        423 => ErrorKind::TooManySingletonTickets,
        424 => ErrorKind::LicenseDataRequired,
        425 => ErrorKind::LicenseDataNotAllowed,
        _ => ErrorKind::Value,
    }
}
