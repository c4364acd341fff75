use crate::Request;
use core::time::Duration;
use serde_json::Value;

/// Boxed error produced by a [`Transport`].
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// A single request/response exchange with the service.
///
/// Implementations perform exactly one round trip and return the decoded
/// response document. They must not retry, pace, or interpret the envelope;
/// the [`Gate`] does that.
///
/// [`Gate`]: crate::Gate
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and waits at most `timeout` for the response body.
    ///
    /// # Errors
    ///
    /// Connection failures, timeouts, and undecodable bodies.
    fn exchange(&self, request: &Request, timeout: Duration) -> Result<Value, TransportError>;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn exchange(&self, request: &Request, timeout: Duration) -> Result<Value, TransportError> {
        (**self).exchange(request, timeout)
    }
}

#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
pub use http::*;

#[cfg(feature = "http")]
mod http {
    use super::{Transport, TransportError};
    use crate::Request;
    use core::time::Duration;
    use reqwest::{StatusCode, blocking::Client as HttpClient};
    use serde_json::Value;

    /// Default service endpoint.
    #[cfg_attr(docsrs, doc(cfg(feature = "http")))]
    pub const DEFAULT_ENDPOINT: &str = "https://api.random.org/json-rpc/4/invoke";

    /// A response body that is not a JSON document.
    #[cfg_attr(docsrs, doc(cfg(feature = "http")))]
    #[derive(Debug, thiserror::Error)]
    #[error("HTTP {status}: body is not JSON: {source}")]
    pub struct UndecodableBody {
        pub status: StatusCode,
        #[source]
        source: serde_json::Error,
    }

    /// JSON over HTTPS using a blocking `reqwest` client.
    ///
    /// The body is decoded whatever the HTTP status, so an error envelope
    /// sent with a non-2xx status still reaches the gate as a remote error.
    #[cfg_attr(docsrs, doc(cfg(feature = "http")))]
    #[derive(Clone, Debug)]
    pub struct HttpTransport {
        http: HttpClient,
        endpoint: String,
    }

    impl HttpTransport {
        /// Creates a transport for [`DEFAULT_ENDPOINT`].
        ///
        /// # Errors
        ///
        /// Returns [`crate::Error::Transport`] if the TLS backend cannot be
        /// initialised.
        pub fn new() -> crate::Result<Self> {
            Self::with_endpoint(DEFAULT_ENDPOINT)
        }

        /// Creates a transport posting to `endpoint`.
        ///
        /// # Errors
        ///
        /// Returns [`crate::Error::Transport`] if the TLS backend cannot be
        /// initialised.
        pub fn with_endpoint(endpoint: impl Into<String>) -> crate::Result<Self> {
            let http = HttpClient::builder()
                .build()
                .map_err(|e| crate::Error::Transport(Box::new(e)))?;
            Ok(Self {
                http,
                endpoint: endpoint.into(),
            })
        }

        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    impl Transport for HttpTransport {
        fn exchange(
            &self,
            request: &Request,
            timeout: Duration,
        ) -> Result<Value, TransportError> {
            let response = self
                .http
                .post(&self.endpoint)
                .timeout(timeout)
                .json(request)
                .send()?;
            let status = response.status();
            let body = response.bytes()?;
            let document = serde_json::from_slice(&body)
                .map_err(|source| UndecodableBody { status, source })?;
            Ok(document)
        }
    }

}
