//! Request documents and response envelopes.
//!
//! A [`Request`] is the JSON-RPC 2.0 document sent to the service. The core
//! treats its parameters as opaque; it only needs the identity parameter for
//! the usage query it issues itself.
//!
//! Responses are either `{"result": {...}}` or
//! `{"error": {"code": ..., "message": ...}}`. [`Envelope::parse`] splits the
//! two and pulls out the pacing hints carried by successful results.

use crate::{Error, Result};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version sent in every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Name of the identity parameter understood by the service.
pub const IDENTITY_PARAM: &str = "apiKey";

/// Method names used by this crate and its command line client.
pub mod methods {
    pub const GENERATE_INTEGERS: &str = "generateIntegers";
    pub const GENERATE_INTEGER_SEQUENCES: &str = "generateIntegerSequences";
    pub const GENERATE_DECIMAL_FRACTIONS: &str = "generateDecimalFractions";
    pub const GENERATE_STRINGS: &str = "generateStrings";
    pub const GENERATE_UUIDS: &str = "generateUUIDs";
    pub const GENERATE_SIGNED_INTEGERS: &str = "generateSignedIntegers";
    pub const GET_USAGE: &str = "getUsage";
}

/// A JSON-RPC request document with a unique correlation id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    pub params: Map<String, Value>,
    pub id: String,
}

impl Request {
    /// Builds a request for `method`. Non-object `params` are sent as an
    /// empty parameter map.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: correlation_id(),
        }
    }

    /// Builds a request for `method` carrying `identity` as its `apiKey`
    /// parameter.
    pub fn with_identity(method: impl Into<String>, identity: &str, params: Value) -> Self {
        let mut request = Self::new(method, params);
        request
            .params
            .insert(IDENTITY_PARAM.to_string(), Value::from(identity));
        request
    }

    /// A copy of this request under a fresh correlation id.
    pub fn renewed(&self) -> Self {
        Self {
            id: correlation_id(),
            ..self.clone()
        }
    }

    /// Whether integer results of this request are decimal.
    ///
    /// The service returns integers in bases other than 10 as strings.
    pub fn is_decimal(&self) -> bool {
        self.params
            .get("base")
            .and_then(Value::as_i64)
            .is_none_or(|base| base == 10)
    }
}

/// 128 random bits rendered as 32 lowercase hex digits.
fn correlation_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// The error member of a failed response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemoteError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteError>,
}

/// A response envelope split into its two shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope<'a> {
    /// `result` member of a successful response.
    Success(&'a Value),
    /// `error` member of a failed response.
    Failure(RemoteError),
}

impl<'a> Envelope<'a> {
    /// Splits a response document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the document carries neither a
    /// `result` nor a well-formed `error`.
    pub fn parse(response: &'a Value) -> Result<Self> {
        let raw = RawEnvelope::deserialize(response)?;
        if let Some(error) = raw.error {
            return Ok(Self::Failure(error));
        }
        match (raw.result, response.get("result")) {
            (Some(_), Some(result)) => Ok(Self::Success(result)),
            _ => Err(Error::malformed("response has neither result nor error")),
        }
    }
}

/// Pacing hints carried by a successful result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacingHints {
    pub advisory_delay: Option<Duration>,
    pub requests_left: Option<i64>,
    pub bits_left: Option<i64>,
}

impl PacingHints {
    /// Reads `advisoryDelay` (milliseconds), `requestsLeft` and `bitsLeft`
    /// from a `result` member. Missing or non-integer fields are ignored.
    pub fn from_result(result: &Value) -> Self {
        let advisory_delay = result
            .get("advisoryDelay")
            .and_then(Value::as_u64)
            .map(Duration::from_millis);
        Self {
            advisory_delay,
            requests_left: result.get("requestsLeft").and_then(Value::as_i64),
            bits_left: result.get("bitsLeft").and_then(Value::as_i64),
        }
    }
}
