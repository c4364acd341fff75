//! Helpers that pull typed data out of successful response documents.
//!
//! Generate methods put their values in `result.random.data`; signed methods
//! additionally return the `random` object that was signed and its
//! `signature`. These helpers are suitable as [`CacheSpec`] extractors.
//!
//! [`CacheSpec`]: crate::CacheSpec

use crate::{Error, Result};
use core::fmt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// An integer as returned by the service.
///
/// Integers requested in base 10 arrive as JSON numbers; every other base
/// arrives as a string of digits in that base.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Integer {
    Decimal(i64),
    Encoded(String),
}

impl Integer {
    pub const fn as_decimal(&self) -> Option<i64> {
        match self {
            Self::Decimal(n) => Some(*n),
            Self::Encoded(_) => None,
        }
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal(n) => write!(f, "{n}"),
            Self::Encoded(s) => f.write_str(s),
        }
    }
}

/// Signed data together with what is needed to verify it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Signed<T> {
    pub data: Vec<T>,
    /// The `random` object exactly as signed by the service.
    pub random: Value,
    /// Base64 signature over `random`.
    pub signature: String,
}

fn member<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter().try_fold(value, |value, key| {
        value
            .get(key)
            .ok_or_else(|| Error::malformed(format!("response has no `{}`", path.join("."))))
    })
}

/// Deserializes `result.random.data`.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the member is missing or does not
/// hold a list of `T`.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use trng_rpc::extract;
///
/// let response = json!({ "result": { "random": { "data": [4, 8, 15] } } });
/// let data: Vec<u32> = extract::random_data(&response).unwrap();
/// assert_eq!(data, vec![4, 8, 15]);
/// ```
pub fn random_data<T: DeserializeOwned>(response: &Value) -> Result<Vec<T>> {
    let data = member(response, &["result", "random", "data"])?;
    Ok(Vec::<T>::deserialize(data)?)
}

/// Reads integers, as numbers in `decimal` mode and as strings otherwise.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the data does not match the mode.
pub fn integers(response: &Value, decimal: bool) -> Result<Vec<Integer>> {
    Ok(if decimal {
        random_data::<i64>(response)?
            .into_iter()
            .map(Integer::Decimal)
            .collect()
    } else {
        random_data::<String>(response)?
            .into_iter()
            .map(Integer::Encoded)
            .collect()
    })
}

/// Reads integer sequences. Each sequence may mix representations when the
/// request gave a base per sequence.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the data is not a list of lists.
pub fn integer_sequences(response: &Value) -> Result<Vec<Vec<Integer>>> {
    random_data(response)
}

/// Reads the data of a signed response with `data` and keeps the signed
/// `random` object and `signature` alongside.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if `random` or `signature` is
/// missing, or any error of `data`.
pub fn signed<T>(
    response: &Value,
    data: impl FnOnce(&Value) -> Result<Vec<T>>,
) -> Result<Signed<T>> {
    let random = member(response, &["result", "random"])?.clone();
    let signature = member(response, &["result", "signature"])?
        .as_str()
        .ok_or_else(|| Error::malformed("`result.signature` is not a string"))?
        .to_string();
    Ok(Signed {
        data: data(response)?,
        random,
        signature,
    })
}
