//! Dispatch, pacing and caching for a JSON-RPC true random number service.
//!
//! The crate does not know what any remote method computes. It decides when a
//! request may be sent, how many may be in flight, how the server's advisory
//! delay and daily quota backoff are obeyed, and how a background producer
//! keeps a bounded cache of results warm.
//!
//! ```no_run
//! # #[cfg(feature = "http")]
//! # fn main() -> trng_rpc::Result<()> {
//! use serde_json::json;
//! use trng_rpc::{
//!     CacheSpec, Client, ClientConfig, HttpTransport, Registry, Request, extract, methods,
//! };
//!
//! let registry: Registry<HttpTransport> = Registry::new();
//! let client = registry.get_or_create_with("my-api-key", |identity| {
//!     Ok(Client::new(
//!         identity,
//!         ClientConfig::default(),
//!         HttpTransport::new()?,
//!     ))
//! })?;
//!
//! let request = Request::with_identity(
//!     methods::GENERATE_INTEGERS,
//!     client.identity(),
//!     json!({ "n": 6, "min": 1, "max": 49, "replacement": false }),
//! );
//! let drawn: Vec<i64> = extract::random_data(&client.send(request)?)?;
//! println!("{drawn:?}");
//!
//! let spec = CacheSpec::new(
//!     Request::with_identity(
//!         methods::GENERATE_INTEGERS,
//!         client.identity(),
//!         json!({ "n": 25, "min": 1, "max": 6, "base": 10 }),
//!     ),
//!     |response, _decimal| extract::random_data::<i64>(response),
//! )
//! .capacity(10)
//! .bulk(5, 5);
//! let cache = client.cache(spec)?;
//! match cache.get() {
//!     Ok(rolls) => println!("{rolls:?}"),
//!     Err(e) if e.is_retryable() => println!("cache still warming up"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "http"))]
//! # fn main() {}
//! ```

mod cache;
mod classify;
mod client;
mod dispatch;
mod envelope;
mod error;
pub mod extract;
mod gate;
mod pacing;
mod registry;
#[cfg(test)]
mod testing;
mod time;
mod transport;

pub use crate::cache::*;
pub use crate::classify::*;
pub use crate::client::*;
pub use crate::dispatch::*;
pub use crate::envelope::*;
pub use crate::error::*;
pub use crate::gate::*;
pub use crate::pacing::*;
pub use crate::registry::*;
pub use crate::time::*;
pub use crate::transport::*;
