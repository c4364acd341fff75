use crate::{Client, Clock, Error, Result, SystemClock, Transport};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

#[cfg(feature = "tracing")]
use crate::client::redact;

/// Hands out one shared [`Client`] per identity.
///
/// The registry is an ordinary value: create it at startup, pass it to
/// whatever needs clients and [`clear`](Self::clear) it when a fresh set is
/// required. Clients are never removed otherwise.
///
/// Construction runs under the registry lock, so concurrent callers asking
/// for the same identity all receive the same instance and the builder runs
/// once.
pub struct Registry<T, C = SystemClock> {
    clients: Mutex<HashMap<String, Arc<Client<T, C>>>>,
}

impl<T, C> Registry<T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the client for `identity`, building it with `build` on first
    /// use.
    ///
    /// # Errors
    ///
    /// Any error of `build`, or [`Error::InvalidRequest`] if it returns a
    /// client for a different identity. Nothing is stored in either case.
    pub fn get_or_create_with<F>(&self, identity: &str, build: F) -> Result<Arc<Client<T, C>>>
    where
        F: FnOnce(&str) -> Result<Client<T, C>>,
    {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(identity) {
            #[cfg(feature = "tracing")]
            tracing::info!("Using existing client for identity {}", redact(identity));
            return Ok(Arc::clone(client));
        }

        let client = build(identity)?;
        if client.identity() != identity {
            return Err(Error::InvalidRequest {
                reason: "client was built for a different identity".to_string(),
            });
        }
        let client = Arc::new(client);
        clients.insert(identity.to_string(), Arc::clone(&client));
        Ok(client)
    }

    pub fn get(&self, identity: &str) -> Option<Arc<Client<T, C>>> {
        self.clients.lock().get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Forgets every client. Clients still referenced elsewhere keep working.
    pub fn clear(&self) {
        self.clients.lock().clear();
    }
}

impl<T, C> Default for Registry<T, C>
where
    T: Transport,
    C: Clock,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientConfig, testing::ScriptedTransport};
    use serde_json::json;
    use std::{
        sync::{
            Barrier,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };

    type TestRegistry = Registry<Arc<ScriptedTransport>>;

    fn build(identity: &str) -> Result<Client<Arc<ScriptedTransport>>> {
        Ok(Client::new(
            identity,
            ClientConfig::default(),
            ScriptedTransport::replying(json!({})),
        ))
    }

    #[test]
    fn same_identity_same_instance() {
        let registry = TestRegistry::new();
        let a = registry.get_or_create_with("X", build).unwrap();
        let b = registry.get_or_create_with("X", build).unwrap();
        let y = registry.get_or_create_with("Y", build).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &y));
        assert!(!Arc::ptr_eq(a.gate(), y.gate()));
        assert_eq!(registry.len(), 2);
        assert!(Arc::ptr_eq(&registry.get("Y").unwrap(), &y));
        assert!(registry.get("Z").is_none());
    }

    #[test]
    fn concurrent_callers_share_one_construction() {
        let registry = Arc::new(TestRegistry::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (registry, builds, barrier) =
                    (Arc::clone(&registry), Arc::clone(&builds), Arc::clone(&barrier));
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .get_or_create_with("shared", |identity| {
                            builds.fetch_add(1, Ordering::SeqCst);
                            build(identity)
                        })
                        .unwrap()
                })
            })
            .collect();
        let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(clients.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn failed_construction_stores_nothing() {
        let registry = TestRegistry::new();
        let err = registry
            .get_or_create_with("X", |_| Err(Error::InvalidRequest { reason: "nope".into() }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
        assert!(registry.is_empty());

        assert!(registry.get_or_create_with("X", |_| build("other")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_starts_afresh() {
        let registry = TestRegistry::new();
        let before = registry.get_or_create_with("X", build).unwrap();
        registry.clear();
        assert!(registry.is_empty());

        let after = registry.get_or_create_with("X", build).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        // The forgotten client remains usable by its holders.
        assert_eq!(before.identity(), "X");
    }
}
