//! Keeps typed in-memory values bound to storage keys consistent.
//!
//! A [`Store`] is one context's view of a [`StoragePort`]. Values mounted on
//! the same store see each other's writes synchronously through the store's
//! observer registry; writes from other contexts arrive through the port's
//! change channel and are fanned out by a background pump.

mod value;

pub use value::{Persisted, SyncedValue};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::storage::{ContextId, StorageEvent, StoragePort};

pub(crate) type ObserverId = u64;

/// Receives raw (JSON) values for one key. `None` means the key is absent.
pub(crate) trait KeyObserver: Send + Sync {
    fn apply(&self, raw: Option<&str>);
}

type Registry = HashMap<String, Vec<(ObserverId, Weak<dyn KeyObserver>)>>;

pub struct Store {
    port: Arc<dyn StoragePort>,
    observers: Mutex<Registry>,
    next_id: AtomicU64,
    _shutdown: oneshot::Sender<()>,
}

impl Store {
    /// Open a context on `port` and start forwarding changes from other
    /// contexts. Must be called from within a tokio runtime.
    pub fn open(port: Arc<dyn StoragePort>) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let events = port.subscribe();
        let context = port.context();

        let store = Arc::new(Self {
            port,
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            _shutdown: shutdown_tx,
        });

        tokio::spawn(pump(Arc::downgrade(&store), events, context, shutdown_rx));
        debug!(context = %context, "Opened store");

        store
    }

    pub fn context(&self) -> ContextId {
        self.port.context()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn register(&self, key: &str, observer: Weak<dyn KeyObserver>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry()
            .entry(key.to_string())
            .or_default()
            .push((id, observer));
        id
    }

    pub(crate) fn unregister(&self, key: &str, id: ObserverId) {
        let mut registry = self.registry();
        if let Some(observers) = registry.get_mut(key) {
            observers.retain(|(existing, _)| *existing != id);
            if observers.is_empty() {
                registry.remove(key);
            }
        }
    }

    /// Number of live observers bound to `key` in this context
    pub fn observer_count(&self, key: &str) -> usize {
        self.registry()
            .get(key)
            .map_or(0, |observers| {
                observers.iter().filter(|(_, o)| o.strong_count() > 0).count()
            })
    }

    /// Deliver `raw` to every observer of `key` except `skip`.
    ///
    /// Observers are collected first and called with the registry unlocked so
    /// an observer may itself mount or drop values.
    pub(crate) fn dispatch(&self, key: &str, raw: Option<&str>, skip: Option<ObserverId>) {
        let targets: Vec<Arc<dyn KeyObserver>> = {
            let mut registry = self.registry();
            let Some(observers) = registry.get_mut(key) else {
                return;
            };
            observers.retain(|(_, o)| o.strong_count() > 0);
            observers
                .iter()
                .filter(|(id, _)| Some(*id) != skip)
                .filter_map(|(_, o)| o.upgrade())
                .collect()
        };

        for observer in targets {
            observer.apply(raw);
        }
    }

    /// Read a key, logging and treating failures as absent
    pub(crate) async fn read_raw(&self, key: &str) -> Option<String> {
        match self.port.get_item(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, "Failed to read local storage: {}", e);
                None
            }
        }
    }

    /// Persist a key, logging failures. Returns whether the write landed.
    pub(crate) async fn write_raw(&self, key: &str, raw: Option<&str>) -> bool {
        let result = match raw {
            Some(raw) => self.port.set_item(key, raw).await,
            None => self.port.remove_item(key).await,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(key, "Failed to write local storage: {}", e);
                false
            }
        }
    }

    /// Re-read every observed key and push the persisted values out
    pub async fn resync(&self) {
        let keys: Vec<String> = self.registry().keys().cloned().collect();
        for key in keys {
            let raw = self.read_raw(&key).await;
            self.dispatch(&key, raw.as_deref(), None);
        }
    }
}

async fn pump(
    store: Weak<Store>,
    mut events: broadcast::Receiver<StorageEvent>,
    own_context: ContextId,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let received = tokio::select! {
            received = events.recv() => received,
            _ = &mut shutdown => break,
        };

        let Some(store) = store.upgrade() else {
            break;
        };

        match received {
            Ok(event) if event.origin == own_context => {}
            Ok(event) => {
                debug!(
                    key = %event.key,
                    origin = %event.origin,
                    "Applying storage change from another context"
                );
                store.dispatch(&event.key, event.new_value.as_deref(), None);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Storage change channel lagged, resynchronizing");
                store.resync().await;
            }
            Err(RecvError::Closed) => break,
        }
    }

    debug!(context = %own_context, "Storage change pump stopped");
}
