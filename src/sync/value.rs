use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use super::{KeyObserver, ObserverId, Store};

/// Bounds for values that can be bound to a storage key
pub trait Persisted:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> Persisted for T where
    T: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

struct Slot<T> {
    key: String,
    initial: T,
    state: watch::Sender<T>,
}

impl<T: Persisted> Slot<T> {
    fn decode(&self, raw: Option<&str>) -> T {
        let Some(raw) = raw else {
            return self.initial.clone();
        };

        match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %self.key, "Malformed value in local storage, using default: {}", e);
                self.initial.clone()
            }
        }
    }

    /// Replace the current value, waking watchers only on an actual change
    fn replace(&self, value: T) -> bool {
        self.state.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

impl<T: Persisted> KeyObserver for Slot<T> {
    fn apply(&self, raw: Option<&str>) {
        self.replace(self.decode(raw));
    }
}

/// A typed value persisted under one key and kept in sync with every other
/// `SyncedValue` bound to that key.
///
/// Writes land in memory, in storage and in the other observers of the same
/// store before `set` returns. Observers in other contexts catch up when the
/// storage port reports the change. Concurrent writers: last write wins.
pub struct SyncedValue<T: Persisted> {
    store: Arc<Store>,
    slot: Arc<Slot<T>>,
    id: ObserverId,
}

impl<T: Persisted> SyncedValue<T> {
    /// Bind `key` on `store`, starting from whatever is persisted.
    ///
    /// Missing or malformed persisted data yields `initial`.
    pub async fn mount(store: &Arc<Store>, key: impl Into<String>, initial: T) -> Self {
        let key = key.into();
        let (state, _) = watch::channel(initial.clone());
        let slot = Arc::new(Slot { key, initial, state });

        let observer: Arc<dyn KeyObserver> = slot.clone();
        let id = store.register(&slot.key, Arc::downgrade(&observer));

        let value = Self {
            store: store.clone(),
            slot,
            id,
        };
        value.reconcile().await;
        value
    }

    /// Pull the persisted value into memory, one scheduler tick late.
    ///
    /// The observer is registered before this runs, so a change that lands
    /// between registration and the read is still applied.
    pub async fn reconcile(&self) {
        tokio::task::yield_now().await;
        let raw = self.store.read_raw(&self.slot.key).await;
        self.slot.apply(raw.as_deref());
    }

    pub fn get(&self) -> T {
        self.slot.state.borrow().clone()
    }

    /// Read through a borrow without cloning
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.slot.state.borrow())
    }

    /// Receiver woken on every change, local or remote
    pub fn changes(&self) -> watch::Receiver<T> {
        self.slot.state.subscribe()
    }

    pub async fn set(&self, value: T) {
        let raw = match serde_json::to_string(&value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %self.slot.key, "Failed to encode value for local storage: {}", e);
                return;
            }
        };

        self.slot.replace(value);

        if self.store.write_raw(&self.slot.key, Some(&raw)).await {
            self.store.dispatch(&self.slot.key, Some(&raw), Some(self.id));
        }
    }

    /// Compute the next value from the current one and store it
    pub async fn update(&self, f: impl FnOnce(&T) -> T) -> T {
        let next = self.with(f);
        self.set(next.clone()).await;
        next
    }

    /// Drop the persisted entry; every observer falls back to its default
    pub async fn reset(&self) {
        self.slot.replace(self.slot.initial.clone());

        if self.store.write_raw(&self.slot.key, None).await {
            self.store.dispatch(&self.slot.key, None, Some(self.id));
        }
    }
}

impl<T: Persisted> Drop for SyncedValue<T> {
    fn drop(&mut self) {
        self.store.unregister(&self.slot.key, self.id);
    }
}

impl<T: Persisted + fmt::Debug> fmt::Debug for SyncedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedValue")
            .field("key", &self.slot.key)
            .field("value", &*self.slot.state.borrow())
            .finish()
    }
}
