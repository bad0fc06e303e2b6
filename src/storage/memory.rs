use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use super::{ContextId, EVENT_CHANNEL_CAPACITY, StorageEvent, StoragePort};
use crate::error::StorageError;

struct Shared {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
    quota_bytes: Option<usize>,
}

/// In-memory backend.
///
/// Every `sibling()` shares the same entries and change channel, so a write in
/// one context shows up as a storage event in all the others.
#[derive(Clone)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
    context: ContextId,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Backend that rejects writes once keys plus values exceed `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self::build(Some(bytes))
    }

    fn build(quota_bytes: Option<usize>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                events,
                quota_bytes,
            }),
            context: ContextId::generate(),
        }
    }

    /// Open another context onto the same entries
    pub fn sibling(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            context: ContextId::generate(),
        }
    }

    /// Write an entry without raising a storage event, as if it had been
    /// persisted before any context was open.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Called with the entries lock held so events go out in commit order
    fn publish(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        if old_value == new_value {
            return;
        }
        // No receivers is not an error
        let _ = self.shared.events.send(StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            origin: self.context,
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries();

        if let Some(quota) = self.shared.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::Unavailable(format!(
                    "quota of {quota} bytes exceeded writing '{key}'"
                )));
            }
        }

        let old_value = entries.insert(key.to_string(), value.to_string());
        self.publish(key, old_value, Some(value.to_string()));
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries();
        let old_value = entries.remove(key);
        self.publish(key, old_value, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.shared.events.subscribe()
    }

    fn context(&self) -> ContextId {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_siblings_share_entries() {
        let first = MemoryStorage::new();
        let second = first.sibling();

        first.set_item("k", "\"v\"").await.unwrap();

        assert_eq!(second.get_item("k").await.unwrap(), Some("\"v\"".to_string()));
        assert_ne!(first.context(), second.context());
    }

    #[tokio::test]
    async fn test_set_publishes_event_with_origin() {
        let storage = MemoryStorage::new();
        let mut events = storage.sibling().subscribe();

        storage.set_item("k", "1").await.unwrap();
        storage.set_item("k", "2").await.unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.old_value, None);
        assert_eq!(first.new_value.as_deref(), Some("1"));
        assert_eq!(first.origin, storage.context());

        let second = events.recv().await.unwrap();
        assert_eq!(second.old_value.as_deref(), Some("1"));
        assert_eq!(second.new_value.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_unchanged_value_is_silent() {
        let storage = MemoryStorage::new();
        let mut events = storage.subscribe();

        storage.set_item("k", "1").await.unwrap();
        storage.set_item("k", "1").await.unwrap();
        storage.remove_item("missing").await.unwrap();

        assert!(events.recv().await.is_ok());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_publishes_none() {
        let storage = MemoryStorage::new();
        storage.set_item("k", "1").await.unwrap();
        let mut events = storage.subscribe();

        storage.remove_item("k").await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.new_value, None);
        assert_eq!(storage.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quota_rejects_oversized_write() {
        let storage = MemoryStorage::with_quota(8);

        assert!(storage.set_item("k", "1234").await.is_ok());
        let err = storage.set_item("other", "12345").await.unwrap_err();

        assert!(matches!(err, StorageError::Unavailable(_)));
        assert_eq!(storage.get_item("other").await.unwrap(), None);
        // Overwriting the same key only counts the replacement
        assert!(storage.set_item("k", "123456").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_publish_in_commit_order() {
        let storage = MemoryStorage::new();
        let mut events = storage.subscribe();

        for round in 0..100 {
            let writers: Vec<_> = (0..4)
                .map(|writer| {
                    let storage = storage.sibling();
                    tokio::spawn(async move {
                        let value = format!("{round}-{writer}");
                        storage.set_item("k", &value).await.unwrap();
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap();
            }

            let mut last = None;
            while let Ok(event) = events.try_recv() {
                last = event.new_value;
            }
            assert_eq!(last, storage.get_item("k").await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_seed_does_not_publish() {
        let storage = MemoryStorage::new();
        let mut events = storage.subscribe();

        storage.seed("k", "1");

        assert!(events.try_recv().is_err());
        assert_eq!(storage.get_item("k").await.unwrap(), Some("1".to_string()));
    }
}
