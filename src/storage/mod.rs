pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::fmt;
use tokio::sync::broadcast;

use crate::error::StorageError;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Identity of one independent view onto a shared backing store.
///
/// Two contexts are the local equivalent of two browser tabs: they share the
/// persisted entries but each keeps its own in-memory observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Origin reported for changes whose writer cannot be identified
    pub const UNKNOWN: ContextId = ContextId(0);

    pub fn generate() -> Self {
        Self(rand::random::<u64>().max(1))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A committed change to one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed
    pub new_value: Option<String>,
    pub origin: ContextId,
}

/// Key/value persistence shared by every context of one wallet.
///
/// Values are opaque strings (JSON in practice). `subscribe` yields every
/// committed change; consumers skip events whose `origin` is their own
/// `context()`.
#[async_trait]
pub trait StoragePort: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;

    fn context(&self) -> ContextId;
}

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;
