use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use super::{ContextId, EVENT_CHANNEL_CAPACITY, StorageEvent, StoragePort};
use crate::error::StorageError;

/// Open (creating if needed) the wallet file and run migrations
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

struct Inner {
    pool: SqlitePool,
    context: ContextId,
    events: broadcast::Sender<StorageEvent>,
    /// Last contents known to this context. Held across every write and every
    /// poll so a poll never reports this context's own writes.
    snapshot: Mutex<HashMap<String, String>>,
}

/// SQLite-file backend.
///
/// Other processes (or other `SqliteStorage` values on the same pool) may
/// write to the same table; a background poller diffs the table and
/// publishes their changes with origin [`ContextId::UNKNOWN`].
#[derive(Clone)]
pub struct SqliteStorage {
    inner: Arc<Inner>,
}

impl SqliteStorage {
    pub async fn connect(
        database_url: &str,
        poll_interval: Duration,
    ) -> Result<Self, StorageError> {
        let pool = init_pool(database_url).await?;
        Self::from_pool(pool, poll_interval).await
    }

    /// Wrap an already migrated pool
    pub async fn from_pool(
        pool: SqlitePool,
        poll_interval: Duration,
    ) -> Result<Self, StorageError> {
        let snapshot = load_all(&pool).await?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let inner = Arc::new(Inner {
            pool,
            context: ContextId::generate(),
            events,
            snapshot: Mutex::new(snapshot),
        });

        debug!(context = %inner.context, "Opened sqlite storage context");
        tokio::spawn(poll_changes(Arc::downgrade(&inner), poll_interval));

        Ok(Self { inner })
    }

    /// Called with the snapshot lock held so events go out in commit order
    fn publish(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        if old_value == new_value {
            return;
        }
        let _ = self.inner.events.send(StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            origin: self.inner.context,
        });
    }
}

async fn load_all(pool: &SqlitePool) -> Result<HashMap<String, String>, StorageError> {
    let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM local_storage")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().collect())
}

async fn poll_changes(weak: Weak<Inner>, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = weak.upgrade() else {
            break;
        };

        let mut snapshot = inner.snapshot.lock().await;
        let current = match load_all(&inner.pool).await {
            Ok(current) => current,
            Err(e) => {
                warn!("Failed to poll local storage: {}", e);
                continue;
            }
        };

        for event in diff(&snapshot, &current) {
            debug!(key = %event.key, "Detected external storage change");
            let _ = inner.events.send(event);
        }
        *snapshot = current;
    }
}

fn diff(before: &HashMap<String, String>, after: &HashMap<String, String>) -> Vec<StorageEvent> {
    let mut events = Vec::new();

    for (key, value) in after {
        let old_value = before.get(key);
        if old_value != Some(value) {
            events.push(StorageEvent {
                key: key.clone(),
                old_value: old_value.cloned(),
                new_value: Some(value.clone()),
                origin: ContextId::UNKNOWN,
            });
        }
    }

    for (key, value) in before {
        if !after.contains_key(key) {
            events.push(StorageEvent {
                key: key.clone(),
                old_value: Some(value.clone()),
                new_value: None,
                origin: ContextId::UNKNOWN,
            });
        }
    }

    events
}

#[async_trait]
impl StoragePort for SqliteStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM local_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.inner.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut snapshot = self.inner.snapshot.lock().await;
        let mut tx = self.inner.pool.begin().await?;

        // The row being replaced, which may be newer than the snapshot
        let old_value =
            sqlx::query_as::<_, (String,)>("SELECT value FROM local_storage WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?
                .map(|(value,)| value);

        sqlx::query(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        snapshot.insert(key.to_string(), value.to_string());
        self.publish(key, old_value, Some(value.to_string()));
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut snapshot = self.inner.snapshot.lock().await;

        let old_value = sqlx::query_as::<_, (String,)>(
            "DELETE FROM local_storage WHERE key = ? RETURNING value",
        )
        .bind(key)
        .fetch_optional(&self.inner.pool)
        .await?
        .map(|(value,)| value);

        snapshot.remove(key);
        self.publish(key, old_value, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.events.subscribe()
    }

    fn context(&self) -> ContextId {
        self.inner.context
    }
}
