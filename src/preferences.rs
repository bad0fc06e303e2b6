use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::sync::{Store, SyncedValue};

pub const PREFERRED_CONTENT_KEY: &str = "preferences.preferred_content";

/// Category used to bias what the storefront recommends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Games,
    Movies,
    Music,
    Books,
    Software,
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentCategory::Games => "games",
            ContentCategory::Movies => "movies",
            ContentCategory::Music => "music",
            ContentCategory::Books => "books",
            ContentCategory::Software => "software",
        };
        f.write_str(name)
    }
}

/// Email notifications a user can switch on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum NotificationKind {
    OrderUpdates,
    PriceDrops,
    Promotions,
    Newsletter,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::OrderUpdates,
        NotificationKind::PriceDrops,
        NotificationKind::Promotions,
        NotificationKind::Newsletter,
    ];

    pub fn key(self) -> &'static str {
        match self {
            NotificationKind::OrderUpdates => "preferences.notify.order_updates",
            NotificationKind::PriceDrops => "preferences.notify.price_drops",
            NotificationKind::Promotions => "preferences.notify.promotions",
            NotificationKind::Newsletter => "preferences.notify.newsletter",
        }
    }

    /// Only transactional mail is on until the user opts in to the rest
    pub fn enabled_by_default(self) -> bool {
        matches!(self, NotificationKind::OrderUpdates)
    }

    pub fn label(self) -> &'static str {
        match self {
            NotificationKind::OrderUpdates => "Order updates",
            NotificationKind::PriceDrops => "Price drops on wishlist items",
            NotificationKind::Promotions => "Promotions and offers",
            NotificationKind::Newsletter => "Newsletter",
        }
    }
}

/// Content and notification preferences. Every value lives under its own
/// key and changes independently of the others.
pub struct Preferences {
    preferred_content: SyncedValue<Option<ContentCategory>>,
    order_updates: SyncedValue<bool>,
    price_drops: SyncedValue<bool>,
    promotions: SyncedValue<bool>,
    newsletter: SyncedValue<bool>,
}

impl Preferences {
    pub async fn mount(store: &Arc<Store>) -> Self {
        async fn mount_flag(store: &Arc<Store>, kind: NotificationKind) -> SyncedValue<bool> {
            SyncedValue::mount(store, kind.key(), kind.enabled_by_default()).await
        }

        Self {
            preferred_content: SyncedValue::mount(store, PREFERRED_CONTENT_KEY, None).await,
            order_updates: mount_flag(store, NotificationKind::OrderUpdates).await,
            price_drops: mount_flag(store, NotificationKind::PriceDrops).await,
            promotions: mount_flag(store, NotificationKind::Promotions).await,
            newsletter: mount_flag(store, NotificationKind::Newsletter).await,
        }
    }

    fn flag(&self, kind: NotificationKind) -> &SyncedValue<bool> {
        match kind {
            NotificationKind::OrderUpdates => &self.order_updates,
            NotificationKind::PriceDrops => &self.price_drops,
            NotificationKind::Promotions => &self.promotions,
            NotificationKind::Newsletter => &self.newsletter,
        }
    }

    pub fn preferred_content(&self) -> Option<ContentCategory> {
        self.preferred_content.get()
    }

    /// `None` clears the preference
    pub async fn set_preferred_content(&self, category: Option<ContentCategory>) {
        match category {
            Some(category) => self.preferred_content.set(Some(category)).await,
            None => self.preferred_content.reset().await,
        }
        info!(?category, "Updated preferred content");
    }

    pub fn notification_enabled(&self, kind: NotificationKind) -> bool {
        self.flag(kind).get()
    }

    pub async fn set_notification(&self, kind: NotificationKind, enabled: bool) {
        self.flag(kind).set(enabled).await;
        info!(?kind, enabled, "Updated notification preference");
    }

    pub fn notifications(&self) -> Vec<(NotificationKind, bool)> {
        NotificationKind::ALL
            .into_iter()
            .map(|kind| (kind, self.notification_enabled(kind)))
            .collect()
    }

    pub fn preferred_content_changes(&self) -> watch::Receiver<Option<ContentCategory>> {
        self.preferred_content.changes()
    }

    pub fn notification_changes(&self, kind: NotificationKind) -> watch::Receiver<bool> {
        self.flag(kind).changes()
    }
}
