use anyhow::Result;
use std::sync::Arc;

use card_wallet::config::Config;
use card_wallet::preferences::Preferences;
use card_wallet::storage::SqliteStorage;
use card_wallet::sync::Store;
use card_wallet::wallet::SavedCards;

pub struct AppState {
    pub cards: SavedCards,
    pub preferences: Preferences,
    pub config: Arc<Config>,
    pub store: Arc<Store>,
}

impl AppState {
    pub async fn open(config: Arc<Config>) -> Result<Self> {
        let storage = SqliteStorage::connect(&config.database_url, config.poll_interval()).await?;
        let store = Store::open(Arc::new(storage));

        Ok(Self {
            cards: SavedCards::mount(&store, config.wallet_settings()).await,
            preferences: Preferences::mount(&store).await,
            config,
            store,
        })
    }
}
