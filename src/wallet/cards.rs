use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use super::models::{Card, CardForm, CardId, MaskedNumber, Money};
use crate::error::WalletError;
use crate::sync::{Store, SyncedValue};
use crate::validation::validate_card_form;

pub const SAVED_CARDS_KEY: &str = "wallet.saved_cards";
pub const MAIN_CARD_KEY: &str = "wallet.main_card_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSettings {
    /// Balance every newly added card starts with
    pub starting_balance: Money,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            starting_balance: Money::from_cents(100_000),
        }
    }
}

/// Outcome of designating a main card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainCardChange {
    Changed { previous: Option<CardId> },
    AlreadyMain,
    UnknownCard,
}

/// The saved-cards collection and the main-card reference into it
pub struct SavedCards {
    cards: SyncedValue<Vec<Card>>,
    main_card: SyncedValue<Option<CardId>>,
    settings: WalletSettings,
}

impl SavedCards {
    pub async fn mount(store: &Arc<Store>, settings: WalletSettings) -> Self {
        Self {
            cards: SyncedValue::mount(store, SAVED_CARDS_KEY, Vec::new()).await,
            main_card: SyncedValue::mount(store, MAIN_CARD_KEY, None).await,
            settings,
        }
    }

    pub fn cards(&self) -> Vec<Card> {
        self.cards.get()
    }

    pub fn card(&self, id: &CardId) -> Option<Card> {
        self.cards.with(|cards| cards.iter().find(|c| &c.id == id).cloned())
    }

    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.with(|cards| cards.iter().any(|c| &c.id == id))
    }

    /// The stored main-card reference, which may point at a card that no
    /// longer exists if another context deleted it
    pub fn main_card_id(&self) -> Option<CardId> {
        self.main_card.get()
    }

    pub fn main_card(&self) -> Option<Card> {
        self.main_card_id().and_then(|id| self.card(&id))
    }

    pub fn is_main(&self, id: &CardId) -> bool {
        self.main_card.with(|main| main.as_ref() == Some(id))
    }

    /// Validate and save a new card. The first card saved while no main card
    /// exists becomes the main card.
    pub async fn add_card(&self, form: &CardForm) -> Result<Card, WalletError> {
        self.add_card_on(form, Local::now().date_naive()).await
    }

    pub async fn add_card_on(
        &self,
        form: &CardForm,
        today: NaiveDate,
    ) -> Result<Card, WalletError> {
        let validated = validate_card_form(form, today)?;

        let card = Card {
            id: CardId::generate(),
            network: validated.network,
            number: MaskedNumber::mask(&validated.digits),
            holder: validated.holder,
            expiry: validated.expiry,
            balance: Some(self.settings.starting_balance),
        };

        self.cards
            .update(|cards| {
                let mut cards = cards.clone();
                cards.push(card.clone());
                cards
            })
            .await;
        info!(card_id = %card.id, network = %card.network, "Saved card");

        if self.main_card().is_none() {
            self.main_card.set(Some(card.id.clone())).await;
            debug!(card_id = %card.id, "Assigned first card as main");
        }

        Ok(card)
    }

    /// Remove a card. Returns `false` if no card has this id.
    pub async fn delete_card(&self, id: &CardId) -> bool {
        if !self.contains(id) {
            debug!(card_id = %id, "Delete of unknown card ignored");
            return false;
        }

        self.cards
            .update(|cards| cards.iter().filter(|c| &c.id != id).cloned().collect())
            .await;

        if self.is_main(id) {
            self.main_card.set(None).await;
            debug!(card_id = %id, "Cleared main card reference");
        }

        info!(card_id = %id, "Deleted card");
        true
    }

    pub async fn set_main_card(&self, id: &CardId) -> MainCardChange {
        if !self.contains(id) {
            return MainCardChange::UnknownCard;
        }
        if self.is_main(id) {
            return MainCardChange::AlreadyMain;
        }

        let previous = self.main_card_id();
        self.main_card.set(Some(id.clone())).await;
        info!(card_id = %id, "Set main card");

        MainCardChange::Changed { previous }
    }

    /// Wallet balance: the sum of every saved card's balance
    pub fn balance(&self) -> Money {
        self.cards
            .with(|cards| cards.iter().filter_map(|c| c.balance).sum())
    }

    pub fn main_card_balance(&self) -> Option<Money> {
        self.main_card().and_then(|card| card.balance)
    }

    pub fn card_changes(&self) -> watch::Receiver<Vec<Card>> {
        self.cards.changes()
    }

    pub fn main_card_changes(&self) -> watch::Receiver<Option<CardId>> {
        self.main_card.changes()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::CardFormError;
    use crate::storage::{MemoryStorage, StoragePort};
    use crate::wallet::models::CardNetwork;
    use std::time::Duration;

    pub(crate) fn form(number: &str, holder: &str) -> CardForm {
        let cvc = if number.starts_with('3') { "1234" } else { "123" };
        CardForm {
            network: None,
            number: number.to_string(),
            holder: holder.to_string(),
            expiry: "12/39".to_string(),
            cvc: cvc.to_string(),
        }
    }

    async fn mount(storage: &MemoryStorage) -> SavedCards {
        let store = Store::open(Arc::new(storage.clone()));
        SavedCards::mount(&store, WalletSettings::default()).await
    }

    #[tokio::test]
    async fn test_first_card_becomes_main() {
        let wallet = mount(&MemoryStorage::new()).await;

        let a = wallet.add_card(&form("4242424242424242", "A")).await.unwrap();
        assert_eq!(wallet.main_card_id(), Some(a.id.clone()));

        let b = wallet.add_card(&form("5555555555554444", "B")).await.unwrap();
        assert_eq!(wallet.main_card_id(), Some(a.id));
        assert_eq!(wallet.cards().len(), 2);
        assert!(!wallet.is_main(&b.id));
    }

    #[tokio::test]
    async fn test_main_card_lifecycle() {
        let wallet = mount(&MemoryStorage::new()).await;

        let a = wallet.add_card(&form("4242424242424242", "A")).await.unwrap();
        let b = wallet.add_card(&form("5555555555554444", "B")).await.unwrap();
        assert_eq!(wallet.main_card_id(), Some(a.id.clone()));

        assert!(wallet.delete_card(&a.id).await);
        assert_eq!(wallet.main_card_id(), None);

        assert_eq!(
            wallet.set_main_card(&b.id).await,
            MainCardChange::Changed { previous: None }
        );
        assert_eq!(wallet.main_card().map(|c| c.id), Some(b.id));
    }

    #[tokio::test]
    async fn test_deleting_other_card_keeps_main() {
        let wallet = mount(&MemoryStorage::new()).await;
        let a = wallet.add_card(&form("4242424242424242", "A")).await.unwrap();
        let b = wallet.add_card(&form("5555555555554444", "B")).await.unwrap();

        assert!(wallet.delete_card(&b.id).await);

        assert_eq!(wallet.main_card_id(), Some(a.id));
        assert_eq!(wallet.cards().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_card_is_noop() {
        let storage = MemoryStorage::new();
        let wallet = mount(&storage).await;
        wallet.add_card(&form("4242424242424242", "A")).await.unwrap();
        let before = storage.get_item(SAVED_CARDS_KEY).await.unwrap();

        assert!(!wallet.delete_card(&CardId::new("missing")).await);

        assert_eq!(storage.get_item(SAVED_CARDS_KEY).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_set_main_twice_is_noop() {
        let wallet = mount(&MemoryStorage::new()).await;
        let a = wallet.add_card(&form("4242424242424242", "A")).await.unwrap();

        assert_eq!(wallet.set_main_card(&a.id).await, MainCardChange::AlreadyMain);
        assert_eq!(
            wallet.set_main_card(&CardId::new("missing")).await,
            MainCardChange::UnknownCard
        );
    }

    #[tokio::test]
    async fn test_new_card_fields() {
        let storage = MemoryStorage::new();
        let wallet = mount(&storage).await;

        let card = wallet.add_card(&form("3782 822463 10005", "  Ada ")).await.unwrap();

        assert_eq!(card.network, CardNetwork::Amex);
        assert_eq!(card.holder, "Ada");
        assert_eq!(card.number.last4(), "0005");
        assert_eq!(card.balance, Some(WalletSettings::default().starting_balance));
        assert_eq!(card.id.as_str().len(), 16);

        let raw = storage.get_item(SAVED_CARDS_KEY).await.unwrap().unwrap();
        assert!(!raw.contains("378282246310005"));
        assert!(!raw.contains("cvc"));
    }

    #[tokio::test]
    async fn test_invalid_form_saves_nothing() {
        let wallet = mount(&MemoryStorage::new()).await;

        let err = wallet
            .add_card(&form("4242424242424241", "A"))
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::InvalidCard(CardFormError::InvalidChecksum)));
        assert!(wallet.cards().is_empty());
        assert_eq!(wallet.main_card_id(), None);
    }

    #[tokio::test]
    async fn test_balance_sums_cards() {
        let storage = MemoryStorage::new();
        let store = Store::open(Arc::new(storage.clone()));
        let settings = WalletSettings {
            starting_balance: Money::from_cents(2_500),
        };
        let wallet = SavedCards::mount(&store, settings).await;

        assert_eq!(wallet.balance(), Money::ZERO);
        assert_eq!(wallet.main_card_balance(), None);

        wallet.add_card(&form("4242424242424242", "A")).await.unwrap();
        wallet.add_card(&form("5555555555554444", "B")).await.unwrap();

        assert_eq!(wallet.balance(), Money::from_cents(5_000));
        assert_eq!(wallet.main_card_balance(), Some(Money::from_cents(2_500)));
    }

    #[tokio::test]
    async fn test_two_wallets_in_same_context_stay_in_step() {
        let store = Store::open(Arc::new(MemoryStorage::new()));
        let first = SavedCards::mount(&store, WalletSettings::default()).await;
        let second = SavedCards::mount(&store, WalletSettings::default()).await;

        let a = first.add_card(&form("4242424242424242", "A")).await.unwrap();

        assert_eq!(second.cards().len(), 1);
        assert_eq!(second.main_card_id(), Some(a.id.clone()));

        second.delete_card(&a.id).await;
        assert!(first.cards().is_empty());
        assert_eq!(first.main_card_id(), None);
    }

    #[tokio::test]
    async fn test_other_context_sees_new_card() {
        let storage = MemoryStorage::new();
        let here = mount(&storage).await;
        let there = mount(&storage.sibling()).await;
        let mut changes = there.main_card_changes();

        let a = here.add_card(&form("4242424242424242", "A")).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), changes.wait_for(|m| m.is_some()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(there.main_card_id(), Some(a.id.clone()));
        assert_eq!(there.card(&a.id).map(|c| c.holder), Some("A".to_string()));
    }

    #[tokio::test]
    async fn test_stale_main_reference_is_replaced() {
        let storage = MemoryStorage::new();
        storage.seed(MAIN_CARD_KEY, "\"gone\"");
        let wallet = mount(&storage).await;
        assert_eq!(wallet.main_card(), None);

        let a = wallet.add_card(&form("4242424242424242", "A")).await.unwrap();

        assert_eq!(wallet.main_card_id(), Some(a.id));
    }

    #[tokio::test]
    async fn test_malformed_cards_fall_back_to_empty() {
        let storage = MemoryStorage::new();
        storage.seed(SAVED_CARDS_KEY, "[{\"id\": 1}]");
        storage.seed(MAIN_CARD_KEY, "42");
        let wallet = mount(&storage).await;

        assert!(wallet.cards().is_empty());
        assert_eq!(wallet.main_card_id(), None);
    }
}
