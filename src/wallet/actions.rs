use std::fmt;
use tracing::debug;

use super::cards::{MainCardChange, SavedCards};
use super::models::{Card, CardId};

/// An action waiting for the user to confirm it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Delete { card_id: CardId, last4: String },
    MakeMain { card_id: CardId, last4: String },
}

impl PendingAction {
    pub fn card_id(&self) -> &CardId {
        match self {
            PendingAction::Delete { card_id, .. } | PendingAction::MakeMain { card_id, .. } => {
                card_id
            }
        }
    }
}

impl fmt::Display for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingAction::Delete { last4, .. } => write!(f, "Remove the card ending in {last4}?"),
            PendingAction::MakeMain { last4, .. } => {
                write!(f, "Use the card ending in {last4} as your main card?")
            }
        }
    }
}

fn last4(card: &Card) -> String {
    card.number.last4().to_string()
}

impl SavedCards {
    /// Confirmation to show before deleting, or `None` if the card is unknown
    pub fn request_delete(&self, id: &CardId) -> Option<PendingAction> {
        let card = self.card(id)?;
        Some(PendingAction::Delete {
            last4: last4(&card),
            card_id: card.id,
        })
    }

    /// Confirmation to show before changing the main card, or `None` when
    /// there is nothing to confirm: unknown card or already the main card
    pub fn request_make_main(&self, id: &CardId) -> Option<PendingAction> {
        if self.is_main(id) {
            return None;
        }
        let card = self.card(id)?;
        Some(PendingAction::MakeMain {
            last4: last4(&card),
            card_id: card.id,
        })
    }

    /// Apply a confirmed action. Returns `false` if it no longer applies,
    /// e.g. the card was removed while the confirmation was open.
    pub async fn confirm(&self, action: &PendingAction) -> bool {
        match action {
            PendingAction::Delete { card_id, .. } => self.delete_card(card_id).await,
            PendingAction::MakeMain { card_id, .. } => match self.set_main_card(card_id).await {
                MainCardChange::Changed { .. } => true,
                change => {
                    debug!(card_id = %card_id, ?change, "Confirmed action no longer applies");
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::sync::Store;
    use crate::wallet::cards::WalletSettings;
    use crate::wallet::cards::tests::form;
    use std::sync::Arc;

    async fn wallet() -> SavedCards {
        let store = Store::open(Arc::new(MemoryStorage::new()));
        SavedCards::mount(&store, WalletSettings::default()).await
    }

    #[tokio::test]
    async fn test_make_main_on_main_card_needs_no_confirmation() {
        let wallet = wallet().await;
        let a = wallet.add_card(&form("4242424242424242", "A")).await.unwrap();
        let b = wallet.add_card(&form("5555555555554444", "B")).await.unwrap();

        assert_eq!(wallet.request_make_main(&a.id), None);

        let pending = wallet.request_make_main(&b.id).unwrap();
        assert_eq!(pending.to_string(), "Use the card ending in 4444 as your main card?");
        assert!(wallet.confirm(&pending).await);
        assert!(wallet.is_main(&b.id));
    }

    #[tokio::test]
    async fn test_unknown_card_needs_no_confirmation() {
        let wallet = wallet().await;
        let missing = CardId::new("missing");

        assert_eq!(wallet.request_delete(&missing), None);
        assert_eq!(wallet.request_make_main(&missing), None);
    }

    #[tokio::test]
    async fn test_confirm_delete() {
        let wallet = wallet().await;
        let a = wallet.add_card(&form("4242424242424242", "A")).await.unwrap();

        let pending = wallet.request_delete(&a.id).unwrap();
        assert_eq!(pending.card_id(), &a.id);
        assert_eq!(pending.to_string(), "Remove the card ending in 4242?");

        assert!(wallet.confirm(&pending).await);
        assert!(wallet.cards().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_against_removed_card_is_noop() {
        let wallet = wallet().await;
        let a = wallet.add_card(&form("4242424242424242", "A")).await.unwrap();
        let b = wallet.add_card(&form("5555555555554444", "B")).await.unwrap();

        let delete_b = wallet.request_delete(&b.id).unwrap();
        let make_b_main = wallet.request_make_main(&b.id).unwrap();
        wallet.delete_card(&b.id).await;

        assert!(!wallet.confirm(&delete_b).await);
        assert!(!wallet.confirm(&make_b_main).await);
        assert_eq!(wallet.main_card_id(), Some(a.id));
    }
}
