pub mod actions;
pub mod assets;
pub mod cards;
pub mod models;

pub use actions::PendingAction;
pub use assets::card_asset_path;
pub use cards::{MAIN_CARD_KEY, MainCardChange, SAVED_CARDS_KEY, SavedCards, WalletSettings};
pub use models::{Card, CardForm, CardId, CardNetwork, MaskedNumber, Money};
