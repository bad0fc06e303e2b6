//! Saved payment cards, a main-card designation and account preferences,
//! persisted in a local key/value store and kept in sync across every open
//! context (process, window) that shares it.

pub mod config;
pub mod error;
pub mod preferences;
pub mod storage;
pub mod sync;
pub mod validation;
pub mod wallet;

pub use error::{CardFormError, StorageError, WalletError};
