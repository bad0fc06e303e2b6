use thiserror::Error;

/// Failures of the key/value backing store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a submitted card form is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardFormError {
    #[error("Card holder name is required")]
    MissingHolder,

    #[error("Card number must contain only digits")]
    InvalidNumberCharacters,

    #[error("Card number must be between 12 and 19 digits")]
    InvalidNumberLength,

    #[error("Card number failed checksum")]
    InvalidChecksum,

    #[error("Expiry must be in MM/YY format")]
    InvalidExpiryFormat,

    #[error("Card has expired")]
    Expired,

    #[error("Security code must be {expected} digits")]
    InvalidSecurityCode { expected: usize },

    #[error("Card network could not be determined")]
    UnknownNetwork,
}

/// Errors surfaced by wallet operations. Storage failures are not among
/// them: those are logged and the in-memory state carries on.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    InvalidCard(#[from] CardFormError),
}
