use clap::Args;
use std::time::Duration;

use crate::wallet::{Money, WalletSettings};

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// SQLite database holding the wallet's local storage
    #[arg(long, global = true, env = "DATABASE_URL", default_value = "sqlite://wallet.db")]
    pub database_url: String,

    /// Balance (in cents) every newly added card starts with
    #[arg(long, global = true, env = "STARTING_BALANCE_CENTS", default_value = "100000")]
    pub starting_balance_cents: i64,

    /// How often to check the database for changes made by other processes
    #[arg(long, global = true, env = "SYNC_POLL_MS", default_value = "500")]
    pub sync_poll_ms: u64,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_ms.max(10))
    }

    pub fn wallet_settings(&self) -> WalletSettings {
        WalletSettings {
            starting_balance: Money::from_cents(self.starting_balance_cents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_defaults() {
        let config = Harness::parse_from(["card-wallet"]).config;

        assert_eq!(config.wallet_settings(), WalletSettings::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let config = Harness::parse_from(["card-wallet", "--sync-poll-ms", "0"]).config;

        assert_eq!(config.poll_interval(), Duration::from_millis(10));
    }
}
