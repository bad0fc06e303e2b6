use clap::{Parser, Subcommand, ValueEnum};

use card_wallet::config::Config;
use card_wallet::preferences::{ContentCategory, NotificationKind};
use card_wallet::wallet::CardNetwork;

#[derive(Parser, Debug)]
#[command(name = "card-wallet")]
#[command(about = "Saved payment cards and account preferences kept in a local wallet file")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage saved cards
    Cards {
        #[command(subcommand)]
        action: CardsCommand,
    },
    /// Show the wallet balance
    Balance,
    /// Manage content and notification preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsCommand,
    },
    /// Print changes made to the wallet by other processes until interrupted
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum CardsCommand {
    /// List saved cards
    List,
    /// Save a new card
    Add {
        #[arg(long)]
        holder: String,
        #[arg(long)]
        number: String,
        /// MM/YY
        #[arg(long)]
        expiry: String,
        #[arg(long)]
        cvc: String,
        /// Detected from the number when omitted
        #[arg(long, value_enum)]
        network: Option<CardNetwork>,
    },
    /// Remove a saved card
    Remove {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Make a saved card the main card
    SetMain {
        id: String,
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Show all preferences
    Show,
    /// Set the preferred content category; omit to clear it
    Content {
        #[arg(value_enum)]
        category: Option<ContentCategory>,
    },
    /// Switch an email notification on or off
    Notify {
        #[arg(value_enum)]
        kind: NotificationKind,
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}
