mod app_state;
mod cli;
mod commands;

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app_state::AppState;
use cli::{CardsCommand, Cli, Command, PrefsCommand};
use commands::{cards, preferences, watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "card_wallet=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(cli.config);

    let state = AppState::open(config).await?;

    match cli.command {
        Command::Cards { action } => match action {
            CardsCommand::List => cards::list(&state).await?,
            CardsCommand::Add {
                holder,
                number,
                expiry,
                cvc,
                network,
            } => cards::add(&state, holder, number, expiry, cvc, network).await?,
            CardsCommand::Remove { id, yes } => cards::remove(&state, &id, yes).await?,
            CardsCommand::SetMain { id, yes } => cards::set_main(&state, &id, yes).await?,
        },
        Command::Balance => cards::balance(&state).await?,
        Command::Prefs { action } => match action {
            PrefsCommand::Show => preferences::show(&state).await?,
            PrefsCommand::Content { category } => preferences::content(&state, category).await?,
            PrefsCommand::Notify { kind, state: toggle } => {
                preferences::notify(&state, kind, toggle.enabled()).await?
            }
        },
        Command::Watch => watch::watch(&state).await?,
    }

    Ok(())
}
