use anyhow::{Result, bail};

use card_wallet::wallet::{CardForm, CardId, CardNetwork, card_asset_path};

use super::confirm;
use crate::app_state::AppState;

pub async fn list(state: &AppState) -> Result<()> {
    let cards = state.cards.cards();
    if cards.is_empty() {
        println!("No saved cards");
        return Ok(());
    }

    for card in cards {
        let marker = if state.cards.is_main(&card.id) { "*" } else { " " };
        let balance = card
            .balance
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {}  {:<16} {}  {}  exp {}  balance {}  [{}]",
            marker,
            card.id,
            card.network,
            card.number,
            card.holder,
            card.expiry,
            balance,
            card_asset_path(card.network),
        );
    }

    Ok(())
}

pub async fn add(
    state: &AppState,
    holder: String,
    number: String,
    expiry: String,
    cvc: String,
    network: Option<CardNetwork>,
) -> Result<()> {
    let form = CardForm {
        network,
        number,
        holder,
        expiry,
        cvc,
    };

    let card = state.cards.add_card(&form).await?;
    println!("Saved {} {} as {}", card.network, card.number, card.id);
    if state.cards.is_main(&card.id) {
        println!("This is now your main card");
    }

    Ok(())
}

pub async fn remove(state: &AppState, id: &str, yes: bool) -> Result<()> {
    let id = CardId::new(id);
    let Some(pending) = state.cards.request_delete(&id) else {
        bail!("No saved card with id {}", id);
    };

    if !yes && !confirm(&pending.to_string()).await? {
        println!("Cancelled");
        return Ok(());
    }

    if state.cards.confirm(&pending).await {
        println!("Removed card {}", id);
    }

    Ok(())
}

pub async fn set_main(state: &AppState, id: &str, yes: bool) -> Result<()> {
    let id = CardId::new(id);
    if !state.cards.contains(&id) {
        bail!("No saved card with id {}", id);
    }

    let Some(pending) = state.cards.request_make_main(&id) else {
        println!("Card {} is already your main card", id);
        return Ok(());
    };

    if !yes && !confirm(&pending.to_string()).await? {
        println!("Cancelled");
        return Ok(());
    }

    if state.cards.confirm(&pending).await {
        println!("Card {} is now your main card", id);
    }

    Ok(())
}

pub async fn balance(state: &AppState) -> Result<()> {
    println!("Wallet balance: {}", state.cards.balance());

    match (state.cards.main_card(), state.cards.main_card_balance()) {
        (Some(card), Some(balance)) => println!("Main card {}: {}", card.number, balance),
        (Some(card), None) => println!("Main card {}: no balance", card.number),
        _ => println!("No main card"),
    }

    Ok(())
}
