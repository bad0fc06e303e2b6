use anyhow::Result;

use card_wallet::preferences::{ContentCategory, NotificationKind};

use crate::app_state::AppState;

pub async fn show(state: &AppState) -> Result<()> {
    match state.preferences.preferred_content() {
        Some(category) => println!("Preferred content: {}", category),
        None => println!("Preferred content: none"),
    }

    println!("Email notifications:");
    for (kind, enabled) in state.preferences.notifications() {
        println!("  [{}] {}", if enabled { "x" } else { " " }, kind.label());
    }

    Ok(())
}

pub async fn content(state: &AppState, category: Option<ContentCategory>) -> Result<()> {
    state.preferences.set_preferred_content(category).await;
    match category {
        Some(category) => println!("Preferred content set to {}", category),
        None => println!("Preferred content cleared"),
    }
    Ok(())
}

pub async fn notify(state: &AppState, kind: NotificationKind, enabled: bool) -> Result<()> {
    state.preferences.set_notification(kind, enabled).await;
    println!("{}: {}", kind.label(), if enabled { "on" } else { "off" });
    Ok(())
}
