use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::info;

use card_wallet::preferences::NotificationKind;
use card_wallet::wallet::Money;

use crate::app_state::AppState;

/// Print every change another process makes to this wallet until Ctrl-C
pub async fn watch(state: &AppState) -> Result<()> {
    let mut tasks = JoinSet::new();

    report(&mut tasks, state.cards.card_changes(), |cards| {
        let balance: Money = cards.iter().filter_map(|c| c.balance).sum();
        format!("Saved cards changed: {} card(s), balance {}", cards.len(), balance)
    });
    report(&mut tasks, state.cards.main_card_changes(), |main| match main {
        Some(id) => format!("Main card is now {}", id),
        None => "Main card cleared".to_string(),
    });
    report(&mut tasks, state.preferences.preferred_content_changes(), |content| {
        match content {
            Some(category) => format!("Preferred content is now {}", category),
            None => "Preferred content cleared".to_string(),
        }
    });
    for kind in NotificationKind::ALL {
        report(&mut tasks, state.preferences.notification_changes(kind), move |enabled| {
            format!("{}: {}", kind.label(), if *enabled { "on" } else { "off" })
        });
    }

    info!(
        context = %state.store.context(),
        database = %state.config.database_url,
        "Watching wallet for changes"
    );

    tokio::signal::ctrl_c().await?;
    tasks.abort_all();

    Ok(())
}

fn report<T, F>(tasks: &mut JoinSet<()>, mut changes: watch::Receiver<T>, describe: F)
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> String + Send + 'static,
{
    tasks.spawn(async move {
        while changes.changed().await.is_ok() {
            let line = describe(&*changes.borrow_and_update());
            println!("{}", line);
        }
    });
}
