use crate::cli::OfflineSubcommand;
use crate::errors::Result;
use crate::format;
use crate::offline::{ExitReport, OfflineStore};
use crate::state::AppState;

pub async fn offline(state: &AppState, command: OfflineSubcommand) -> Result<()> {
    let mut store = OfflineStore::open(state.data_dir());
    match command {
        OfflineSubcommand::Enter => {
            let client = state.client()?;
            store.enter(&client).await?;
            let snapshot = store.snapshot();
            println!(
                "offline with {} tvs and {} series",
                snapshot.tvs.len(),
                snapshot.series.len()
            );
        }
        OfflineSubcommand::Exit { force } => {
            let client = state.client()?;
            match store.exit(&client, force).await? {
                ExitReport::Synced(count) => println!("back online, synced {count} changes"),
                ExitReport::Discarded(count) => {
                    println!("back online, discarded {count} changes");
                }
            }
        }
        OfflineSubcommand::Status => print!("{}", render_status(&store)),
    }
    Ok(())
}

fn render_status(store: &OfflineStore) -> String {
    if !store.is_offline() {
        return "online\n".to_owned();
    }
    let synced = store
        .snapshot()
        .synced_at
        .map_or_else(|| "never".to_owned(), |at| format::last_update(&at));
    let mut out = format!(
        "offline since {synced}, {} pending changes\n",
        store.pending().len()
    );
    for operation in store.pending() {
        out.push_str(&format!("  {operation}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_when_online() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(render_status(&OfflineStore::open(dir.path())), "online\n");
    }
}
