use futures::StreamExt;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tvsurf::models::{DownloadProgressWithName, ErrorRecord, ErrorType, Monitor};

use crate::cli::ErrorsSubcommand;
use crate::commands::Backend;
use crate::errors::Result;
use crate::format;
use crate::jobs::poller;
use crate::library;
use crate::state::AppState;

pub async fn downloads(state: &AppState, watch: bool) -> Result<()> {
    let backend = Backend::open(state)?;
    let client = backend.online("download progress")?;
    if !watch {
        let progress = tvsurf::download::progress(client).await?;
        print!("{}", render_downloads(&progress));
        return Ok(());
    }
    let cancel = CancellationToken::new();
    let (handle, receiver) = poller::start_download_progress(client.clone(), cancel.clone());
    follow(handle, receiver, cancel, |progress| {
        print!("{}", render_downloads(&progress));
        println!();
    })
    .await;
    Ok(())
}

pub async fn monitor(state: &AppState, watch: bool) -> Result<()> {
    let backend = Backend::open(state)?;
    let client = backend.online("the monitor")?;
    if !watch {
        println!("{}", render_monitor(tvsurf::download::monitor(client).await?));
        return Ok(());
    }
    let cancel = CancellationToken::new();
    let (handle, receiver) = poller::start_monitor(client.clone(), cancel.clone());
    follow(handle, receiver, cancel, |monitor| {
        println!("{}", render_monitor(monitor));
    })
    .await;
    Ok(())
}

/// Print broadcast snapshots until ctrl-c, then stop the poller.
async fn follow<T: Clone + Send + 'static>(
    handle: JoinHandle<()>,
    receiver: Receiver<T>,
    cancel: CancellationToken,
    mut print: impl FnMut(T),
) {
    let mut updates = BroadcastStream::new(receiver);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        tokio::select! {
            biased;
            _ = &mut interrupted => break,
            update = updates.next() => match update {
                Some(Ok(snapshot)) => print(snapshot),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!("skipped {skipped} updates");
                }
                None => break,
            },
        }
    }
    cancel.cancel();
    if let Err(err) = handle.await {
        warn!("poller task failed: {err}");
    }
}

pub async fn errors(state: &AppState, command: ErrorsSubcommand) -> Result<()> {
    let backend = Backend::open(state)?;
    let client = backend.online("the error log")?;
    match command {
        ErrorsSubcommand::List => {
            let errors = tvsurf::errors::list(client).await?;
            for error in library::sorted_errors(&errors) {
                print!("{}", render_error(error));
            }
        }
        ErrorsSubcommand::Remove { ids } => {
            tvsurf::errors::remove(client, &ids).await?;
            println!("removed {} entries", ids.len());
        }
        ErrorsSubcommand::Clear => {
            let ids: Vec<i64> = tvsurf::errors::list(client)
                .await?
                .iter()
                .map(|e| e.id)
                .collect();
            if !ids.is_empty() {
                tvsurf::errors::remove(client, &ids).await?;
            }
            println!("removed {} entries", ids.len());
        }
    }
    Ok(())
}

fn render_downloads(progress: &[DownloadProgressWithName]) -> String {
    if progress.is_empty() {
        return "no active downloads\n".to_owned();
    }
    progress
        .iter()
        .map(|item| {
            let p = &item.progress;
            if p.downloading {
                format!(
                    "{}  {:.1}%  {} / {}  {}  eta {}\n",
                    item.name,
                    format::percent(p),
                    format::bytes(p.downloaded_size),
                    format::bytes(p.total_size),
                    format::speed(p.speed),
                    format::eta(p)
                )
            } else {
                format!("{}  {}\n", item.name, p.status)
            }
        })
        .collect()
}

fn render_monitor(monitor: Monitor) -> String {
    format!(
        "downloads: {}  errors: {}",
        monitor.download_count, monitor.error_count
    )
}

fn render_error(error: &ErrorRecord) -> String {
    let kind = match error.kind {
        ErrorType::Error => "error",
        ErrorType::Critical => "CRITICAL",
    };
    format!(
        "{:>5}  {}  {kind}  {}\n       {}\n",
        error.id,
        format::last_update(&error.timestamp),
        error.title,
        error.description
    )
}

#[cfg(test)]
mod tests {
    use tvsurf::models::DownloadProgress;

    use super::*;

    fn item(name: &str, downloading: bool) -> DownloadProgressWithName {
        DownloadProgressWithName {
            name: name.to_owned(),
            progress: DownloadProgress {
                status: "queued".to_owned(),
                downloading,
                total_size: 2048.0,
                downloaded_size: 1024.0,
                speed: 512.0,
            },
        }
    }

    #[test]
    fn test_render_downloads() {
        assert_eq!(render_downloads(&[]), "no active downloads\n");
        assert_eq!(
            render_downloads(&[item("ep 1", true), item("ep 2", false)]),
            "ep 1  50.0%  1.00 KB / 2.00 KB  512.0 B/s  eta 2s\nep 2  queued\n"
        );
    }

    #[test]
    fn test_render_monitor() {
        let monitor = Monitor {
            download_count: 2,
            error_count: 1,
        };
        assert_eq!(render_monitor(monitor), "downloads: 2  errors: 1");
    }
}
