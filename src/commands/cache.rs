use tracing::warn;
use tvsurf::models::TvDetails;

use crate::cli::CacheSubcommand;
use crate::commands::Backend;
use crate::errors::{Error, Result};
use crate::format;
use crate::state::AppState;
use crate::video_cache::{CachedEpisode, EpisodeDownload, VideoCache};

pub fn open_cache(state: &AppState) -> VideoCache {
    VideoCache::open(
        state.data_dir(),
        state.http.clone(),
        state.token().map(ToOwned::to_owned),
    )
}

pub async fn cache(state: &AppState, command: CacheSubcommand) -> Result<()> {
    let cache = open_cache(state);
    match command {
        CacheSubcommand::Download { id, episodes } => {
            let backend = Backend::open(state)?;
            let details = backend.tv_details(id).await?;
            let requested = downloads_for(&details, &episodes)?;
            let mut failure = None;
            for result in cache.download_all(&requested).await {
                match result {
                    Ok(entry) => println!("{}", render_entry(&entry)),
                    Err(err) => {
                        warn!("failed to cache an episode of tv {id}: {err}");
                        if failure.is_none() {
                            failure = Some(err);
                        }
                    }
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }
        }
        CacheSubcommand::List => {
            let entries = cache.list()?;
            for entry in &entries {
                println!("{}", render_entry(entry));
            }
            #[allow(clippy::cast_precision_loss)]
            let total = cache.total_size()? as f64;
            println!("{} episodes, {}", entries.len(), format::bytes(total));
        }
        CacheSubcommand::Remove { id, episode } => {
            let removed = match episode {
                Some(episode) => usize::from(cache.remove(id, episode)?),
                None => cache.remove_tv(id)?,
            };
            println!("removed {removed} episodes");
        }
        CacheSubcommand::Clear { watched } => {
            let removed = if watched {
                let tvs = Backend::open(state)?.tv_infos(None).await?;
                cache.clear_watched(&tvs)?
            } else {
                cache.clear()?
            };
            println!("removed {removed} episodes");
        }
    }
    Ok(())
}

/// Requested episodes, or every episode the server has a file for.
fn downloads_for(details: &TvDetails, episodes: &[i64]) -> Result<Vec<EpisodeDownload>> {
    let tv_id = details.tv.id;
    let indices: Vec<i64> = if episodes.is_empty() {
        (0..details.episodes.len())
            .filter(|i| details.episode_url(*i).is_some())
            .filter_map(|i| i64::try_from(i).ok())
            .collect()
    } else {
        episodes.to_vec()
    };
    indices
        .into_iter()
        .map(|episode_id| {
            let url = usize::try_from(episode_id)
                .ok()
                .and_then(|i| details.episode_url(i))
                .ok_or(Error::EpisodeNotDownloaded { tv_id, episode_id })?;
            Ok(EpisodeDownload {
                tv_id,
                episode_id,
                url: url.to_owned(),
            })
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn render_entry(entry: &CachedEpisode) -> String {
    format!(
        "tv {:>5}  episode {:>3}  {}  {}",
        entry.tv_id,
        entry.episode_id,
        format::bytes(entry.size as f64),
        entry.path.display()
    )
}
