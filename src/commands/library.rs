use tvsurf::models::{Tag, TvDetails, TvInfo};
use tvsurf::tv::{NewTv, SearchResult};

use crate::cli::{AddArgs, SeriesSubcommand, TvSubcommand};
use crate::commands::{pick_source, Backend};
use crate::errors::{Error, Result};
use crate::format;
use crate::library::{self, SeriesEditor};
use crate::state::AppState;

pub async fn tv(state: &AppState, command: TvSubcommand) -> Result<()> {
    let mut backend = Backend::open(state)?;
    match command {
        TvSubcommand::List { tag } => {
            let tvs = backend.tv_infos(None).await?;
            print!("{}", render_tv_list(&tvs, tag));
        }
        TvSubcommand::Show { id } => {
            let details = backend.tv_details(id).await?;
            print!("{}", render_tv_details(&details));
        }
        TvSubcommand::Tag { id, tag } => {
            backend.set_tag(id, tag).await?;
            println!("tv {id} tagged {}", tag.label());
        }
        TvSubcommand::Track { id, tracking } => {
            backend.set_tracking(id, tracking).await?;
            let label = if tracking { "on" } else { "off" };
            println!("tracking of tv {id} turned {label}");
        }
        TvSubcommand::Remove { id } => {
            tvsurf::tv::remove(backend.online("removing tvs")?, id).await?;
            println!("removed tv {id}");
        }
        TvSubcommand::Schedule { id, episodes } => {
            let client = backend.online("scheduling downloads")?;
            tvsurf::tv::schedule_episode_download(client, id, &episodes).await?;
            println!("scheduled {} episodes of tv {id}", episodes.len());
        }
        TvSubcommand::Progress { id, episode, time } => {
            backend.set_watch_progress(id, episode, time).await?;
            println!(
                "tv {id} at episode {episode}, {}",
                format::playback_time(time)
            );
        }
        TvSubcommand::SetSource { id, keyword, pick } => {
            let client = backend.online("changing sources")?;
            let source = pick_source(client, &keyword, pick).await?;
            tvsurf::tv::update_source(client, id, &source).await?;
            println!("tv {id} now follows {}", source.source.source_name);
        }
        TvSubcommand::SetEpisodeSource {
            id,
            episode,
            keyword,
            pick,
            source_episode,
        } => {
            let client = backend.online("changing sources")?;
            let source = pick_source(client, &keyword, pick).await?;
            let index = match source_episode {
                Some(index) => index,
                None => usize::try_from(episode).map_err(|_| Error::EpisodeNotFound {
                    tv_id: id,
                    episode_id: episode,
                })?,
            };
            let picked = source.episodes.get(index).ok_or(Error::EpisodeNotFound {
                tv_id: id,
                episode_id: episode,
            })?;
            tvsurf::tv::update_episode_source(client, id, episode, &picked.source).await?;
            println!("episode {episode} of tv {id} now follows {}", picked.name);
        }
    }
    Ok(())
}

pub async fn search(state: &AppState, keyword: &str) -> Result<()> {
    let backend = Backend::open(state)?;
    let result = tvsurf::tv::search(backend.online("search")?, keyword).await?;
    print!("{}", render_search(&result));
    Ok(())
}

pub async fn add(state: &AppState, args: AddArgs) -> Result<()> {
    let backend = Backend::open(state)?;
    let client = backend.online("adding tvs")?;
    let source = pick_source(client, &args.keyword, args.pick).await?;
    let tv = NewTv {
        name: source.name.clone(),
        source,
        tracking: !args.no_track,
        series: args.series,
    };
    let id = tvsurf::tv::add(client, &tv).await?;
    println!("added {} as tv {id}", tv.name);
    Ok(())
}

pub async fn series(state: &AppState, command: SeriesSubcommand) -> Result<()> {
    let mut backend = Backend::open(state)?;
    match command {
        SeriesSubcommand::List => {
            let series = backend.series(None).await?;
            let tvs = backend.tv_infos(None).await?;
            for overview in library::series_overview(&series, &tvs) {
                let activity = overview
                    .latest_activity
                    .map_or_else(|| "never".to_owned(), |at| format::last_update(&at));
                println!(
                    "{:>5}  {}  {} tvs  {activity}",
                    overview.series.id,
                    overview.series.name,
                    overview.tvs.len()
                );
            }
        }
        SeriesSubcommand::Show { id } => {
            let series = backend.single_series(id).await?;
            let tvs = backend.tv_infos(Some(&series.tvs)).await?;
            println!("{} ({} tvs)", series.name, series.tvs.len());
            for (position, tv_id) in series.tvs.iter().enumerate() {
                let name = tvs
                    .iter()
                    .find(|tv| tv.id == *tv_id)
                    .map_or("?", |tv| tv.name.as_str());
                println!("{:>3}. {:>5}  {name}", position + 1, tv_id);
            }
        }
        SeriesSubcommand::Create { name } => {
            let id = backend.add_series(&name).await?;
            println!("created series {name} with id {id}");
        }
        SeriesSubcommand::Remove { id } => {
            backend.remove_series(id).await?;
            println!("removed series {id}");
        }
        SeriesSubcommand::AddTv { id, tv_id } => {
            edit_series(&mut backend, id, |editor| editor.add(tv_id)).await?;
        }
        SeriesSubcommand::RemoveTv { id, tv_id } => {
            edit_series(&mut backend, id, |editor| editor.remove(tv_id)).await?;
        }
        SeriesSubcommand::Move {
            id,
            tv_id,
            direction,
        } => {
            edit_series(&mut backend, id, |editor| {
                editor.apply(tv_id, direction.into())
            })
            .await?;
        }
    }
    Ok(())
}

async fn edit_series(
    backend: &mut Backend,
    id: i64,
    edit: impl FnOnce(&mut SeriesEditor) -> bool,
) -> Result<()> {
    let series = backend.single_series(id).await?;
    let mut editor = SeriesEditor::new(series.tvs);
    if !edit(&mut editor) {
        println!("series {id} unchanged");
        return Ok(());
    }
    backend.update_series_tvs(id, editor.tvs()).await?;
    let order: Vec<String> = editor.tvs().iter().map(ToString::to_string).collect();
    println!("series {id}: {}", order.join(", "));
    Ok(())
}

fn render_tv_list(tvs: &[TvInfo], only: Option<Tag>) -> String {
    let mut out = String::new();
    for (tag, group) in library::group_by_tag(tvs) {
        if only.is_some_and(|only| only != tag) {
            continue;
        }
        out.push_str(&format!("{} ({})\n", tag.label(), group.len()));
        for tv in group {
            let badge = library::unwatched_badge(tv)
                .map(|count| format!("  [{count} new]"))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {:>5}  {}{badge}  {}\n",
                tv.id,
                tv.name,
                format::last_update(&tv.latest_activity())
            ));
        }
    }
    out
}

fn render_tv_details(details: &TvDetails) -> String {
    let info = &details.info;
    let progress = info.user_data.watch_progress;
    let mut out = format!(
        "{} (tv {})\ntag: {}\ntracking: {}\nprogress: episode {} at {}\nsource: {} / {}\n",
        info.name,
        info.id,
        info.user_data.tag.label(),
        if details.tv.track.tracking { "on" } else { "off" },
        progress.episode_id,
        format::playback_time(progress.time),
        details.tv.source.source.source_name,
        details.tv.source.source.channel_name,
    );
    for episode in library::episode_states(details) {
        let watched = if episode.watched { "x" } else { " " };
        out.push_str(&format!(
            "  [{watched}] {:>3}  {}  ({})\n",
            episode.index,
            episode.name,
            episode.storage.label()
        ));
    }
    out
}

fn render_search(result: &SearchResult) -> String {
    let mut out = String::new();
    for (index, source) in result.source.iter().enumerate() {
        out.push_str(&format!(
            "{index:>3}  {}  {} / {}  {} episodes\n",
            source.name,
            source.source.source_name,
            source.source.channel_name,
            source.episodes.len()
        ));
    }
    for error in &result.search_error {
        out.push_str(&format!("  ! {}: {}\n", error.source_name, error.error));
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tv(id: i64, name: &str, tag: &str, episode_id: i64) -> TvInfo {
        serde_json::from_value(json!({
            "id": id, "name": name, "cover_url": "", "series": [],
            "last_update": "0001-01-01T00:00:00", "total_episodes": 4,
            "user_data": {
                "tv_id": id, "tag": tag,
                "watch_progress": {"episode_id": episode_id, "time": 0},
                "last_update": "0001-01-01T00:00:00"
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_render_tv_list() {
        let tvs = [
            tv(1, "Frieren", "watched", 4),
            tv(2, "Mushishi", "watching", 1),
        ];
        assert_eq!(
            render_tv_list(&tvs, None),
            "Watching (1)\n      2  Mushishi  [3 new]  never\nWatched (1)\n      1  Frieren  never\n"
        );
        assert_eq!(
            render_tv_list(&tvs, Some(Tag::Watched)),
            "Watched (1)\n      1  Frieren  never\n"
        );
        assert_eq!(render_tv_list(&tvs, Some(Tag::Wanted)), "");
    }

    #[test]
    fn test_render_search() {
        let result: SearchResult = serde_json::from_value(json!({
            "source": [{
                "source": {"source_key": "a", "source_name": "Alpha", "channel_name": "main", "url": "u"},
                "name": "Frieren", "cover_url": "", "episodes": []
            }],
            "search_error": [{"source_name": "Beta", "source_key": "b", "error": "timeout"}]
        }))
        .unwrap();
        assert_eq!(
            render_search(&result),
            "  0  Frieren  Alpha / main  0 episodes\n  ! Beta: timeout\n"
        );
    }
}
