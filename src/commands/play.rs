use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::PlayArgs;
use crate::commands::cache::open_cache;
use crate::commands::Backend;
use crate::errors::{Error, Result};
use crate::format;
use crate::playback::{Ended, PlaybackSession, ProgressSink};
use crate::state::AppState;

/// One line of player input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    Time(f64),
    Pause,
    Play,
    Seek(f64),
    Select(usize),
    Ended,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown player event {0:?}, expected time <s>, pause, play, seek <s>, select <n>, ended or quit")]
pub struct UnknownEvent(String);

impl FromStr for PlayerEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownEvent(s.trim().to_owned());
        let mut words = s.split_whitespace();
        let command = words.next().ok_or_else(unknown)?;
        let argument = words.next();
        if words.next().is_some() {
            return Err(unknown());
        }
        let seconds = || {
            argument
                .and_then(|a| a.parse::<f64>().ok())
                .filter(|t| t.is_finite() && *t >= 0.0)
                .ok_or_else(unknown)
        };
        let event = match (command.to_ascii_lowercase().as_str(), argument) {
            ("time", Some(_)) => PlayerEvent::Time(seconds()?),
            ("seek", Some(_)) => PlayerEvent::Seek(seconds()?),
            ("select", Some(index)) => PlayerEvent::Select(index.parse().map_err(|_| unknown())?),
            ("pause", None) => PlayerEvent::Pause,
            ("play", None) => PlayerEvent::Play,
            ("ended", None) => PlayerEvent::Ended,
            ("quit", None) => PlayerEvent::Quit,
            _ => return Err(unknown()),
        };
        Ok(event)
    }
}

pub async fn play(state: &AppState, args: PlayArgs) -> Result<()> {
    let mut backend = Backend::open(state)?;
    let details = backend.tv_details(args.id).await?;
    let cached: Vec<_> = open_cache(state)
        .list()?
        .into_iter()
        .filter(|entry| entry.tv_id == args.id)
        .collect();

    let mut session = PlaybackSession::open(&details, &mut backend);
    for entry in cached {
        if let Ok(episode) = usize::try_from(entry.episode_id) {
            session.set_url(episode, entry.path.display().to_string());
        }
    }
    if let Some(episode) = args.episode {
        if !session.select_episode(episode).await {
            return Err(Error::EpisodeNotDownloaded {
                tv_id: args.id,
                episode_id: i64::try_from(episode).unwrap_or(i64::MAX),
            });
        }
    }
    if session.is_finished() {
        println!("{} is finished", details.info.name);
        return Ok(());
    }
    announce(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(Error::io("<stdin>"))? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse() {
            Ok(event) => {
                if !handle(&mut session, event).await {
                    break;
                }
            }
            Err(err) => eprintln!("{err}"),
        }
    }
    Ok(())
}

/// Apply one event. Returns `false` once playback is over.
async fn handle<S: ProgressSink>(session: &mut PlaybackSession<S>, event: PlayerEvent) -> bool {
    match event {
        PlayerEvent::Time(time) => {
            session.time_update(time).await;
        }
        PlayerEvent::Pause => session.pause().await,
        PlayerEvent::Play => {}
        PlayerEvent::Seek(time) => session.seeked(time).await,
        PlayerEvent::Select(episode) => {
            if session.select_episode(episode).await {
                announce(session);
            } else {
                println!("episode {episode} is not downloaded yet");
            }
        }
        PlayerEvent::Ended => match session.ended().await {
            Ended::Next {
                episode,
                url: Some(_),
            } => {
                println!("episode {episode} is next");
                announce(session);
            }
            Ended::Next { episode, url: None } => {
                println!("episode {episode} is not downloaded yet");
            }
            Ended::Finished => {
                println!("finished");
                return false;
            }
        },
        PlayerEvent::Quit => {
            session.pause().await;
            return false;
        }
    }
    true
}

fn announce<S>(session: &PlaybackSession<S>)
where
    S: ProgressSink,
{
    match session.url() {
        Some(url) => println!(
            "playing episode {} from {}: {url}",
            session.episode(),
            format::playback_time(session.position())
        ),
        None => println!("episode {} is not downloaded yet", session.episode()),
    }
}
