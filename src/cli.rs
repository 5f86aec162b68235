use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tvsurf::models::Tag;
use url::Url;

use crate::library::Move;

#[derive(Parser, Debug)]
#[command(name = "tvsurf", version, about = "Command line client for a tvsurf server")]
pub struct Cli {
    /// Directory holding the session, offline snapshot and video cache.
    #[arg(long, global = true, env = "TVSURF_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and remember the session.
    Login(LoginArgs),
    /// Forget the saved session.
    Logout,
    Whoami,
    /// Change the password of the logged in user.
    Passwd(PasswordArgs),
    Tv(TvCommand),
    /// Search every source for a keyword.
    Search { keyword: String },
    /// Add a search result to the library.
    Add(AddArgs),
    Series(SeriesCommand),
    /// Show backend download progress.
    Downloads(WatchArgs),
    /// Show the running download and error counters.
    Monitor(WatchArgs),
    Errors(ErrorsCommand),
    Config(ConfigCommand),
    Users(UsersCommand),
    /// Play a TV, reading player events from stdin.
    Play(PlayArgs),
    Offline(OfflineCommand),
    Cache(CacheCommand),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long, env = "TVSURF_BASE_URL")]
    pub server: Url,
    #[arg(long, short)]
    pub username: String,
    #[command(flatten)]
    pub password: PasswordArgs,
}

#[derive(Args, Debug)]
pub struct PasswordArgs {
    /// Read from stdin when omitted.
    #[arg(long, env = "TVSURF_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Keep polling until interrupted.
    #[arg(long, short)]
    pub watch: bool,
}

#[derive(Args, Debug)]
pub struct TvCommand {
    #[command(subcommand)]
    pub command: TvSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum TvSubcommand {
    /// List the library grouped by tag.
    List {
        #[arg(long, value_parser = parse_tag)]
        tag: Option<Tag>,
    },
    /// Show a TV with its episodes.
    Show { id: i64 },
    Tag {
        id: i64,
        #[arg(value_parser = parse_tag)]
        tag: Tag,
    },
    /// Turn tracking of new episodes on or off.
    Track {
        id: i64,
        #[arg(action = clap::ArgAction::Set)]
        tracking: bool,
    },
    Remove { id: i64 },
    /// Schedule episodes for download again.
    Schedule {
        id: i64,
        #[arg(required = true)]
        episodes: Vec<i64>,
    },
    /// Set the watch progress.
    Progress {
        id: i64,
        episode: i64,
        #[arg(default_value_t = 0.0)]
        time: f64,
    },
    /// Replace the source of a TV with a search result.
    SetSource {
        id: i64,
        keyword: String,
        /// Index of the search result.
        pick: usize,
    },
    /// Replace the source of one episode with an episode of a search result.
    SetEpisodeSource {
        id: i64,
        episode: i64,
        keyword: String,
        /// Index of the search result.
        pick: usize,
        /// Episode of the picked result, defaults to `episode`.
        #[arg(long)]
        source_episode: Option<usize>,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub keyword: String,
    /// Index of the search result.
    pub pick: usize,
    /// Do not track new episodes.
    #[arg(long)]
    pub no_track: bool,
    /// Series to add the TV to.
    #[arg(long = "series")]
    pub series: Vec<i64>,
}

#[derive(Args, Debug)]
pub struct SeriesCommand {
    #[command(subcommand)]
    pub command: SeriesSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum SeriesSubcommand {
    List,
    Show { id: i64 },
    Create { name: String },
    Remove { id: i64 },
    AddTv { id: i64, tv_id: i64 },
    RemoveTv { id: i64, tv_id: i64 },
    /// Reorder a TV inside a series.
    Move {
        id: i64,
        tv_id: i64,
        #[arg(value_enum)]
        direction: Direction,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Forward,
    Backward,
    First,
    Last,
}

impl From<Direction> for Move {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => Move::Forward,
            Direction::Backward => Move::Backward,
            Direction::First => Move::First,
            Direction::Last => Move::Last,
        }
    }
}

#[derive(Args, Debug)]
pub struct ErrorsCommand {
    #[command(subcommand)]
    pub command: ErrorsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ErrorsSubcommand {
    List,
    Remove {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Remove every entry of the error log.
    Clear,
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    Show,
    /// Set `section.field`, e.g. `download.chunk_size 1MB`.
    Set { key: String, value: String },
}

#[derive(Args, Debug)]
pub struct UsersCommand {
    #[command(subcommand)]
    pub command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum UsersSubcommand {
    List,
    Add {
        username: String,
        #[arg(long)]
        admin: bool,
        #[command(flatten)]
        password: PasswordArgs,
    },
    Remove {
        username: String,
    },
    /// Replace the groups of a user.
    Groups {
        username: String,
        groups: Vec<String>,
    },
    ResetPassword {
        username: String,
        #[command(flatten)]
        password: PasswordArgs,
    },
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    pub id: i64,
    /// Start at this episode instead of the stored progress.
    #[arg(long)]
    pub episode: Option<usize>,
}

#[derive(Args, Debug)]
pub struct OfflineCommand {
    #[command(subcommand)]
    pub command: OfflineSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum OfflineSubcommand {
    /// Download a snapshot and work without the server.
    Enter,
    /// Upload queued changes and go back online.
    Exit {
        /// Leave offline mode even if changes could not be uploaded.
        #[arg(long)]
        force: bool,
    },
    Status,
}

#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// Download episodes for local playback, all downloaded ones by default.
    Download { id: i64, episodes: Vec<i64> },
    List,
    Remove {
        id: i64,
        episode: Option<i64>,
    },
    Clear {
        /// Only remove episodes before the current watch progress.
        #[arg(long)]
        watched: bool,
    },
}

fn parse_tag(value: &str) -> Result<Tag, String> {
    value.parse().map_err(|err: tvsurf::models::UnknownTag| err.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_nested_commands() {
        let cli = Cli::parse_from(["tvsurf", "tv", "tag", "3", "on-hold"]);
        assert!(matches!(
            cli.command,
            Command::Tv(TvCommand {
                command: TvSubcommand::Tag {
                    id: 3,
                    tag: Tag::OnHold
                }
            })
        ));

        let cli = Cli::parse_from(["tvsurf", "--data-dir", "/tmp/x", "series", "move", "1", "2", "first"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(
            cli.command,
            Command::Series(SeriesCommand {
                command: SeriesSubcommand::Move {
                    direction: Direction::First,
                    ..
                }
            })
        ));

        let cli = Cli::parse_from(["tvsurf", "tv", "track", "3", "false"]);
        assert!(matches!(
            cli.command,
            Command::Tv(TvCommand {
                command: TvSubcommand::Track {
                    tracking: false,
                    ..
                }
            })
        ));
    }

    #[test]
    fn test_rejects_unknown_tag() {
        assert!(Cli::try_parse_from(["tvsurf", "tv", "tag", "3", "bogus"]).is_err());
    }
}
