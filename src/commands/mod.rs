//! Implementation of every `tvsurf` subcommand.

use tokio::io::{AsyncBufReadExt, BufReader};
use tvsurf::models::Source;

use crate::cli::{Cli, Command, PasswordArgs};
use crate::errors::{Error, Result};
use crate::state::AppState;

pub mod account;
pub mod backend;
pub mod cache;
pub mod config;
pub mod downloads;
pub mod library;
pub mod offline;
pub mod play;

pub use backend::Backend;

/// Run one parsed command line.
///
/// # Errors
/// Whatever the command failed with. Nothing is retried.
pub async fn run(cli: Cli) -> Result<()> {
    let mut state = AppState::load(cli.data_dir)?;
    match cli.command {
        Command::Login(args) => account::login(&mut state, args).await,
        Command::Logout => account::logout(&mut state),
        Command::Whoami => account::whoami(&state).await,
        Command::Passwd(args) => account::passwd(&state, args).await,
        Command::Users(command) => account::users(&state, command.command).await,
        Command::Tv(command) => library::tv(&state, command.command).await,
        Command::Search { keyword } => library::search(&state, &keyword).await,
        Command::Add(args) => library::add(&state, args).await,
        Command::Series(command) => library::series(&state, command.command).await,
        Command::Downloads(args) => downloads::downloads(&state, args.watch).await,
        Command::Monitor(args) => downloads::monitor(&state, args.watch).await,
        Command::Errors(command) => downloads::errors(&state, command.command).await,
        Command::Config(command) => config::config(&state, command.command).await,
        Command::Play(args) => play::play(&state, args).await,
        Command::Offline(command) => offline::offline(&state, command.command).await,
        Command::Cache(command) => cache::cache(&state, command.command).await,
    }
}

/// The password from the command line, or one line read from stdin.
pub(crate) async fn read_password(args: PasswordArgs) -> Result<String> {
    if let Some(password) = args.password {
        return Ok(password);
    }
    eprint!("password: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(Error::io("<stdin>"))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Search `keyword` and take result number `pick`.
pub(crate) async fn pick_source(
    client: &tvsurf::Client,
    keyword: &str,
    pick: usize,
) -> Result<Source> {
    let mut result = tvsurf::tv::search(client, keyword).await?;
    if pick >= result.source.len() {
        return Err(Error::NoSearchResult(pick));
    }
    Ok(result.source.swap_remove(pick))
}
