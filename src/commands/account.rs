use tracing::info;
use tvsurf::models::UserInfo;
use tvsurf::password::is_valid_username;

use crate::cli::{LoginArgs, PasswordArgs, UsersSubcommand};
use crate::commands::{read_password, Backend};
use crate::errors::{Error, Result};
use crate::state::{AppState, Session};

const ADMIN_GROUP: &str = "admin";
const USER_GROUP: &str = "user";

fn check_username(username: &str) -> Result<&str> {
    let username = username.trim();
    if is_valid_username(username) {
        Ok(username)
    } else {
        Err(Error::InvalidUsername(username.to_owned()))
    }
}

pub async fn login(state: &mut AppState, args: LoginArgs) -> Result<()> {
    let username = check_username(&args.username)?.to_owned();
    let password = read_password(args.password).await?;
    let client = state.client_for(args.server.clone());
    let token = tvsurf::user::login(&client, &username, &password).await?;
    state.save_session(Session {
        base_url: args.server,
        token: Some(token),
        username: Some(username.clone()),
    })?;
    info!("logged in to {}", client.base_url());
    println!("logged in as {username}");
    Ok(())
}

pub fn logout(state: &mut AppState) -> Result<()> {
    if state.clear_session()? {
        println!("logged out");
    } else {
        println!("not logged in");
    }
    Ok(())
}

pub async fn whoami(state: &AppState) -> Result<()> {
    let backend = Backend::open(state)?;
    let whoami = backend.whoami().await?;
    println!("{}", render_user(&whoami.user));
    if whoami.single_user_mode {
        println!("single user mode");
    }
    if backend.is_offline() {
        println!("offline");
    }
    Ok(())
}

pub async fn passwd(state: &AppState, args: PasswordArgs) -> Result<()> {
    let backend = Backend::open(state)?;
    let client = backend.online("changing the password")?;
    let username = match state.username() {
        Some(username) => username.to_owned(),
        None => tvsurf::user::whoami(client).await?.user.username,
    };
    let password = read_password(args).await?;
    tvsurf::user::set_my_password(client, &username, &password).await?;
    println!("password changed");
    Ok(())
}

pub async fn users(state: &AppState, command: UsersSubcommand) -> Result<()> {
    let backend = Backend::open(state)?;
    let client = backend.online("user administration")?;
    match command {
        UsersSubcommand::List => {
            let users = tvsurf::user::list(client).await?;
            if users.single_user_mode {
                println!("single user mode");
            }
            for user in &users.users {
                println!("{}", render_user(user));
            }
        }
        UsersSubcommand::Add {
            username,
            admin,
            password,
        } => {
            let username = check_username(&username)?.to_owned();
            let password = read_password(password).await?;
            let user = UserInfo {
                username,
                group: default_groups(admin),
            };
            tvsurf::user::add(client, &user, &password).await?;
            println!("added {}", render_user(&user));
        }
        UsersSubcommand::Remove { username } => {
            tvsurf::user::remove(client, &username).await?;
            println!("removed {username}");
        }
        UsersSubcommand::Groups { username, groups } => {
            tvsurf::user::update_group(client, &username, &groups).await?;
            println!("groups of {username}: {}", groups.join(", "));
        }
        UsersSubcommand::ResetPassword { username, password } => {
            let password = read_password(password).await?;
            tvsurf::user::set_password(client, &username, &password).await?;
            println!("password of {username} reset");
        }
    }
    Ok(())
}

fn default_groups(admin: bool) -> Vec<String> {
    let mut groups = vec![USER_GROUP.to_owned()];
    if admin {
        groups.push(ADMIN_GROUP.to_owned());
    }
    groups
}

fn render_user(user: &UserInfo) -> String {
    let role = if user.is_admin() { " (admin)" } else { "" };
    format!("{}{role}  [{}]", user.username, user.group.join(", "))
}
