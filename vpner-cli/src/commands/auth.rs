//! Session commands

use super::{prompt, CommandContext};
use crate::error::CliError;
use tracing::info;

pub async fn login(
    ctx: &CommandContext,
    username: Option<String>,
    password: Option<String>,
) -> Result<(), CliError> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ").await?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ").await?,
    };
    if username.is_empty() {
        return Err(CliError::Command("Username must not be empty".to_string()));
    }

    let user = ctx.session.login(&username, &password).await?;
    info!("Logged in to {}", ctx.api.base_url());
    println!("Logged in as {}", user.username);
    Ok(())
}

pub fn logout(ctx: &CommandContext) -> Result<(), CliError> {
    ctx.session.logout()?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(ctx: &CommandContext) -> Result<(), CliError> {
    match ctx.session.check_auth().await {
        Some(user) => {
            println!("{}", user.username);
            if !user.roles.is_empty() {
                println!("roles: {}", user.roles.join(", "));
            }
            if !user.vpns.is_empty() {
                println!("vpns:  {}", user.vpns.join(", "));
            }
            Ok(())
        }
        None => Err(CliError::Command(
            "Not logged in. Run `vpner login` first.".to_string(),
        )),
    }
}
