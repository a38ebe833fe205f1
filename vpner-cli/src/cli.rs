use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::{commands, error::CliError};
use commands::CommandContext;

#[derive(Debug, Parser)]
#[command(name = "vpner")]
#[command(about = "Control panel for the vpner VPN connection manager")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend API base URL (overrides config and VPNER_API_BASE)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and store the session token
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List VPN profiles with their current status
    List,

    /// Show the status of one VPN, or of all of them
    Status {
        /// Profile name
        name: Option<String>,
    },

    /// Connect a VPN, prompting for an OTP when the server asks for one
    Connect {
        /// Profile name
        name: String,

        /// Seconds the backend waits for the tunnel to come up
        #[arg(short, long)]
        timeout: Option<u64>,

        /// One-time password to submit if requested
        #[arg(long)]
        otp: Option<String>,
    },

    /// Submit a one-time password for a pending connection
    Otp {
        /// Profile name
        name: String,

        /// One-time password
        token: String,

        /// Seconds the backend waits after the token is accepted
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Disconnect a VPN
    Disconnect {
        /// Profile name
        name: String,
    },

    /// Live status table until Ctrl-C
    Watch {
        /// Poll interval in milliseconds
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub async fn run(&self) -> Result<(), CliError> {
        let command = match &self.command {
            Some(command) => command,
            None => {
                println!("vpner - VPN connection manager control panel");
                println!("Run 'vpner --help' for usage information.");
                return Ok(());
            }
        };

        if let Commands::Config { action } = command {
            return self.handle_config(action).await;
        }

        let ctx = CommandContext::load(self.config.as_deref(), self.api_url.as_deref())?;
        match command {
            Commands::Login { username, password } => {
                commands::auth::login(&ctx, username.clone(), password.clone()).await
            }
            Commands::Logout => commands::auth::logout(&ctx),
            Commands::Whoami => commands::auth::whoami(&ctx).await,
            Commands::List => {
                ctx.restore_session().await;
                commands::vpn::list(&ctx).await
            }
            Commands::Status { name } => {
                ctx.restore_session().await;
                commands::vpn::status(&ctx, name.as_deref()).await
            }
            Commands::Connect { name, timeout, otp } => {
                ctx.restore_session().await;
                commands::vpn::connect(&ctx, name, *timeout, otp.clone()).await
            }
            Commands::Otp {
                name,
                token,
                timeout,
            } => {
                ctx.restore_session().await;
                commands::vpn::submit_otp(&ctx, name, token, *timeout).await
            }
            Commands::Disconnect { name } => {
                ctx.restore_session().await;
                commands::vpn::disconnect(&ctx, name).await
            }
            Commands::Watch { interval } => {
                ctx.restore_session().await;
                commands::watch::watch(&ctx, *interval).await
            }
            Commands::Config { action } => self.handle_config(action).await,
        }
    }

    async fn handle_config(&self, action: &ConfigCommands) -> Result<(), CliError> {
        match action {
            ConfigCommands::Show => {
                commands::config::show(self.config.as_deref(), self.api_url.as_deref())
            }
            ConfigCommands::Init { force } => {
                commands::config::init(self.config.as_deref(), *force)
            }
        }
    }
}
