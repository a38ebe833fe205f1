//! Command implementations for the vpner CLI
//!
//! Each submodule holds one group of subcommands. They share a
//! [`CommandContext`] built from the effective configuration.

pub mod auth;
pub mod config;
pub mod vpn;
pub mod watch;

use crate::error::CliError;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use vpner_client::{ApiClient, AuthSession, ClientConfig, ControlPanel, FileTokenStore};

/// Effective configuration plus the clients built from it
pub struct CommandContext {
    pub config: ClientConfig,
    pub api: Arc<ApiClient>,
    pub session: AuthSession,
}

impl CommandContext {
    pub fn load(config_path: Option<&Path>, api_url: Option<&str>) -> Result<Self, CliError> {
        let config = effective_config(config_path, api_url)?;
        debug!("Using backend at {}", config.api_base);

        let api = Arc::new(ApiClient::with_timeout(
            config.api_base.clone(),
            config.request_timeout(),
        )?);
        let session = AuthSession::new(
            Arc::clone(&api),
            Box::new(FileTokenStore::new(config.token_path.clone())),
        );

        Ok(Self {
            config,
            api,
            session,
        })
    }

    /// Attach the stored token, if it is still accepted
    pub async fn restore_session(&self) {
        match self.session.check_auth().await {
            Some(user) => debug!("Authenticated as {}", user.username),
            None => debug!("No active session"),
        }
    }

    pub fn panel(&self) -> ControlPanel {
        ControlPanel::from_config(self.api.clone(), &self.config)
    }
}

pub fn effective_config(
    config_path: Option<&Path>,
    api_url: Option<&str>,
) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load(config_path)?;
    if let Some(url) = api_url {
        config.api_base = url.trim_end_matches('/').to_string();
    }
    Ok(config)
}

/// Read one trimmed line from stdin after printing `label`
pub async fn prompt(label: &str) -> Result<String, CliError> {
    let label = label.to_string();
    let line = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{label}")?;
        stdout.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed before input was entered",
            ));
        }
        Ok(line)
    })
    .await
    .map_err(|e| CliError::Other(e.into()))??;

    Ok(line.trim().to_string())
}
