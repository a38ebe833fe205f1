use std::fmt;
use vpner_client::{describe_backend_error, is_backend_unavailable, ApiError, ConfigError};

/// Main error type for the vpner CLI
#[derive(Debug)]
pub enum CliError {
    /// Configuration-related errors
    Config(String),
    /// File and terminal I/O errors
    Io(std::io::Error),
    /// The backend answered with an application error
    Api(ApiError),
    /// The backend itself could not be reached
    BackendUnavailable { diagnostic: String, source: ApiError },
    /// Command-level failures (bad input, failed connection)
    Command(String),
    /// Generic errors from anyhow
    Other(anyhow::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Api(err) => write!(f, "Backend error: {err}"),
            CliError::BackendUnavailable { diagnostic, .. } => write!(f, "{diagnostic}"),
            CliError::Command(msg) => write!(f, "{msg}"),
            CliError::Other(err) => write!(f, "Error: {err}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            CliError::Api(err) => Some(err),
            CliError::BackendUnavailable { source, .. } => Some(source),
            CliError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl CliError {
    /// Get the exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Io(_) => 3,
            CliError::Api(_) => 4,
            CliError::Command(_) => 5,
            CliError::BackendUnavailable { .. } => 6,
            CliError::Other(_) => 1,
        }
    }

    /// Extra line printed under the error, if any
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CliError::Api(err) if err.status() == Some(401) => {
                Some("Run `vpner login` to start a session.")
            }
            CliError::BackendUnavailable { .. } => {
                Some("Check that the vpner service is running and --api-url is correct.")
            }
            _ => None,
        }
    }
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        if is_backend_unavailable(&err) {
            CliError::BackendUnavailable {
                diagnostic: describe_backend_error(&err),
                source: err,
            }
        } else {
            CliError::Api(err)
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Other(err)
    }
}
