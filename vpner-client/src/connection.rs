use std::sync::Arc;
use tracing::info;

use crate::api::VpnBackend;
use crate::error::ApiError;
use crate::store::StatusStore;
use crate::types::{ConnectionStatus, StatusKind};

/// Seconds the backend waits for a tunnel after a connect request
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
/// Seconds the backend waits after an OTP submission
pub const DEFAULT_OTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Backend-side timeout in seconds; `None` picks the command's default
    pub timeout_secs: Option<u64>,
}

impl ConnectOptions {
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            timeout_secs: Some(timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectResult {
    pub status: ConnectionStatus,
    /// The caller must collect an OTP and call [`ConnectionService::submit_otp`]
    pub otp_required: bool,
}

impl ConnectResult {
    fn from_status(status: ConnectionStatus) -> Self {
        // Either signal is enough: the flag may be set before the state moves
        let otp_required = status.status == StatusKind::WaitingForOtp || status.otp_required;
        Self {
            status,
            otp_required,
        }
    }
}

/// Issues connect, OTP and disconnect commands for named profiles.
///
/// Each command is a single round-trip. Errors from the transport are
/// returned untouched and nothing is retried here.
#[derive(Clone)]
pub struct ConnectionService {
    backend: Arc<dyn VpnBackend>,
    store: Option<StatusStore>,
}

impl ConnectionService {
    pub fn new(backend: Arc<dyn VpnBackend>) -> Self {
        Self {
            backend,
            store: None,
        }
    }

    /// Records every successful command result into `store`
    pub fn with_store(mut self, store: StatusStore) -> Self {
        self.store = Some(store);
        self
    }

    fn record(&self, status: &ConnectionStatus) {
        if let Some(store) = &self.store {
            store.record_status(status.clone());
        }
    }

    pub async fn connect(
        &self,
        name: &str,
        options: ConnectOptions,
    ) -> Result<ConnectResult, ApiError> {
        let timeout = options.timeout_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        info!("Connecting {} (timeout {}s)", name, timeout);

        let status = self.backend.connect(name, timeout).await?;
        self.record(&status);
        Ok(ConnectResult::from_status(status))
    }

    pub async fn submit_otp(
        &self,
        name: &str,
        token: &str,
        options: ConnectOptions,
    ) -> Result<ConnectionStatus, ApiError> {
        let timeout = options.timeout_secs.unwrap_or(DEFAULT_OTP_TIMEOUT_SECS);
        info!("Submitting OTP for {} (timeout {}s)", name, timeout);

        let status = self.backend.submit_otp(name, token, timeout).await?;
        self.record(&status);
        Ok(status)
    }

    pub async fn disconnect(&self, name: &str) -> Result<ConnectionStatus, ApiError> {
        info!("Disconnecting {}", name);

        let status = self.backend.disconnect(name).await?;
        self.record(&status);
        Ok(status)
    }

    /// One-off status query, independent of polling
    pub async fn status(&self, name: &str) -> Result<ConnectionStatus, ApiError> {
        let status = self.backend.vpn_status(name).await?;
        self.record(&status);
        Ok(status)
    }
}
