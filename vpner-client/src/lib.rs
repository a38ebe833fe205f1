//! # vpner client
//!
//! Client library for the vpner VPN connection manager backend.
//!
//! The backend owns the actual tunnels; this crate keeps a polled cache of
//! per-profile connection status, drives the connect / OTP / disconnect
//! commands and tracks whether the backend itself is reachable, retrying
//! when it is not.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vpner_client::{ApiClient, ConnectOptions, ControlPanel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(ApiClient::new("http://127.0.0.1:8080/api")?);
//!     api.login("admin", "secret").await?;
//!
//!     let panel = ControlPanel::new(api);
//!     panel.start();
//!
//!     let result = panel
//!         .connections()
//!         .connect("office", ConnectOptions::default())
//!         .await?;
//!     if result.otp_required {
//!         panel
//!             .connections()
//!             .submit_otp("office", "123456", ConnectOptions::default())
//!             .await?;
//!     }
//!
//!     panel.shutdown();
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod availability;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod monitor;
pub mod store;
pub mod toast;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, VpnBackend};
pub use auth::{AuthSession, FileTokenStore, MemoryTokenStore, TokenStore};
pub use availability::{describe_backend_error, is_backend_unavailable};
pub use config::{ClientConfig, ConfigError};
pub use connection::{ConnectOptions, ConnectResult, ConnectionService};
pub use context::ControlPanel;
pub use error::ApiError;
pub use monitor::{BackendConnectivity, ConnectivityMonitor};
pub use store::{CachedStatus, StatusStore};
pub use toast::{Toast, ToastCentre, ToastKind};
pub use types::{ConnectionStatus, StatusKind, User, VpnProfile};
