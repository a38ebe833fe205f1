use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::api::VpnBackend;
use crate::error::ApiError;
use crate::types::{ConnectionStatus, Provider, StatusKind, VpnProfile};

pub(crate) fn profile(name: &str) -> VpnProfile {
    VpnProfile {
        name: name.to_string(),
        provider: Provider::Openfortivpn,
        enabled: true,
        auto_connect: false,
        otp_required: false,
        routes: Vec::new(),
        dns: Vec::new(),
        proxy: Vec::new(),
        aliases: Vec::new(),
        health_check: None,
        failover: None,
        schedule: None,
        host: Some("vpn.example.com".to_string()),
        port: Some(443),
        username: None,
        password: None,
        trusted_cert: None,
        config_path: None,
        openvpn: None,
    }
}

/// Scripted in-memory backend that records every call it receives.
#[derive(Default)]
pub(crate) struct FakeBackend {
    profiles: Mutex<Vec<VpnProfile>>,
    list_error: Mutex<Option<ApiError>>,
    statuses: Mutex<HashMap<String, Result<ConnectionStatus, ApiError>>>,
    command_results: Mutex<HashMap<(String, &'static str), Result<ConnectionStatus, ApiError>>>,
    list_calls: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub(crate) fn with_profiles(names: &[&str]) -> Self {
        let backend = Self::default();
        *backend.profiles.lock().unwrap() = names.iter().map(|name| profile(name)).collect();
        backend
    }

    pub(crate) fn set_profiles(&self, names: &[&str]) {
        *self.profiles.lock().unwrap() = names.iter().map(|name| profile(name)).collect();
    }

    pub(crate) fn fail_list(&self, error: Option<ApiError>) {
        *self.list_error.lock().unwrap() = error;
    }

    pub(crate) fn set_status(&self, name: &str, result: Result<ConnectionStatus, ApiError>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), result);
    }

    pub(crate) fn set_command(
        &self,
        name: &str,
        command: &'static str,
        result: Result<ConnectionStatus, ApiError>,
    ) {
        self.command_results
            .lock()
            .unwrap()
            .insert((name.to_string(), command), result);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn command(&self, name: &str, command: &'static str) -> Result<ConnectionStatus, ApiError> {
        self.command_results
            .lock()
            .unwrap()
            .get(&(name.to_string(), command))
            .cloned()
            .unwrap_or_else(|| Err(ApiError::http(404, format!("VPN not found: {}", name))))
    }
}

#[async_trait]
impl VpnBackend for FakeBackend {
    async fn list_vpns(&self) -> Result<Vec<VpnProfile>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.record("list".to_string());
        if let Some(err) = self.list_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.profiles.lock().unwrap().clone())
    }

    async fn vpn_status(&self, name: &str) -> Result<ConnectionStatus, ApiError> {
        self.record(format!("status {}", name));
        self.statuses
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(ConnectionStatus::new(name, StatusKind::Disconnected)))
    }

    async fn connect(
        &self,
        name: &str,
        timeout_secs: u64,
    ) -> Result<ConnectionStatus, ApiError> {
        self.record(format!("connect {} timeout={}", name, timeout_secs));
        self.command(name, "connect")
    }

    async fn submit_otp(
        &self,
        name: &str,
        token: &str,
        timeout_secs: u64,
    ) -> Result<ConnectionStatus, ApiError> {
        self.record(format!("otp {} {} timeout={}", name, token, timeout_secs));
        self.command(name, "otp")
    }

    async fn disconnect(&self, name: &str) -> Result<ConnectionStatus, ApiError> {
        self.record(format!("disconnect {}", name));
        self.command(name, "disconnect")
    }
}
