use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;
use crate::types::{
    AdminUser, ChangePasswordRequest, ConnectionStatus, CreateAdminUserRequest, ImportSummary,
    LoginRequest, LoginResponse, OtpRequest, Setting, SettingsByCategory, SettingsUpdate,
    SetupCompleteRequest, SetupCompleteResponse, SetupStatus, UpdateAdminUserRequest, User,
    VpnProfile,
};

/// Default per-request timeout for the underlying HTTP client
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra time granted on top of a connect or OTP `timeout` before the
/// client gives up waiting for the backend's answer
pub const COMMAND_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// The subset of the backend API the status store and the command
/// coordinator depend on.
///
/// [`ApiClient`] is the production implementation; tests substitute scripted
/// backends.
#[async_trait]
pub trait VpnBackend: Send + Sync {
    /// `GET /vpns`
    async fn list_vpns(&self) -> Result<Vec<VpnProfile>, ApiError>;

    /// `GET /vpns/{name}/status`
    async fn vpn_status(&self, name: &str) -> Result<ConnectionStatus, ApiError>;

    /// `POST /vpns/{name}/connect?timeout={timeout_secs}`
    async fn connect(&self, name: &str, timeout_secs: u64)
        -> Result<ConnectionStatus, ApiError>;

    /// `POST /vpns/{name}/otp?timeout={timeout_secs}` with `{"token": ...}`
    async fn submit_otp(
        &self,
        name: &str,
        token: &str,
        timeout_secs: u64,
    ) -> Result<ConnectionStatus, ApiError>;

    /// `POST /vpns/{name}/disconnect`
    async fn disconnect(&self, name: &str) -> Result<ConnectionStatus, ApiError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP client for the vpner backend.
///
/// Holds the bearer token behind a lock so one client can be shared through
/// an `Arc` by the store, the coordinator and the auth session.
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    http_client: reqwest::Client,
    request_timeout: Duration,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            request_timeout: timeout,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// How long to wait for a command the backend may hold open for
    /// `timeout_secs`. Never shorter than the client-wide timeout.
    fn command_timeout(&self, timeout_secs: u64) -> Duration {
        (Duration::from_secs(timeout_secs) + COMMAND_TIMEOUT_MARGIN).max(self.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = self.token() {
            request.header(AUTHORIZATION, format!("Bearer {}", token))
        } else {
            request
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::POST, path, None).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::PUT, path, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        self.request_with_timeout(method, path, body, None).await
    }

    async fn request_with_timeout<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<T, ApiError> {
        debug!("{} {}", method, path);

        let mut request = self.http_client.request(method, self.url(path));
        request = self.add_auth_header(request);
        if let Some(body) = body {
            request = request.json(&body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let text = response.text().await?;

        // Empty bodies are valid for endpoints that return nothing
        if text.trim().is_empty() {
            return serde_json::from_value(Value::Null)
                .map_err(|_| ApiError::unknown("Empty response body"));
        }

        Ok(serde_json::from_str(&text)?)
    }

    async fn error_from_response(response: Response) -> ApiError {
        let status = response.status();
        let reason = status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string();

        let message = match response.text().await {
            Ok(text) => serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.error.or(body.message))
                .unwrap_or(reason),
            Err(_) => reason,
        };

        ApiError::http(status.as_u16(), message)
    }

    fn vpn_path(name: &str, suffix: &str) -> String {
        format!("/vpns/{}{}", urlencoding::encode(name), suffix)
    }

    // VPN endpoints

    pub async fn list_vpns(&self) -> Result<Vec<VpnProfile>, ApiError> {
        self.get("/vpns").await
    }

    pub async fn get_vpn(&self, name: &str) -> Result<VpnProfile, ApiError> {
        self.get(&Self::vpn_path(name, "")).await
    }

    pub async fn vpn_status(&self, name: &str) -> Result<ConnectionStatus, ApiError> {
        self.get(&Self::vpn_path(name, "/status")).await
    }

    pub async fn connect(
        &self,
        name: &str,
        timeout_secs: u64,
    ) -> Result<ConnectionStatus, ApiError> {
        let path = Self::vpn_path(name, &format!("/connect?timeout={}", timeout_secs));
        self.request_with_timeout(
            Method::POST,
            &path,
            None,
            Some(self.command_timeout(timeout_secs)),
        )
        .await
    }

    pub async fn submit_otp(
        &self,
        name: &str,
        token: &str,
        timeout_secs: u64,
    ) -> Result<ConnectionStatus, ApiError> {
        let path = Self::vpn_path(name, &format!("/otp?timeout={}", timeout_secs));
        let body = OtpRequest {
            token: token.to_string(),
        };
        self.request_with_timeout(
            Method::POST,
            &path,
            Some(serde_json::to_value(&body)?),
            Some(self.command_timeout(timeout_secs)),
        )
        .await
    }

    pub async fn disconnect(&self, name: &str) -> Result<ConnectionStatus, ApiError> {
        self.post(&Self::vpn_path(name, "/disconnect")).await
    }

    // Auth endpoints

    /// Exchanges credentials for a session token and starts using it
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self.post_json("/auth/login", &body).await?;
        self.set_token(Some(response.token.clone()));
        Ok(response)
    }

    pub fn logout(&self) {
        self.set_token(None);
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("/auth/me").await
    }

    // Settings endpoints

    pub async fn get_settings(&self) -> Result<SettingsByCategory, ApiError> {
        self.get("/settings").await
    }

    pub async fn get_settings_by_category(&self, category: &str) -> Result<Vec<Setting>, ApiError> {
        self.get(&format!("/settings/{}", urlencoding::encode(category)))
            .await
    }

    pub async fn update_settings(&self, settings: &SettingsUpdate) -> Result<(), ApiError> {
        let _: Value = self.put_json("/settings", settings).await?;
        Ok(())
    }

    /// Downloads all settings as a YAML document
    pub async fn export_settings(&self) -> Result<String, ApiError> {
        let request = self.add_auth_header(self.http_client.get(self.url("/settings/export")));
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(response.text().await?)
    }

    pub async fn import_settings(&self, yaml: &str) -> Result<ImportSummary, ApiError> {
        let request = self
            .add_auth_header(self.http_client.post(self.url("/settings/import")))
            .header(CONTENT_TYPE, "text/plain")
            .body(yaml.to_string());
        let response = request.send().await?;
        Self::decode(response).await
    }

    // Admin user endpoints

    pub async fn list_admin_users(&self) -> Result<Vec<AdminUser>, ApiError> {
        self.get("/admin/users").await
    }

    pub async fn get_admin_user(&self, id: i64) -> Result<AdminUser, ApiError> {
        self.get(&format!("/admin/users/{}", id)).await
    }

    pub async fn create_admin_user(
        &self,
        request: &CreateAdminUserRequest,
    ) -> Result<AdminUser, ApiError> {
        self.post_json("/admin/users", request).await
    }

    pub async fn update_admin_user(
        &self,
        id: i64,
        request: &UpdateAdminUserRequest,
    ) -> Result<AdminUser, ApiError> {
        self.put_json(&format!("/admin/users/{}", id), request).await
    }

    pub async fn delete_admin_user(&self, id: i64) -> Result<(), ApiError> {
        let _: Value = self.delete(&format!("/admin/users/{}", id)).await?;
        Ok(())
    }

    pub async fn change_admin_password(&self, id: i64, password: &str) -> Result<(), ApiError> {
        let body = ChangePasswordRequest {
            password: password.to_string(),
        };
        let _: Value = self
            .post_json(&format!("/admin/users/{}/password", id), &body)
            .await?;
        Ok(())
    }

    // Setup endpoints

    pub async fn setup_status(&self) -> Result<SetupStatus, ApiError> {
        self.get("/setup/status").await
    }

    pub async fn complete_setup(
        &self,
        request: &SetupCompleteRequest,
    ) -> Result<SetupCompleteResponse, ApiError> {
        self.post_json("/setup/complete", request).await
    }
}

#[async_trait]
impl VpnBackend for ApiClient {
    async fn list_vpns(&self) -> Result<Vec<VpnProfile>, ApiError> {
        ApiClient::list_vpns(self).await
    }

    async fn vpn_status(&self, name: &str) -> Result<ConnectionStatus, ApiError> {
        ApiClient::vpn_status(self, name).await
    }

    async fn connect(
        &self,
        name: &str,
        timeout_secs: u64,
    ) -> Result<ConnectionStatus, ApiError> {
        ApiClient::connect(self, name, timeout_secs).await
    }

    async fn submit_otp(
        &self,
        name: &str,
        token: &str,
        timeout_secs: u64,
    ) -> Result<ConnectionStatus, ApiError> {
        ApiClient::submit_otp(self, name, token, timeout_secs).await
    }

    async fn disconnect(&self, name: &str) -> Result<ConnectionStatus, ApiError> {
        ApiClient::disconnect(self, name).await
    }
}
