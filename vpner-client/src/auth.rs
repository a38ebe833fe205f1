use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::availability::is_backend_unavailable;
use crate::error::ApiError;
use crate::types::User;

/// Persistence for the session bearer token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Keeps the token in a single file, readable only by the owner on unix.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.lock().clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.lock() = None;
        Ok(())
    }
}

fn storage_error(err: io::Error) -> ApiError {
    ApiError::unknown(format!("Token storage error: {}", err))
}

#[derive(Default)]
struct SessionState {
    user: Option<User>,
    initialized: bool,
}

/// Login state for one operator, backed by a persisted token.
pub struct AuthSession {
    api: Arc<ApiClient>,
    tokens: Box<dyn TokenStore>,
    state: Mutex<SessionState>,
}

impl AuthSession {
    pub fn new(api: Arc<ApiClient>, tokens: Box<dyn TokenStore>) -> Self {
        Self {
            api,
            tokens,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restores a persisted session once. A stored token the backend rejects
    /// (401/403) is discarded; while the backend is unreachable the token is
    /// kept and the check is repeated on the next call.
    pub async fn check_auth(&self) -> Option<User> {
        if self.lock().initialized {
            return self.user();
        }

        let token = match self.tokens.load() {
            Ok(token) => token,
            Err(e) => {
                debug!("Could not read stored token: {}", e);
                None
            }
        };

        let user = match token {
            Some(token) => {
                self.api.set_token(Some(token));
                match self.api.current_user().await {
                    Ok(user) => Some(user),
                    Err(e) if is_backend_unavailable(&e) => {
                        // Keep the token and check again on the next call
                        debug!("Backend unavailable, session not verified: {}", e);
                        return None;
                    }
                    Err(e) if matches!(e.status(), Some(401 | 403)) => {
                        debug!("Stored session rejected: {}", e);
                        self.drop_token();
                        None
                    }
                    Err(e) => {
                        debug!("Could not verify stored session: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        let mut state = self.lock();
        state.user = user.clone();
        state.initialized = true;
        user
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let response = self.api.login(username, password).await?;
        self.tokens.save(&response.token).map_err(storage_error)?;

        let user = self.api.current_user().await?;
        info!("Logged in as {}", user.username);

        let mut state = self.lock();
        state.user = Some(user.clone());
        state.initialized = true;
        Ok(user)
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.lock().user = None;
        self.api.logout();
        self.tokens.clear().map_err(storage_error)
    }

    fn drop_token(&self) {
        self.api.logout();
        if let Err(e) = self.tokens.clear() {
            debug!("Could not clear stored token: {}", e);
        }
    }

    pub fn user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().user.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_token_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token"));

        assert_eq!(store.load().unwrap(), None);
        store.save("secret-token").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("secret-token"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_token_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token"));
        store.save("secret-token").unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_blank_token_file_is_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "  \n").unwrap();

        assert_eq!(FileTokenStore::new(path).load().unwrap(), None);
    }

    #[test]
    fn test_memory_token_store() {
        let store = MemoryTokenStore::default();
        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_check_auth_without_token_does_not_call_backend() {
        // Unroutable address: any request would fail with a network error
        let api = Arc::new(ApiClient::new("http://127.0.0.1:1/api").unwrap());
        let session = AuthSession::new(api.clone(), Box::new(MemoryTokenStore::default()));

        assert!(session.check_auth().await.is_none());
        assert!(!session.is_authenticated());
        assert!(!api.is_authenticated());
    }

    #[tokio::test]
    async fn test_check_auth_drops_rejected_token() {
        let mut server = mockito::Server::new_async().await;
        let me = server
            .mock("GET", "/api/auth/me")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .with_body(r#"{"error":"Invalid or expired token"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        FileTokenStore::new(&path).save("stale").unwrap();
        let api = Arc::new(ApiClient::new(format!("{}/api", server.url())).unwrap());
        let session = AuthSession::new(api.clone(), Box::new(FileTokenStore::new(&path)));

        assert!(session.check_auth().await.is_none());
        assert!(!api.is_authenticated());
        assert!(!path.exists());
        me.assert_async().await;
    }

    #[tokio::test]
    async fn test_check_auth_keeps_token_while_backend_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        FileTokenStore::new(&path).save("still-valid").unwrap();
        let api = Arc::new(ApiClient::new("http://127.0.0.1:1/api").unwrap());
        let session = AuthSession::new(api.clone(), Box::new(FileTokenStore::new(&path)));

        assert!(session.check_auth().await.is_none());
        assert!(!session.is_authenticated());
        assert_eq!(api.token().as_deref(), Some("still-valid"));
        assert_eq!(
            FileTokenStore::new(&path).load().unwrap().as_deref(),
            Some("still-valid")
        );
    }

    #[tokio::test]
    async fn test_check_auth_keeps_token_on_gateway_error() {
        let mut server = mockito::Server::new_async().await;
        let me = server
            .mock("GET", "/api/auth/me")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let tokens = MemoryTokenStore::default();
        tokens.save("still-valid").unwrap();
        let api = Arc::new(ApiClient::new(format!("{}/api", server.url())).unwrap());
        let session = AuthSession::new(api.clone(), Box::new(tokens));

        assert!(session.check_auth().await.is_none());
        assert_eq!(api.token().as_deref(), Some("still-valid"));
        // Not cached as logged out: the next call asks again
        assert!(session.check_auth().await.is_none());
        me.assert_async().await;
    }
}
