use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::VpnBackend;
use crate::error::ApiError;
use crate::types::{ConnectionStatus, VpnProfile};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

const LOAD_FAILED_FALLBACK: &str = "Failed to load VPNs";

/// The latest status received for one profile and when it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedStatus {
    pub status: ConnectionStatus,
    pub fetched_at: DateTime<Utc>,
}

impl CachedStatus {
    fn now(status: ConnectionStatus) -> Self {
        Self {
            status,
            fetched_at: Utc::now(),
        }
    }

    /// How stale this entry is
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }
}

#[derive(Debug, Default)]
struct StoreState {
    profiles: Vec<VpnProfile>,
    statuses: HashMap<String, CachedStatus>,
    loading: bool,
    error: Option<String>,
}

/// Per-profile cache of connection status, fed by a polling loop.
///
/// Cloning is cheap and every clone shares the same cache and poller.
#[derive(Clone)]
pub struct StatusStore {
    backend: Arc<dyn VpnBackend>,
    state: Arc<RwLock<StoreState>>,
    poller: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl StatusStore {
    pub fn new(backend: Arc<dyn VpnBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(StoreState::default())),
            poller: Arc::new(Mutex::new(None)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reloads the profile list and then every profile's status, one at a time.
    ///
    /// A failing status fetch leaves that profile out of the new map. A
    /// failing list fetch sets [`StatusStore::error`], keeps the previous
    /// snapshot and is returned so the caller can classify it.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        {
            let mut state = self.write();
            state.loading = true;
            state.error = None;
        }

        let profiles = match self.backend.list_vpns().await {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!("Failed to load VPN profiles: {}", err);
                let mut state = self.write();
                state.error = Some(if err.message().is_empty() {
                    LOAD_FAILED_FALLBACK.to_string()
                } else {
                    err.message().to_string()
                });
                state.loading = false;
                return Err(err);
            }
        };

        let mut statuses = HashMap::with_capacity(profiles.len());
        for profile in &profiles {
            match self.backend.vpn_status(&profile.name).await {
                Ok(status) => {
                    statuses.insert(profile.name.clone(), CachedStatus::now(status));
                }
                Err(err) => {
                    debug!("Ignoring status fetch failure for {}: {}", profile.name, err);
                }
            }
        }

        let mut state = self.write();
        state.profiles = profiles;
        state.statuses = statuses;
        state.loading = false;
        Ok(())
    }

    /// Starts polling with [`StatusStore::refresh`] as the tick action.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_polling(&self, period: Duration) {
        let store = self.clone();
        self.start_polling_with(period, move || {
            let store = store.clone();
            async move {
                let _ = store.refresh().await;
            }
        });
    }

    /// Replaces any running poller with one that runs `tick` immediately and
    /// then once per `period`.
    ///
    /// Each tick runs as its own task, so stopping the poller never cancels a
    /// refresh that is already in flight.
    pub fn start_polling_with<F, Fut>(&self, period: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = poller.take() {
            previous.abort();
        }

        debug!("Starting status polling every {:?}", period);
        *poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tokio::spawn(tick());
            }
        }));
    }

    /// Cancels the poller. Safe to call when none is running.
    pub fn stop_polling(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = poller.take() {
            debug!("Stopping status polling");
            handle.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cached status for `name`. Never fetches.
    pub fn get_status(&self, name: &str) -> Option<ConnectionStatus> {
        self.read()
            .statuses
            .get(name)
            .map(|cached| cached.status.clone())
    }

    pub fn cached(&self, name: &str) -> Option<CachedStatus> {
        self.read().statuses.get(name).cloned()
    }

    /// Staleness of the cached entry for `name`
    pub fn status_age(&self, name: &str) -> Option<chrono::Duration> {
        self.read().statuses.get(name).map(CachedStatus::age)
    }

    /// Stores a status received outside of polling (e.g. a command response)
    pub fn record_status(&self, status: ConnectionStatus) {
        let name = status.profile_name.clone();
        self.write()
            .statuses
            .insert(name, CachedStatus::now(status));
    }

    pub fn profiles(&self) -> Vec<VpnProfile> {
        self.read().profiles.clone()
    }

    pub fn statuses(&self) -> HashMap<String, CachedStatus> {
        self.read().statuses.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }
}
