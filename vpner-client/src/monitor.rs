use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Reachability of the vpner backend as a whole (not of any one VPN).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConnectivity {
    pub connected: bool,
    pub last_error: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

impl Default for BackendConnectivity {
    fn default() -> Self {
        Self {
            connected: true,
            last_error: None,
            last_checked: None,
            retry_count: 0,
        }
    }
}

/// Tracks backend connectivity and owns the single pending retry timer.
///
/// State transitions and retry scheduling are separate calls so each call
/// site can pick its own backoff. Clones share state and timer.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<BackendConnectivity>>,
    retry_timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (state, _) = watch::channel(BackendConnectivity::default());
        Self {
            state: Arc::new(state),
            retry_timer: Arc::new(Mutex::new(None)),
        }
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.retry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> BackendConnectivity {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<BackendConnectivity> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn retry_count(&self) -> u32 {
        self.state.borrow().retry_count
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    /// Marks the backend reachable, resets the retry counter and cancels any
    /// pending retry.
    pub fn set_connected(&self) {
        self.state.send_modify(|state| {
            if !state.connected {
                info!("Backend connection restored");
            }
            state.connected = true;
            state.last_error = None;
            state.last_checked = Some(Utc::now());
            state.retry_count = 0;
        });
        self.cancel_retry();
    }

    /// Marks the backend unreachable. Does not schedule anything.
    pub fn set_disconnected(&self, error: impl Into<String>) {
        let error = error.into();
        self.state.send_modify(|state| {
            if state.connected {
                info!("Backend connection lost: {}", error);
            }
            state.connected = false;
            state.last_error = Some(error);
            state.last_checked = Some(Utc::now());
        });
    }

    pub fn increment_retry(&self) {
        self.state.send_modify(|state| state.retry_count += 1);
    }

    /// Arms a one-shot retry after `delay`, cancelling any pending one first.
    ///
    /// When the timer fires the retry counter is incremented and `callback`
    /// runs on its own task. Re-arming on continued failure is the
    /// callback's job. Must be called from within a tokio runtime.
    pub fn schedule_retry<F, Fut>(&self, callback: F, delay: Duration)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut timer = self.timer();
        if let Some(previous) = timer.take() {
            debug!("Cancelling pending backend retry");
            previous.abort();
        }

        debug!("Scheduling backend retry in {:?}", delay);
        let state = Arc::clone(&self.state);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.send_modify(|state| state.retry_count += 1);
            // Detached so that a callback which re-arms or reconnects cannot
            // abort itself through this handle
            tokio::spawn(callback());
        }));
    }

    /// Cancels the pending retry, if any
    pub fn cancel_retry(&self) {
        if let Some(handle) = self.timer().take() {
            handle.abort();
        }
    }

    pub fn retry_pending(&self) -> bool {
        self.timer()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
