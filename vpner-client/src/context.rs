use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::VpnBackend;
use crate::availability::{describe_backend_error, is_backend_unavailable};
use crate::config::ClientConfig;
use crate::connection::ConnectionService;
use crate::error::ApiError;
use crate::monitor::{ConnectivityMonitor, DEFAULT_RETRY_DELAY};
use crate::store::{StatusStore, DEFAULT_POLL_INTERVAL};
use crate::toast::ToastCentre;

/// Boxed so that the retry callback can call back into [`ControlPanel::sync`]
pub type SyncFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ApiError>> + Send + 'a>>;

/// Everything a control-panel front end needs, constructed once and shared
/// by cloning.
///
/// Call [`ControlPanel::start`] to begin polling and
/// [`ControlPanel::shutdown`] to cancel every timer it owns.
#[derive(Clone)]
pub struct ControlPanel {
    store: StatusStore,
    connections: ConnectionService,
    monitor: ConnectivityMonitor,
    toasts: ToastCentre,
    poll_interval: Duration,
    retry_delay: Duration,
}

impl ControlPanel {
    pub fn new(backend: Arc<dyn VpnBackend>) -> Self {
        let store = StatusStore::new(Arc::clone(&backend));
        let connections = ConnectionService::new(backend).with_store(store.clone());
        Self {
            store,
            connections,
            monitor: ConnectivityMonitor::new(),
            toasts: ToastCentre::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn from_config(backend: Arc<dyn VpnBackend>, config: &ClientConfig) -> Self {
        Self::new(backend).with_timing(config.poll_interval(), config.retry_delay())
    }

    pub fn with_timing(mut self, poll_interval: Duration, retry_delay: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.retry_delay = retry_delay;
        self
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn connections(&self) -> &ConnectionService {
        &self.connections
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn toasts(&self) -> &ToastCentre {
        &self.toasts
    }

    /// Refreshes the store and folds the outcome into backend connectivity.
    ///
    /// Backend-unavailable failures mark the backend disconnected and arm a
    /// retry that calls `sync` again; other errors are returned as-is.
    pub fn sync(&self) -> SyncFuture<'_> {
        Box::pin(async move {
            match self.store.refresh().await {
                Ok(()) => {
                    self.mark_reachable();
                    Ok(())
                }
                Err(err) => {
                    if is_backend_unavailable(&err) {
                        self.mark_unreachable(&err);
                        self.schedule_retry();
                    }
                    Err(err)
                }
            }
        })
    }

    /// Manual retry: sync now instead of waiting for the pending timer
    pub async fn retry_now(&self) -> Result<(), ApiError> {
        self.sync().await
    }

    fn mark_reachable(&self) {
        if !self.monitor.is_connected() {
            self.toasts.success("Reconnected to the vpner backend");
        }
        self.monitor.set_connected();
    }

    fn mark_unreachable(&self, err: &ApiError) {
        let message = describe_backend_error(err);
        warn!("Backend unavailable: {} ({})", message, err);
        if self.monitor.is_connected() {
            self.toasts.error(message.clone());
        }
        self.monitor.set_disconnected(message);
    }

    fn schedule_retry(&self) {
        let panel = self.clone();
        self.monitor.schedule_retry(
            move || async move {
                let _ = panel.sync().await;
            },
            self.retry_delay,
        );
    }

    /// Starts polling through [`ControlPanel::sync`]. The first tick is the
    /// initial load.
    ///
    /// Ticks are skipped while the backend is marked down; the retry timer
    /// owns recovery.
    pub fn start(&self) {
        let panel = self.clone();
        self.store.start_polling_with(self.poll_interval, move || {
            let panel = panel.clone();
            async move {
                if !panel.monitor.is_connected() {
                    debug!("Backend unreachable, skipping poll");
                    return;
                }
                let _ = panel.sync().await;
            }
        });
    }

    /// Cancels polling, the pending retry and all toast timers
    pub fn shutdown(&self) {
        self.store.stop_polling();
        self.monitor.cancel_retry();
        self.toasts.dismiss_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBackend;
    use crate::toast::ToastKind;
    use tokio::time::sleep;

    fn panel(backend: &Arc<FakeBackend>) -> ControlPanel {
        ControlPanel::new(backend.clone())
            .with_timing(Duration::from_millis(1000), Duration::from_millis(2300))
    }

    #[tokio::test]
    async fn test_sync_success_keeps_backend_connected() {
        let backend = Arc::new(FakeBackend::with_profiles(&["a", "b"]));
        let panel = panel(&backend);

        panel.sync().await.unwrap();

        assert!(panel.monitor().is_connected());
        assert!(panel.monitor().snapshot().last_checked.is_some());
        assert_eq!(panel.store().statuses().len(), 2);
        assert!(panel.toasts().toasts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_backend_schedules_retry_and_recovers() {
        let backend = Arc::new(FakeBackend::with_profiles(&["a"]));
        backend.fail_list(Some(ApiError::http(502, "Bad Gateway")));
        let panel = panel(&backend);

        let err = panel.sync().await.unwrap_err();
        assert_eq!(err.status(), Some(502));

        let state = panel.monitor().snapshot();
        assert!(!state.connected);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Bad Gateway - The vpner backend service may not be running")
        );
        assert!(panel.monitor().retry_pending());
        let toasts = panel.toasts().toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Error);

        backend.fail_list(None);
        sleep(Duration::from_millis(2500)).await;

        let state = panel.monitor().snapshot();
        assert!(state.connected);
        assert_eq!(state.retry_count, 0);
        assert!(state.last_error.is_none());
        assert!(!panel.monitor().retry_pending());
        assert!(panel.store().get_status("a").is_some());
        assert!(panel
            .toasts()
            .toasts()
            .iter()
            .any(|toast| toast.kind == ToastKind::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_continued_failure_rearms_single_retry() {
        let backend = Arc::new(FakeBackend::with_profiles(&["a"]));
        backend.fail_list(Some(ApiError::network("connection refused")));
        let panel = panel(&backend);

        assert!(panel.sync().await.is_err());
        // Retries fire at 2300, 4600 and 6900
        sleep(Duration::from_millis(7000)).await;

        assert_eq!(backend.list_calls(), 4);
        assert_eq!(panel.monitor().retry_count(), 3);
        assert!(panel.monitor().retry_pending());
        // Only the transition raised a toast
        assert_eq!(panel.toasts().toasts().len(), 1);

        panel.shutdown();
        sleep(Duration::from_millis(10_000)).await;
        assert_eq!(backend.list_calls(), 4);
    }

    #[tokio::test]
    async fn test_application_errors_do_not_touch_connectivity() {
        let backend = Arc::new(FakeBackend::with_profiles(&["a"]));
        backend.fail_list(Some(ApiError::http(401, "Unauthorized")));
        let panel = panel(&backend);

        let err = panel.sync().await.unwrap_err();

        assert_eq!(err, ApiError::http(401, "Unauthorized"));
        assert!(panel.monitor().is_connected());
        assert!(!panel.monitor().retry_pending());
        assert_eq!(panel.store().error().as_deref(), Some("Unauthorized"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_is_gated_while_backend_is_down() {
        let backend = Arc::new(FakeBackend::with_profiles(&["a"]));
        backend.fail_list(Some(ApiError::http(503, "Service Unavailable")));
        let panel = panel(&backend);

        panel.start();

        // t=0 initial load fails, t=2300 retry fails, poll ticks in between are skipped
        sleep(Duration::from_millis(4400)).await;
        assert_eq!(backend.list_calls(), 2);
        assert!(!panel.monitor().is_connected());

        // t=4600 retry succeeds, t=5000 regular polling resumes
        backend.fail_list(None);
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(backend.list_calls(), 4);
        assert!(panel.monitor().is_connected());

        panel.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_ticks_skipped_while_down_even_without_armed_timer() {
        let backend = Arc::new(FakeBackend::with_profiles(&["a"]));
        let panel = panel(&backend);
        // Same state as a retry whose sync is still in flight
        panel.monitor().set_disconnected("Unable to connect to the vpner backend service");
        assert!(!panel.monitor().retry_pending());

        panel.start();
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(backend.list_calls(), 0);

        panel.retry_now().await.unwrap();
        assert!(panel.monitor().is_connected());
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(backend.list_calls(), 2);

        panel.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let backend = Arc::new(FakeBackend::with_profiles(&["a"]));
        backend.fail_list(Some(ApiError::network("connection refused")));
        let panel = panel(&backend);

        panel.start();
        sleep(Duration::from_millis(100)).await;
        assert!(panel.store().is_polling());
        assert!(panel.monitor().retry_pending());

        panel.shutdown();
        assert!(!panel.store().is_polling());
        assert!(!panel.monitor().retry_pending());
        assert!(panel.toasts().toasts().is_empty());

        let calls = backend.list_calls();
        sleep(Duration::from_millis(20_000)).await;
        assert_eq!(backend.list_calls(), calls);
    }
}
