use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(5000);
pub const DEFAULT_ERROR_TOAST_DURATION: Duration = Duration::from_millis(8000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastKind::Success => write!(f, "success"),
            ToastKind::Error => write!(f, "error"),
            ToastKind::Warning => write!(f, "warning"),
            ToastKind::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: String,
    pub kind: ToastKind,
    pub message: String,
}

#[derive(Default)]
struct ToastState {
    toasts: Vec<Toast>,
    timers: HashMap<String, JoinHandle<()>>,
}

/// Short-lived notifications with optional auto-dismiss.
#[derive(Clone, Default)]
pub struct ToastCentre {
    state: Arc<Mutex<ToastState>>,
}

impl ToastCentre {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ToastState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a toast and returns its id. A zero `duration` keeps it until
    /// dismissed; otherwise it is removed after `duration` (requires a tokio
    /// runtime).
    pub fn show(&self, kind: ToastKind, message: impl Into<String>, duration: Duration) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let mut state = self.lock();
        state.toasts.push(Toast {
            id: id.clone(),
            kind,
            message: message.into(),
        });

        if !duration.is_zero() {
            let centre = self.clone();
            let toast_id = id.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                centre.expire(&toast_id);
            });
            state.timers.insert(id.clone(), timer);
        }
        id
    }

    pub fn success(&self, message: impl Into<String>) -> String {
        self.show(ToastKind::Success, message, DEFAULT_TOAST_DURATION)
    }

    pub fn error(&self, message: impl Into<String>) -> String {
        self.show(ToastKind::Error, message, DEFAULT_ERROR_TOAST_DURATION)
    }

    pub fn warning(&self, message: impl Into<String>) -> String {
        self.show(ToastKind::Warning, message, DEFAULT_TOAST_DURATION)
    }

    pub fn info(&self, message: impl Into<String>) -> String {
        self.show(ToastKind::Info, message, DEFAULT_TOAST_DURATION)
    }

    // Called from the toast's own timer, which must not abort itself
    fn expire(&self, id: &str) {
        let mut state = self.lock();
        state.timers.remove(id);
        state.toasts.retain(|toast| toast.id != id);
    }

    pub fn dismiss(&self, id: &str) {
        let mut state = self.lock();
        if let Some(timer) = state.timers.remove(id) {
            timer.abort();
        }
        state.toasts.retain(|toast| toast.id != id);
    }

    pub fn dismiss_all(&self) {
        let mut state = self.lock();
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        state.toasts.clear();
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.lock().toasts.clone()
    }
}
