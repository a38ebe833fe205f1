//! Live status view

use super::vpn::render_table;
use super::CommandContext;
use crate::error::CliError;
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use vpner_client::{BackendConnectivity, ControlPanel, Toast};

const RENDER_INTERVAL: Duration = Duration::from_secs(1);
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Poll the backend and redraw until Ctrl-C. Enter forces a retry while the
/// backend is unreachable.
pub async fn watch(ctx: &CommandContext, interval_ms: Option<u64>) -> Result<(), CliError> {
    let mut config = ctx.config.clone();
    if let Some(ms) = interval_ms {
        config.poll_interval_ms = ms;
    }

    let panel = ControlPanel::from_config(ctx.api.clone(), &config);
    panel.start();
    info!("Watching {} every {}ms", ctx.api.base_url(), config.poll_interval_ms);

    let mut connectivity = panel.monitor().subscribe();
    let mut enter = spawn_stdin_lines();
    let mut render = tokio::time::interval(RENDER_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            res = &mut ctrl_c => break res.map_err(CliError::from),
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                draw(&panel);
            }
            Some(()) = enter.recv() => {
                if !panel.monitor().is_connected() {
                    debug!("Manual retry requested");
                    let _ = panel.retry_now().await;
                }
                draw(&panel);
            }
            _ = render.tick() => draw(&panel),
        }
    };

    panel.shutdown();
    result
}

fn draw(panel: &ControlPanel) {
    print!("{CLEAR_SCREEN}{}", render_frame(panel));
}

fn render_frame(panel: &ControlPanel) -> String {
    let store = panel.store();
    let mut out = String::new();

    if let Some(banner) = banner(&panel.monitor().snapshot(), panel.monitor().retry_pending()) {
        out.push_str(&banner);
        out.push_str("\n\n");
    }

    let profiles = store.profiles();
    if profiles.is_empty() {
        if store.is_loading() {
            out.push_str("Loading...\n");
        } else {
            out.push_str("No VPN profiles\n");
        }
    } else {
        out.push_str(&render_table(&profiles, &store.statuses()));
    }

    if let Some(error) = store.error() {
        out.push_str(&format!("\nLast refresh failed: {error}\n"));
    }

    let toasts = panel.toasts().toasts();
    if !toasts.is_empty() {
        out.push('\n');
        for toast in &toasts {
            out.push_str(&toast_line(toast));
            out.push('\n');
        }
    }

    out.push_str("\nCtrl-C to quit\n");
    out
}

/// Banner shown while the backend cannot be reached
fn banner(state: &BackendConnectivity, retry_pending: bool) -> Option<String> {
    if state.connected {
        return None;
    }

    let mut banner = format!(
        "Backend unreachable: {}",
        state.last_error.as_deref().unwrap_or("unknown error")
    );
    if state.retry_count > 0 {
        banner.push_str(&format!(" (retry #{})", state.retry_count));
    }
    if retry_pending {
        banner.push_str(" - retrying automatically, press Enter to retry now");
    }
    Some(banner)
}

fn toast_line(toast: &Toast) -> String {
    format!("[{}] {}", toast.kind, toast.message)
}

/// Forward each line typed on stdin. The reader is a plain thread so it never
/// holds up runtime shutdown.
fn spawn_stdin_lines() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpner_client::ToastKind;

    #[test]
    fn test_no_banner_while_connected() {
        assert!(banner(&BackendConnectivity::default(), false).is_none());
    }

    #[test]
    fn test_banner_shows_diagnostic_and_retry_count() {
        let state = BackendConnectivity {
            connected: false,
            last_error: Some("Bad Gateway - The vpner backend service may not be running".into()),
            last_checked: None,
            retry_count: 2,
        };

        let text = banner(&state, true).unwrap();
        assert!(text.starts_with(
            "Backend unreachable: Bad Gateway - The vpner backend service may not be running"
        ));
        assert!(text.contains("(retry #2)"));
        assert!(text.ends_with("press Enter to retry now"));

        let idle = banner(&state, false).unwrap();
        assert!(!idle.contains("Enter"));
    }

    #[test]
    fn test_toast_line_includes_kind() {
        let toast = Toast {
            id: "1".into(),
            kind: ToastKind::Error,
            message: "Unable to connect to the vpner backend service".into(),
        };
        assert_eq!(
            toast_line(&toast),
            "[error] Unable to connect to the vpner backend service"
        );
    }
}
