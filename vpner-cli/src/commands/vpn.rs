//! VPN listing and connection commands

use super::{prompt, CommandContext};
use crate::error::CliError;
use std::collections::HashMap;
use tracing::debug;
use vpner_client::types::{ConnectionStatus, StatusKind, VpnProfile};
use vpner_client::{CachedStatus, ConnectOptions, ConnectionService};

/// OTP prompts before `connect` gives up
const MAX_OTP_ATTEMPTS: u32 = 3;

pub async fn list(ctx: &CommandContext) -> Result<(), CliError> {
    let panel = ctx.panel();
    let result = panel.sync().await;
    panel.shutdown();
    result?;

    let profiles = panel.store().profiles();
    if profiles.is_empty() {
        println!("No VPN profiles configured");
        return Ok(());
    }
    print!("{}", render_table(&profiles, &panel.store().statuses()));
    Ok(())
}

pub async fn status(ctx: &CommandContext, name: Option<&str>) -> Result<(), CliError> {
    let Some(name) = name else {
        return list(ctx).await;
    };

    let status = ConnectionService::new(ctx.api.clone()).status(name).await?;
    print!("{}", describe_status(&status));
    Ok(())
}

pub async fn connect(
    ctx: &CommandContext,
    name: &str,
    timeout: Option<u64>,
    otp: Option<String>,
) -> Result<(), CliError> {
    let service = ConnectionService::new(ctx.api.clone());
    let timeout = timeout.unwrap_or(ctx.config.connect_timeout_secs);
    let result = service
        .connect(name, ConnectOptions::with_timeout(timeout))
        .await?;
    let mut status = result.status;

    if result.otp_required {
        let mut preset = otp;
        for attempt in 1..=MAX_OTP_ATTEMPTS {
            let token = match preset.take() {
                Some(token) => token,
                None => prompt(&format!("OTP for {name}: ")).await?,
            };
            if token.is_empty() {
                return Err(CliError::Command("OTP must not be empty".to_string()));
            }

            debug!("Submitting OTP for {} (attempt {})", name, attempt);
            status = service
                .submit_otp(
                    name,
                    &token,
                    ConnectOptions::with_timeout(ctx.config.otp_timeout_secs),
                )
                .await?;
            if status.status != StatusKind::WaitingForOtp {
                break;
            }
            eprintln!(
                "{}",
                status.error_message.as_deref().unwrap_or("OTP was not accepted")
            );
        }
    }

    report(&status)
}

pub async fn submit_otp(
    ctx: &CommandContext,
    name: &str,
    token: &str,
    timeout: Option<u64>,
) -> Result<(), CliError> {
    let timeout = timeout.unwrap_or(ctx.config.otp_timeout_secs);
    let status = ConnectionService::new(ctx.api.clone())
        .submit_otp(name, token, ConnectOptions::with_timeout(timeout))
        .await?;
    report(&status)
}

pub async fn disconnect(ctx: &CommandContext, name: &str) -> Result<(), CliError> {
    let status = ConnectionService::new(ctx.api.clone())
        .disconnect(name)
        .await?;
    report(&status)
}

/// Print the outcome of a command; failures become errors
fn report(status: &ConnectionStatus) -> Result<(), CliError> {
    println!("{}", outcome(status)?);
    Ok(())
}

fn outcome(status: &ConnectionStatus) -> Result<String, CliError> {
    let name = &status.profile_name;
    match status.status {
        StatusKind::Connected => Ok(match &status.interface {
            Some(interface) => format!("{name} connected on {interface}"),
            None => format!("{name} connected"),
        }),
        StatusKind::Failed => Err(CliError::Command(format!(
            "{name} failed: {}",
            status.error_message.as_deref().unwrap_or("unknown error")
        ))),
        StatusKind::WaitingForOtp => Err(CliError::Command(format!(
            "{name} is still waiting for an OTP; run `vpner otp {name} <TOKEN>`"
        ))),
        other if other.is_transitional() => Ok(format!(
            "{name} {other}; check progress with `vpner status {name}`"
        )),
        other => Ok(format!("{name} {other}")),
    }
}

/// Multi-line detail view of one status
pub fn describe_status(status: &ConnectionStatus) -> String {
    let mut out = format!("{}: {}\n", status.profile_name, status.status);
    let mut field = |label: &str, value: String| {
        out.push_str(&format!("  {label:<12}{value}\n"));
    };

    if let Some(interface) = &status.interface {
        field("interface", interface.clone());
    }
    if let Some(pid) = status.pid {
        field("pid", pid.to_string());
    }
    if let Some(started_at) = &status.started_at {
        field("since", started_at.clone());
    }
    if let Some(health) = &status.health {
        let state = if health.healthy { "healthy" } else { "unhealthy" };
        field(
            "health",
            format!(
                "{state} (checked {}, {} failures)",
                health.last_check, health.consecutive_failures
            ),
        );
    }
    if let Some(count) = status.reconnect_count.filter(|count| *count > 0) {
        field("reconnects", count.to_string());
    }
    if status.failover_active == Some(true) {
        field(
            "failover",
            status.failover_profile.clone().unwrap_or_else(|| "active".to_string()),
        );
    }
    if let Some(message) = &status.error_message {
        field("error", message.clone());
    }
    out
}

/// One row per profile, in backend order. Profiles without a cached status
/// show as `unknown`.
pub fn render_table(profiles: &[VpnProfile], statuses: &HashMap<String, CachedStatus>) -> String {
    let header = ["NAME", "PROVIDER", "STATUS", "INTERFACE", "UPDATED", "NOTE"];
    let rows: Vec<[String; 6]> = profiles
        .iter()
        .map(|profile| {
            let cached = statuses.get(&profile.name);
            let status = cached.map(|c| &c.status);
            [
                profile.name.clone(),
                profile.provider.to_string(),
                status.map_or_else(|| "unknown".to_string(), |s| s.status.to_string()),
                status
                    .and_then(|s| s.interface.clone())
                    .unwrap_or_else(|| "-".to_string()),
                cached.map_or_else(
                    || "-".to_string(),
                    |c| format!("{}s ago", c.age().num_seconds().max(0)),
                ),
                note(profile, status),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: &[&str]| {
        let line = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    };

    push_row(&header);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        push_row(&cells);
    }
    out
}

fn note(profile: &VpnProfile, status: Option<&ConnectionStatus>) -> String {
    let mut notes = Vec::new();
    if !profile.enabled {
        notes.push("disabled".to_string());
    }
    if let Some(status) = status {
        if let Some(message) = &status.error_message {
            notes.push(message.clone());
        }
        if status.failover_active == Some(true) {
            if let Some(target) = &status.failover_profile {
                notes.push(format!("failover to {target}"));
            }
        }
    }
    notes.join("; ")
}
