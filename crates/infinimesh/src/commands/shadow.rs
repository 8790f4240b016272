//! Shadow command handlers: snapshot, live watch, patch.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use infinimesh_api::{ReconnectConfig, backoff_delay};
use infinimesh_core::{AccessLevel, ChannelState, CoreError, DeviceId, ShadowState, StateField};

use crate::cli::{GlobalOpts, OutputFormat, ShadowArgs, ShadowCommand};
use crate::error::CliError;
use crate::output;

use super::{GatewaySync, util};

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ShadowView {
    device: DeviceId,
    #[serde(flatten)]
    state: Arc<ShadowState>,
}

impl ShadowView {
    fn load(sync: &GatewaySync, device: &DeviceId) -> Self {
        Self {
            device: device.clone(),
            state: sync.lookup(device),
        }
    }
}

#[derive(Tabled)]
struct ShadowRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Reported")]
    reported: String,
    #[tabled(rename = "Desired")]
    desired: String,
    #[tabled(rename = "Version")]
    version: String,
}

fn row(view: &ShadowView, color: bool) -> ShadowRow {
    let version = |v: Option<u64>| v.map_or_else(|| "-".into(), |v| v.to_string());
    ShadowRow {
        device: view.device.to_string(),
        online: output::indicator(util::is_connected(&view.state.connection), color),
        reported: inline_data(&view.state, StateField::Reported),
        desired: inline_data(&view.state, StateField::Desired),
        version: format!(
            "{}/{}",
            version(view.state.reported.version),
            version(view.state.desired.version)
        ),
    }
}

fn inline_data(state: &ShadowState, field: StateField) -> String {
    let doc = state.field(field);
    if doc.data.is_empty() {
        return "-".into();
    }
    output::json_inline(&doc.data).unwrap_or_else(|_| "<unrenderable>".into())
}

fn detail(view: &ShadowView) -> String {
    let stamp = |field: StateField| {
        view.state
            .field(field)
            .timestamp
            .map_or_else(|| "-".into(), |t| t.to_rfc3339())
    };
    [
        format!("Device:     {}", view.device),
        format!(
            "Online:     {}",
            output::indicator(util::is_connected(&view.state.connection), false)
        ),
        format!("Reported:   {}", inline_data(&view.state, StateField::Reported)),
        format!("  at:       {}", stamp(StateField::Reported)),
        format!("Desired:    {}", inline_data(&view.state, StateField::Desired)),
        format!("  at:       {}", stamp(StateField::Desired)),
    ]
    .join("\n")
}

/// One line per streamed update in table mode.
fn event_line(view: &ShadowView) -> String {
    format!(
        "{} {} reported={} desired={}",
        chrono::Utc::now().format("%H:%M:%S%.3f"),
        view.device,
        inline_data(&view.state, StateField::Reported),
        inline_data(&view.state, StateField::Desired),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    sync: &GatewaySync,
    args: ShadowArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        ShadowCommand::Get { devices } => {
            let ids = util::parse_device_ids(&devices)?;
            sync.refresh_state(&ids).await?;

            let views: Vec<ShadowView> = ids.iter().map(|id| ShadowView::load(sync, id)).collect();
            let out = output::render_list(
                global.output,
                &views,
                |v| row(v, color),
                |v| v.device.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ShadowCommand::Watch {
            devices,
            max_retries,
            no_snapshot,
        } => {
            let ids = util::parse_device_ids(&devices)?;
            let reconnect = ReconnectConfig {
                max_retries,
                ..ReconnectConfig::default()
            };
            watch(sync, &ids, &reconnect, !no_snapshot, global).await
        }

        ShadowCommand::Patch {
            device,
            target,
            data,
            from_file,
        } => {
            let id = util::parse_device_ids(std::slice::from_ref(&device))?
                .into_iter()
                .next()
                .ok_or_else(|| CliError::Validation {
                    field: "device".into(),
                    reason: "a device is required".into(),
                })?;
            let field = if target.reported {
                StateField::Reported
            } else {
                StateField::Desired
            };
            let payload = util::read_json_object(data.as_deref(), from_file.as_deref())?;

            // Fail early with a readable error instead of a gateway rejection
            sync.refresh_devices(false, false).await?;
            if sync.access_level(&id).is_none() {
                return Err(CoreError::DeviceNotFound {
                    identifier: id.to_string(),
                }
                .into());
            }
            sync.check_access(std::slice::from_ref(&id), AccessLevel::Mgmt)?;

            let state = sync.patch(&id, field, payload).await?;
            let view = ShadowView { device: id, state };
            let out =
                output::render_single(global.output, &view, detail, |v| v.device.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

// ── Live watch ──────────────────────────────────────────────────────

fn print_update(sync: &GatewaySync, device: &DeviceId, global: &GlobalOpts) -> Result<(), CliError> {
    let view = ShadowView::load(sync, device);
    let format = match global.output {
        // Streamed JSON is one document per line
        OutputFormat::Json => OutputFormat::JsonCompact,
        other => other,
    };
    let out = output::render_single(format, &view, event_line, event_line)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Follow updates for `ids` until Ctrl-C.
///
/// The core never reconnects on its own; a closed channel is reopened
/// here with exponential backoff. The attempt counter resets whenever an
/// update arrives.
async fn watch(
    sync: &GatewaySync,
    ids: &[DeviceId],
    reconnect: &ReconnectConfig,
    snapshot: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if snapshot {
        sync.refresh_state(ids).await?;
        for id in ids {
            print_update(sync, id, global)?;
        }
    }

    let mut changes = sync.cache().changes();
    let mut state = sync.subscriptions().watch_state();
    let mut attempt = subscribe_with_retry(sync, ids, reconnect, 0).await?;
    info!(devices = ids.len(), "following shadow updates");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                sync.unsubscribe_all().await;
                break;
            }
            recv = changes.recv() => match recv {
                Ok(device) => {
                    attempt = 0;
                    print_update(sync, &device, global)?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "output fell behind; some updates were coalesced");
                }
                Err(RecvError::Closed) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                if *state.borrow_and_update() != ChannelState::Closed {
                    continue;
                }
                if reconnect.exhausted(attempt) {
                    return Err(CliError::ChannelClosed {
                        reason: format!("gave up after {attempt} reconnection attempts"),
                    });
                }
                let delay = backoff_delay(attempt, reconnect);
                warn!(attempt, delay_ms = delay.as_millis(), "channel closed, reconnecting");
                tokio::time::sleep(delay).await;
                attempt = subscribe_with_retry(sync, ids, reconnect, attempt + 1).await?;
            }
        }
    }
    Ok(())
}

/// Subscribe, retrying transient failures with backoff. Returns the
/// attempt counter to continue from.
async fn subscribe_with_retry(
    sync: &GatewaySync,
    ids: &[DeviceId],
    reconnect: &ReconnectConfig,
    mut attempt: u32,
) -> Result<u32, CliError> {
    loop {
        match sync.subscribe(ids.iter().cloned()).await {
            Ok(()) => return Ok(attempt),
            Err(e) if e.is_retryable() && !reconnect.exhausted(attempt) => {
                let delay = backoff_delay(attempt, reconnect);
                warn!(error = %e, attempt, delay_ms = delay.as_millis(), "subscribe failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
