//! Device directory command handlers.

use serde::Serialize;
use tabled::Tabled;

use infinimesh_core::{AccessLevel, Device, DeviceId};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::{GatewaySync, util};

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DeviceView {
    id: DeviceId,
    title: String,
    access: AccessLevel,
    enabled: bool,
    basic_enabled: bool,
    namespace: Option<String>,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    online: Option<bool>,
}

impl DeviceView {
    fn new(device: &Device, online: Option<bool>) -> Self {
        Self {
            id: device.id.clone(),
            title: device.title.clone(),
            access: device.level(),
            enabled: device.enabled,
            basic_enabled: device.basic_enabled,
            namespace: device.namespace.clone(),
            tags: device.tags.clone(),
            online,
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Access")]
    access: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

fn row(view: &DeviceView, color: bool) -> DeviceRow {
    DeviceRow {
        id: view.id.to_string(),
        title: view.title.clone(),
        access: output::access_badge(view.access, color),
        enabled: output::indicator(Some(view.enabled), color),
        online: output::indicator(view.online, color),
        namespace: view.namespace.clone().unwrap_or_else(|| "-".into()),
        tags: view.tags.join(", "),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    sync: &GatewaySync,
    args: DevicesArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List {
            namespace,
            with_state,
        } => {
            let ids = sync.refresh_devices(with_state, true).await?;
            tracing::debug!(count = ids.len(), with_state, "directory refreshed");

            let namespace = namespace.as_deref().or(resolved.namespace.as_deref());
            let views: Vec<DeviceView> = sync
                .ranked(namespace)
                .iter()
                .map(|device| {
                    let online = with_state
                        .then(|| util::is_connected(&sync.lookup(&device.id).connection))
                        .flatten();
                    DeviceView::new(device, online)
                })
                .collect();

            let color = output::should_color(global.color);
            let out = output::render_list(
                global.output,
                &views,
                |v| row(v, color),
                |v| v.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
