//! Command dispatch: bridges CLI args -> `ShadowSync` -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod shadow;
pub mod util;

use infinimesh_api::NodeClient;
use infinimesh_core::ShadowSync;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Gateway-backed sync handle used by every networked command.
pub type GatewaySync = ShadowSync<NodeClient>;

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    sync: &GatewaySync,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(sync, args, resolved, global).await,
        Command::Shadow(args) => shadow::handle(sync, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
