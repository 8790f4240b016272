//! Clap derive structures for the `infinimesh` CLI.
//!
//! Also compiled by build.rs for man page generation, so this file may
//! only depend on clap, clap_complete and std.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// infinimesh -- inspect and drive device shadows from the command line
#[derive(Debug, Parser)]
#[command(
    name = "infinimesh",
    version,
    about = "Inspect and drive infinimesh device shadows",
    long_about = "Lists devices, reads shadow snapshots, follows live state \
        deltas and patches desired or reported state through the infinimesh \
        gateway. Every request runs under a token scoped to the devices it touches.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "INFINIMESH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway URL (overrides profile)
    #[arg(long, short = 'e', env = "INFINIMESH_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Account token (overrides profile and keyring)
    #[arg(long, env = "INFINIMESH_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "INFINIMESH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "INFINIMESH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (defaults to the profile, then 30)
    #[arg(long, env = "INFINIMESH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse the device directory
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Read, follow and patch device shadows
    #[command(alias = "sh", alias = "s")]
    Shadow(ShadowArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices, most relevant first
    #[command(alias = "ls")]
    List {
        /// Only show devices in this namespace (defaults to the profile's)
        #[arg(long, short = 'n')]
        namespace: Option<String>,

        /// Also fetch each device's shadow to show connectivity
        #[arg(long)]
        with_state: bool,
    },
}

// ── Shadow ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ShadowArgs {
    #[command(subcommand)]
    pub command: ShadowCommand,
}

#[derive(Debug, Subcommand)]
pub enum ShadowCommand {
    /// Fetch and print the current shadow of one or more devices
    Get {
        /// Device UUIDs
        #[arg(required = true)]
        devices: Vec<String>,
    },

    /// Follow live shadow updates until interrupted
    Watch {
        /// Device UUIDs
        #[arg(required = true)]
        devices: Vec<String>,

        /// Give up after this many consecutive reconnection attempts
        #[arg(long)]
        max_retries: Option<u32>,

        /// Skip printing the current state before following updates
        #[arg(long)]
        no_snapshot: bool,
    },

    /// Patch a device's desired or reported state
    Patch {
        /// Device UUID
        device: String,

        #[command(flatten)]
        target: PatchTarget,

        /// JSON object to merge into the state document
        #[arg(required_unless_present = "from_file", conflicts_with = "from_file")]
        data: Option<String>,

        /// Read the JSON object from a file
        #[arg(long, short = 'f')]
        from_file: Option<PathBuf>,
    },
}

/// Which state document a patch targets; exactly one is required.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct PatchTarget {
    /// Patch the desired state
    #[arg(long)]
    pub desired: bool,

    /// Patch the reported state
    #[arg(long)]
    pub reported: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the current configuration (secrets masked)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key: endpoint, token_env, ca_cert, insecure, timeout, namespace
        key: String,

        /// Value to set
        value: String,
    },

    /// Store the account token in the system keyring
    SetToken {
        /// Token to store (prompted for when omitted)
        token: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
