//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "switchmate")]
#[command(author, version, about = "CLI for Switchmate light switches", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan for nearby Switchmate devices
    Scan {
        /// Scan timeout in seconds
        #[arg(short = 'T', long, default_value = "10")]
        timeout: u64,

        /// List every BLE device, not just Switchmates
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Read switch state, battery level and warning once
    Status {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Switch the relay
    Set {
        /// Target state
        #[arg(value_enum)]
        action: SwitchAction,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Follow a switch and print every change until interrupted
    Watch {
        #[command(flatten)]
        device: DeviceArgs,

        /// Subscribe to notifications (overrides config)
        #[arg(short, long)]
        notify: bool,
    },
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Requested relay change
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SwitchAction {
    On,
    Off,
    Toggle,
}

impl SwitchAction {
    /// Target state given the current one (`None` = unknown).
    ///
    /// Returns `None` for a toggle of an unknown state.
    pub fn target(self, current: Option<bool>) -> Option<bool> {
        match self {
            SwitchAction::On => Some(true),
            SwitchAction::Off => Some(false),
            SwitchAction::Toggle => current.map(|on| !on),
        }
    }
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device name, address or peripheral ID, or use SWITCHMATE_DEVICE env var
    #[arg(short, long, env = "SWITCHMATE_DEVICE")]
    pub device: Option<String>,

    /// Seconds to wait for the link and for values
    #[arg(short = 'T', long, default_value = "30")]
    pub timeout: u64,
}
