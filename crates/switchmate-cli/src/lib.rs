//! Command-line interface for Switchmate light switches.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Scan for nearby Switchmate devices |
//! | `status` | Read switch state, battery level and warning once |
//! | `set` | Switch the relay on, off or toggle it |
//! | `watch` | Follow a switch and print every change |
//!
//! # Configuration
//!
//! Defaults are read from `<config dir>/switchmate/config.toml`, or from the
//! file given with `--config`. See [`config`] for the format.

pub mod cli;
pub mod commands;
pub mod config;
pub mod format;
pub mod util;
