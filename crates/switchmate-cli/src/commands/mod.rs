//! Command implementations for the CLI.

mod scan;
mod set;
mod status;
mod watch;

pub use scan::cmd_scan;
pub use set::cmd_set;
pub use status::cmd_status;
pub use watch::cmd_watch;
