//! CLI module - argument parsing and command dispatch

pub mod args;
pub mod commands;
pub mod helpers;

pub use args::{Cli, Commands, GlobalOpts, OutputFormat};

/// Process exit codes
pub mod exit {
    /// Healthy, or the command succeeded
    pub const OK: i32 = 0;
    /// Problems found (and repaired, or repair not attempted), or a rejected transition
    pub const ISSUES: i32 = 1;
    /// Repair ran but the index is still unhealthy
    pub const REPAIR_FAILED: i32 = 2;
    /// Unrecoverable error
    pub const FATAL: i32 = 3;
}
