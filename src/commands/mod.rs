//! CLI command implementations for herakles-live-monitor.
//!
//! This module provides implementations for all CLI subcommands:
//! - `config`: Configuration file generation
//! - `test`: Run a stream locally and print its snapshots

pub mod config;
pub mod test;

// Re-export command functions
pub use config::command_config;
pub use test::command_test;
