//! fruitsync CLI - argument parsing for the `fruitsync` binary.

pub mod config;

pub use config::{Command, Config, OutputFormat};
