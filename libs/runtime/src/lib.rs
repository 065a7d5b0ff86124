//! Process-level plumbing shared by binaries: layered configuration and
//! tracing setup.

pub mod config;
pub mod logging;

pub use config::{AppConfig, CliArgs, LoggingConfig, Section};
