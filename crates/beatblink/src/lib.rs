//! Beat & Blink - server and monitor binaries
//!
//! Shared pieces of the two executables: command line options, the TOML
//! application configuration and the tracing subscriber setup.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod logging_setup;

pub use config::AppConfig;
