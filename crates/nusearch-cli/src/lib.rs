//! Command-line front end for NuSearch.
//!
//! # Modules
//!
//! - [`app`]: Command dispatch
//! - [`cli`]: Argument parsing
//! - [`config`]: Layered configuration
//! - [`config_handlers`]: `nusearch config` subcommands

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;

pub use app::{NusearchApp, SearchOptions};
pub use cli::{CliArgs, Command, ConfigAction, ConfigCommand};
pub use config::NusearchConfig;
