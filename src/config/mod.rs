//! Configuration loading

#[allow(clippy::module_inception)]
mod config;

pub use config::{ApiConfig, Config, CONFIG_DIR_ENV};
