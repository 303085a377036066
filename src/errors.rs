//! Error types for reqdeck

use std::time::Duration;
use thiserror::Error;

/// Main error type for reqdeck
#[derive(Error, Debug)]
pub enum ReqdeckError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Malformed input caught before anything is sent
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Connection, DNS or timeout failure on the outbound request
    #[error("Network error: {0}")]
    Network(String),

    /// Backend unreachable or non-OK for a save/update/fetch
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Cannot {action} while the run is {state}")]
    InvalidTransition {
        action: &'static str,
        state: String,
    },
}

/// Failure raised while compiling or running a user script
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("compile error: {0}")]
    Compile(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("script exceeded time limit of {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("engine error: {0}")]
    Engine(String),
}

impl From<rquickjs::Error> for ScriptError {
    fn from(err: rquickjs::Error) -> Self {
        ScriptError::Engine(format!("JavaScript error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ReqdeckError>;
