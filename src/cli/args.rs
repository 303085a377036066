//! CLI argument definitions using clap

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::http::HttpMethod;
use crate::runner::RunMode;

#[derive(Parser, Debug)]
#[command(name = "reqdeck", version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format
    #[arg(long = "log-format", value_enum, global = true, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every request of a collection file
    Run(RunArgs),
    /// Execute a single request
    Send(SendArgs),
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// Collection file (JSON or YAML)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Extra variables (a JSON or YAML list), layered over the collection's own
    #[arg(long = "vars", value_name = "FILE")]
    pub vars: Option<PathBuf>,

    /// Dispatch mode (defaults to the configured one)
    #[arg(long = "mode", value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<RunMode>,

    /// Pause between sequential requests, e.g. "500ms" or "2s"
    #[arg(long = "delay", value_name = "DURATION")]
    pub delay: Option<humantime::Duration>,

    /// Per-request network timeout
    #[arg(long = "timeout", value_name = "DURATION")]
    pub timeout: Option<humantime::Duration>,

    /// Print results as JSON Lines
    #[arg(long = "json", action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct SendArgs {
    /// HTTP method
    #[arg(
        short = 'X',
        long = "method",
        value_name = "METHOD",
        default_value = "GET",
        value_parser = parse_method
    )]
    pub method: HttpMethod,

    #[arg(long = "url", value_name = "URL")]
    pub url: String,

    /// Raw request body
    #[arg(short = 'd', long = "body", value_name = "BODY")]
    pub body: Option<String>,

    /// Request header as "Name:Value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Pre-request script file
    #[arg(long = "pre", value_name = "FILE")]
    pub pre: Option<PathBuf>,

    /// Post-request script file
    #[arg(long = "post", value_name = "FILE")]
    pub post: Option<PathBuf>,

    /// Extra variables (a JSON or YAML list)
    #[arg(long = "vars", value_name = "FILE")]
    pub vars: Option<PathBuf>,

    /// Per-request network timeout
    #[arg(long = "timeout", value_name = "DURATION")]
    pub timeout: Option<humantime::Duration>,

    /// Print the result as JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    pub json: bool,
}

/// Output format for logs
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Plain text output (default)
    #[default]
    Text,
    /// JSON Lines format for parsing
    Json,
}

fn parse_mode(s: &str) -> Result<RunMode, String> {
    s.parse().map_err(|e: crate::errors::ReqdeckError| e.to_string())
}

fn parse_method(s: &str) -> Result<HttpMethod, String> {
    s.parse().map_err(|e: crate::errors::ReqdeckError| e.to_string())
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid header '{}': expected Name:Value", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid header '{}': empty name", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
