//! Common test utilities for reqdeck integration tests
//!
//! - Collection and runner builders for library-level tests
//! - CLI invocation helpers with an isolated config directory

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tempfile::TempDir;

use reqdeck::http::{ExecutorOptions, HttpMethod, RequestExecutor};
use reqdeck::models::{Collection, Request};
use reqdeck::runner::{CollectionRunner, RunMode, RunOptions};
use reqdeck::VariableStore;

/// An address nothing listens on
pub const REFUSED_URL: &str = "http://127.0.0.1:9/unreachable";

pub fn executor(timeout: Duration) -> RequestExecutor {
    RequestExecutor::with_options(ExecutorOptions {
        timeout,
        ..ExecutorOptions::default()
    })
    .expect("executor")
}

pub fn get(id: i64, url: &str) -> Request {
    Request::new(id, HttpMethod::Get, url).with_name(&format!("request {}", id))
}

pub fn collection(requests: Vec<Request>) -> Collection {
    let mut collection = Collection::new(1, "Integration");
    for request in requests {
        collection.push(request);
    }
    collection
}

pub fn runner(requests: Vec<Request>, mode: RunMode, delay: Duration) -> CollectionRunner {
    runner_with_variables(requests, mode, delay, VariableStore::new())
}

pub fn runner_with_variables(
    requests: Vec<Request>,
    mode: RunMode,
    delay: Duration,
    variables: VariableStore,
) -> CollectionRunner {
    CollectionRunner::new(
        collection(requests),
        executor(Duration::from_secs(5)),
        Arc::new(RwLock::new(variables)),
        RunOptions { mode, delay },
    )
}

/// Output of one CLI invocation
#[derive(Debug)]
pub struct CliResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CliResponse {
    pub fn contains(&self, needle: &str) -> bool {
        self.stdout.contains(needle)
    }

    /// stdout parsed as JSON Lines
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("JSON line"))
            .collect()
    }
}

/// Scratch directory doubling as the config directory
pub struct MockEnvironment {
    pub dir: TempDir,
}

impl Default for MockEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `name` inside the scratch directory
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write fixture");
        path
    }
}

/// Run the reqdeck binary with an isolated config directory
pub fn reqdeck(args: &[&str], env: &MockEnvironment) -> CliResponse {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_reqdeck"));
    cmd.args(args);
    cmd.env("REQDECK_CONFIG_DIR", env.path());
    cmd.env_remove("REQDECK_LOG");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    parse_output(cmd.output().expect("Failed to execute reqdeck"))
}

fn parse_output(output: Output) -> CliResponse {
    CliResponse {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(1),
    }
}
