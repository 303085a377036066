//! Pre/post-request scripting
//!
//! Scripts run in an embedded QuickJS engine on a blocking worker thread.
//! The host and the script only exchange JSON messages: a snapshot of the
//! request (and response, after the send) goes in, and the mutated request,
//! ephemeral variables, assertions and console output come back.
//!
//! Script bodies see `pm`, `request`, `response`, `test`, `environment`,
//! `variables` and `console`, plus the `Date`, `Math` and `JSON` intrinsics.

pub mod context;
pub mod js;

pub use context::{
    Assertion, LogLevel, RequestSnapshot, ResponseSnapshot, ScriptEnvironment, ScriptLog,
};
pub use js::{JsScriptEngine, ScriptLimits};

use crate::errors::ScriptError;
use context::ScriptReply;

/// Runs user scripts in isolation, one fresh engine per run
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    limits: ScriptLimits,
}

impl ScriptSandbox {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    /// Run a pre-request script against a fresh environment seeded with `request`
    pub async fn run_pre_request(
        &self,
        script: &str,
        request: RequestSnapshot,
    ) -> Result<ScriptEnvironment, ScriptError> {
        self.run(script, ScriptEnvironment::new(request)).await
    }

    /// Run a post-request script with the captured response.
    ///
    /// `environment` is whatever the pre-request phase produced, so variables
    /// set there are visible here.
    pub async fn run_post_request(
        &self,
        script: &str,
        response: ResponseSnapshot,
        mut environment: ScriptEnvironment,
    ) -> Result<ScriptEnvironment, ScriptError> {
        environment.response = Some(response);
        self.run(script, environment).await
    }

    /// Check that `script` compiles without running it
    pub async fn validate(&self, script: &str) -> Result<(), ScriptError> {
        if script.trim().is_empty() {
            return Ok(());
        }
        let source = script.to_string();
        let limits = self.limits.clone();
        tokio::task::spawn_blocking(move || JsScriptEngine::new(limits)?.compile(&source))
            .await
            .map_err(|e| ScriptError::Engine(format!("Script worker failed: {}", e)))?
    }

    async fn run(
        &self,
        script: &str,
        environment: ScriptEnvironment,
    ) -> Result<ScriptEnvironment, ScriptError> {
        if script.trim().is_empty() {
            return Ok(environment);
        }

        let message = environment.to_message()?;
        let source = script.to_string();
        let limits = self.limits.clone();

        let reply = tokio::task::spawn_blocking(move || {
            JsScriptEngine::new(limits)?.evaluate(&source, &message)
        })
        .await
        .map_err(|e| ScriptError::Engine(format!("Script worker failed: {}", e)))??;

        let reply = ScriptReply::parse(&reply)?;
        for line in &reply.logs {
            emit(line);
        }
        Ok(environment.apply(reply))
    }
}

fn emit(line: &ScriptLog) {
    match line.level {
        LogLevel::Log | LogLevel::Info => tracing::info!(target: "script", "{}", line.message),
        LogLevel::Warn => tracing::warn!(target: "script", "{}", line.message),
        LogLevel::Error => tracing::error!(target: "script", "{}", line.message),
    }
}
