//! reqdeck library interface
//!
//! Request execution and scripting engine for an API client workspace:
//! scoped variables, `{{placeholder}}` interpolation, sandboxed pre/post
//! request scripts, and sequential or parallel collection runs.
//!
//! # Module Organization
//!
//! - [`variables`] - Scoped variable store
//! - [`interpolate`] - Placeholder and dynamic token substitution
//! - [`scripting`] - Script sandbox (QuickJS)
//! - [`http`] - Request executor
//! - [`runner`] - Collection runner
//! - [`results`] - Per-request results and run aggregation
//! - [`workspace`] - Tabs, saved requests and drafts
//! - [`persistence`] - Storage backend client, run polling, script autosave
//! - [`core`] - CLI execution logic

pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod http;
pub mod interpolate;
pub mod magic;
pub mod models;
pub mod output;
pub mod persistence;
pub mod results;
pub mod runner;
pub mod scripting;
pub mod signals;
pub mod status;
pub mod variables;
pub mod workspace;

pub use errors::{ReqdeckError, Result, ScriptError};
pub use http::RequestExecutor;
pub use interpolate::interpolate;
pub use runner::CollectionRunner;
pub use scripting::ScriptSandbox;
pub use variables::{Variable, VariableScope, VariableStore};
