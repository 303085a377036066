//! Storage backend access: REST client, run polling and script autosave

pub mod autosave;
pub mod client;
pub mod poller;

pub use autosave::{SaveFailure, ScriptAutosave, ScriptEdit, DEFAULT_AUTOSAVE_DELAY};
pub use client::{
    ApiClient, RemoteRunStatus, RunRequest, RunStarted, RunStatusReport, DEFAULT_BASE_URL,
};
pub use poller::{RunPoller, DEFAULT_POLL_INTERVAL};
