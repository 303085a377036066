//! Outbound HTTP: method handling and the single-request executor

mod executor;
mod method;

pub use executor::{ExecutorOptions, RequestExecutor};
pub use method::*;
