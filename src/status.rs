//! Exit status codes for the CLI
//!
//! - 0: every request completed and every assertion passed
//! - 1: a request failed, or reqdeck itself hit an error
//! - 10: requests completed but at least one assertion failed
//! - 130: interrupted with Ctrl+C

use std::process::{ExitCode, Termination};

use crate::results::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Error = 1,
    AssertionFailed = 10,
    /// Standard SIGINT code
    Interrupted = 130,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

impl Termination for ExitStatus {
    fn report(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

impl ExitStatus {
    /// Failed requests outrank failed assertions
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.has_failures() {
            ExitStatus::Error
        } else if summary.has_failed_assertions() {
            ExitStatus::AssertionFailed
        } else {
            ExitStatus::Success
        }
    }
}
