//! Terminal rendering of execution results

use crate::results::{RequestResult, ResultStatus, RunSummary};
use crate::scripting::LogLevel;

const RULE: &str = "═══════════════════════════════════════════════════════════════════";

/// Human readable report of a collection run
pub fn format_run_results(collection: &str, summary: &RunSummary) -> String {
    let mut output = String::new();
    output.push('\n');
    output.push_str(RULE);
    output.push_str(&format!("\n  {}\n", collection));
    output.push_str(RULE);
    output.push_str("\n\n");

    for (i, result) in summary.results.iter().enumerate() {
        output.push_str(&format!("  {}. ", i + 1));
        push_result(&mut output, result);
    }

    output.push('\n');
    output.push_str(&format!(
        "  Requests: {} total, {} completed, {} failed",
        summary.total, summary.completed, summary.failed
    ));
    if summary.pending + summary.running > 0 {
        output.push_str(&format!(", {} not run", summary.pending + summary.running));
    }
    output.push('\n');
    output.push_str(&format!(
        "  Assertions: {} passed, {} failed\n",
        summary.assertions_passed, summary.assertions_failed
    ));
    output.push_str(&format!("  Progress: {:.0}%\n", summary.progress));
    output
}

/// Human readable report of a single request
pub fn format_request_result(result: &RequestResult) -> String {
    let mut output = String::new();
    push_result(&mut output, result);
    if let Some(response) = &result.response {
        if !response.data.is_empty() {
            let body = response
                .json()
                .and_then(|json| serde_json::to_string_pretty(&json).ok())
                .unwrap_or_else(|| response.data.clone());
            output.push('\n');
            output.push_str(&body);
            output.push('\n');
        }
    }
    output
}

/// One JSON line per result followed by a summary line
pub fn format_run_results_json(collection: &str, summary: &RunSummary) -> String {
    let mut output = String::new();

    for result in &summary.results {
        let json = serde_json::json!({
            "level": if is_passing(result) { "info" } else { "error" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "event": "request_result",
            "result": result,
        });
        output.push_str(&serde_json::to_string(&json).unwrap_or_default());
        output.push('\n');
    }

    let json = serde_json::json!({
        "level": if summary.has_failures() || summary.has_failed_assertions() {
            "error"
        } else {
            "info"
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "event": "run_summary",
        "collection": collection,
        "total": summary.total,
        "completed": summary.completed,
        "failed": summary.failed,
        "assertions_passed": summary.assertions_passed,
        "assertions_failed": summary.assertions_failed,
        "progress": summary.progress,
    });
    output.push_str(&serde_json::to_string(&json).unwrap_or_default());
    output.push('\n');
    output
}

fn is_passing(result: &RequestResult) -> bool {
    result.is_completed() && result.failed_assertions() == 0
}

fn push_result(output: &mut String, result: &RequestResult) {
    let icon = match result.status {
        ResultStatus::Pending | ResultStatus::Running => "…",
        _ if is_passing(result) => "✓",
        _ => "✗",
    };
    let status = match (&result.response, result.status) {
        (Some(response), _) => format!("{} {}", response.status, response.status_text),
        (None, ResultStatus::Pending) => "NOT RUN".to_string(),
        (None, ResultStatus::Running) => "RUNNING".to_string(),
        (None, _) => "---".to_string(),
    };

    output.push_str(&format!(
        "{} {} ({} {})\n",
        icon,
        result.name,
        result.method.as_str(),
        status.trim_end()
    ));
    output.push_str(&format!("      URL: {}\n", result.url));
    if let Some(ms) = result.duration_ms {
        output.push_str(&format!("      Time: {:.1} ms\n", ms));
    }
    if let Some(ref error) = result.error {
        output.push_str(&format!("      Error: {}\n", error));
    }
    for notification in &result.notifications {
        output.push_str(&format!("      Notice: {}\n", notification.message));
    }
    for assertion in &result.assertions {
        match (&assertion.passed, &assertion.error) {
            (true, _) => output.push_str(&format!("        ✓ {}\n", assertion.name)),
            (false, Some(error)) => {
                output.push_str(&format!("        ✗ {}: {}\n", assertion.name, error))
            }
            (false, None) => output.push_str(&format!("        ✗ {}\n", assertion.name)),
        }
    }
    for log in &result.logs {
        let level = match log.level {
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        output.push_str(&format!("      [{}] {}\n", level, log.message));
    }
}
