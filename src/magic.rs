//! Dynamic tokens
//!
//! Placeholders resolved at send time to freshly generated values:
//! - `{{$randomInt}}` - Random integer in `[0, 1000)`
//! - `{{$timestamp}}` - Current Unix time in milliseconds
//! - `{{$guid}}` - Random UUID v4
//!
//! Every occurrence is generated independently, so `{{$guid}}-{{$guid}}`
//! expands to two different identifiers.

use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};
use uuid::Uuid;

// Cached regex patterns to avoid recompilation in hot paths
static DYNAMIC_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\$([A-Za-z]+)\}\}").expect("dynamic token pattern is valid")
});

/// Upper bound (exclusive) for `$randomInt`
pub const RANDOM_INT_MAX: u32 = 1000;

/// Expand every known dynamic token; unknown `{{$name}}` stays verbatim
pub fn expand_dynamic_tokens(input: &str) -> String {
    if !input.contains("{{$") {
        return input.to_string();
    }

    DYNAMIC_TOKEN_RE
        .replace_all(input, |caps: &Captures| {
            generate_dynamic_value(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Generate a value for a token name (without the `$`)
fn generate_dynamic_value(name: &str) -> Option<String> {
    match name {
        "randomInt" => Some(rand::rng().random_range(0..RANDOM_INT_MAX).to_string()),
        "timestamp" => Some(Utc::now().timestamp_millis().to_string()),
        "guid" => Some(Uuid::new_v4().to_string()),
        _ => None,
    }
}
