//! `{{name}}` placeholder expansion
//!
//! Static variables are substituted first, in the order they are listed,
//! then dynamic tokens (see [`crate::magic`]). Placeholders that match
//! nothing are left as they were, and unbalanced braces are plain text.

use crate::magic::expand_dynamic_tokens;
use crate::variables::Variable;

/// Expand placeholders in `text` using `variables`, then dynamic tokens
pub fn interpolate(text: &str, variables: &[Variable]) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut result = text.to_string();
    for variable in variables {
        if variable.key.is_empty() || !result.contains("{{") {
            continue;
        }
        let placeholder = format!("{{{{{}}}}}", variable.key);
        if result.contains(&placeholder) {
            result = result.replace(&placeholder, &variable.value);
        }
    }

    expand_dynamic_tokens(&result)
}

/// Placeholder names in `text` that no variable in `variables` resolves.
///
/// Dynamic tokens are never reported.
pub fn unresolved_placeholders(text: &str, variables: &[Variable]) -> Vec<String> {
    let mut missing = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = &after[..end];
        if !name.starts_with('$')
            && !variables.iter().any(|v| v.key == name)
            && !missing.iter().any(|m: &String| m == name)
        {
            missing.push(name.to_string());
        }
        rest = &after[end + 2..];
    }
    missing
}
