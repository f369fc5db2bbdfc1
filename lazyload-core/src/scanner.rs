//! Annotation scanner.
//!
//! Finds `@directive value[, value...]` annotations in fetched payloads. The
//! value list ends at the end of the line, so a directive closing a comment
//! block (`@resources a.js */`) stops before the terminator.

use once_cell::sync::Lazy;
use regex::Regex;

static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"@(\w+)[ \t]+([\w./:\-]+(?:[ \t]*,[ \t]*[\w./:\-]+)*)",
    )
    .expect("directive regex should compile")
});

/// One annotation occurrence, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub values: Vec<String>,
}

/// Extracts every allowed directive from `payload`.
///
/// Directives outside `allowed` are skipped. A directive token with no value
/// after it never matches and is dropped.
pub fn scan<S: AsRef<str>>(payload: &str, allowed: &[S]) -> Vec<Directive> {
    DIRECTIVE
        .captures_iter(payload)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            if !allowed.iter().any(|a| a.as_ref() == name) {
                return None;
            }
            let values: Vec<String> = caps
                .get(2)?
                .as_str()
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            (!values.is_empty()).then(|| Directive {
                name: name.to_string(),
                values,
            })
        })
        .collect()
}
