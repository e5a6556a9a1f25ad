// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Capturing pre-request response data into variables

use serde_json::Value;
use tracing::{debug, info};

use crate::console::{ConsoleEntry, ConsoleSink};
use crate::error::{Error, Result};
use crate::model::{CaptureRule, CaptureSource, EnvironmentSnapshot, ResponseSnapshot};

/// Value a rule selects from a response.
///
/// Body rules read one top-level JSON key; strings are taken as-is, anything
/// else as its JSON text. Header rules match the name case-insensitively.
pub fn capture(rule: &CaptureRule, response: &ResponseSnapshot) -> Result<String> {
    let not_found = || Error::CaptureFailure {
        origin: rule.source,
        path: rule.path.clone(),
    };

    match rule.source {
        CaptureSource::Body => match response.body.get(rule.path.as_str()) {
            None | Some(Value::Null) => Err(not_found()),
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => Ok(other.to_string()),
        },
        CaptureSource::Header => response
            .header(&rule.path)
            .map(String::from)
            .ok_or_else(not_found),
    }
}

/// Apply every rule to `environment`.
///
/// A rule that finds nothing logs a console error and stores an empty value.
/// Returns how many rules found their value.
pub fn apply_captures(
    rules: &[CaptureRule],
    response: &ResponseSnapshot,
    environment: &mut EnvironmentSnapshot,
    console: &dyn ConsoleSink,
) -> usize {
    let mut found = 0;
    for rule in rules.iter().filter(|r| !r.variable.trim().is_empty()) {
        match capture(rule, response) {
            Ok(value) => {
                debug!(variable = %rule.variable, source = %rule.source, "Captured value");
                environment.set(rule.variable.clone(), value);
                found += 1;
            }
            Err(e) => {
                info!(variable = %rule.variable, error = %e, "Capture failed");
                console.append(ConsoleEntry::error(e.to_string(), None));
                environment.set(rule.variable.clone(), String::new());
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HeaderEntry;
    use parking_lot::Mutex;

    fn response() -> ResponseSnapshot {
        ResponseSnapshot::new(
            200,
            vec![HeaderEntry::new("X-Request-Id", "r-9")],
            r#"{"access_token":"abc","expires_in":3600,"user":{"id":1},"none":null}"#,
        )
    }

    #[test]
    fn test_body_capture() {
        let response = response();
        assert_eq!(
            capture(&CaptureRule::body("access_token", "t"), &response).unwrap(),
            "abc"
        );
        assert_eq!(
            capture(&CaptureRule::body("expires_in", "t"), &response).unwrap(),
            "3600"
        );
        assert_eq!(
            capture(&CaptureRule::body("user", "t"), &response).unwrap(),
            r#"{"id":1}"#
        );
    }

    #[test]
    fn test_nested_paths_are_not_walked() {
        let err = capture(&CaptureRule::body("user.id", "t"), &response()).unwrap_err();
        assert!(matches!(err, Error::CaptureFailure { .. }));
        assert!(!err.aborts_run());
    }

    #[test]
    fn test_header_capture_ignores_case() {
        assert_eq!(
            capture(&CaptureRule::header("x-request-id", "rid"), &response()).unwrap(),
            "r-9"
        );
    }

    #[test]
    fn test_failed_capture_sets_empty_value() {
        let console = Mutex::new(Vec::new());
        let mut env: EnvironmentSnapshot = vec![("token", "old")].into_iter().collect();
        let rules = vec![
            CaptureRule::body("access_token", "access"),
            CaptureRule::body("missing", "token"),
            CaptureRule::body("none", "empty"),
        ];

        let found = apply_captures(&rules, &response(), &mut env, &console);
        assert_eq!(found, 1);
        assert_eq!(env.get("access"), Some("abc"));
        assert_eq!(env.get("token"), Some(""));
        assert_eq!(env.get("empty"), Some(""));

        let console = console.into_inner();
        assert_eq!(console.len(), 2);
        assert!(console.iter().all(|e| e.is_error()));
    }

    #[test]
    fn test_text_body_has_no_keys() {
        let response = ResponseSnapshot::new(200, vec![], "plain");
        assert!(capture(&CaptureRule::body("plain", "x"), &response).is_err());
    }
}
