// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Placeholder substitution
//!
//! `{name}` is replaced from the request's path params, then `{{name}}` from
//! the environment. Anything that does not resolve is left as written.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::model::{Auth, KeyValue, RequestSnapshot, Variable};

lazy_static! {
    /// One or more braces around a name; only single-brace forms are path params
    static ref BRACED: Regex = Regex::new(r"(\{+)([^{}]+)(\}+)").unwrap();
    static ref VARIABLE: Regex = Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap();
}

/// Replace `{name}` placeholders with enabled path params
pub fn substitute_path_params(input: &str, params: &[KeyValue]) -> String {
    if params.is_empty() || !input.contains('{') {
        return input.to_string();
    }

    BRACED
        .replace_all(input, |caps: &Captures| {
            let whole = caps[0].to_string();
            if caps[1].len() != 1 || caps[3].len() != 1 {
                return whole;
            }
            params
                .iter()
                .find(|p| p.enabled && p.name == caps[2])
                .map(|p| p.value.clone())
                .unwrap_or(whole)
        })
        .into_owned()
}

/// Replace `{{name}}` placeholders with environment variables
pub fn substitute_variables(input: &str, variables: &[Variable]) -> String {
    if variables.is_empty() || !input.contains("{{") {
        return input.to_string();
    }

    VARIABLE
        .replace_all(input, |caps: &Captures| {
            variables
                .iter()
                .find(|v| v.name == caps[1])
                .map(|v| v.value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Resolver bound to one set of path params and variables
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    path_params: &'a [KeyValue],
    variables: &'a [Variable],
}

impl<'a> Resolver<'a> {
    pub fn new(path_params: &'a [KeyValue], variables: &'a [Variable]) -> Self {
        Self {
            path_params,
            variables,
        }
    }

    /// Resolver with environment variables only
    pub fn variables_only(variables: &'a [Variable]) -> Self {
        Self::new(&[], variables)
    }

    /// Resolve a single string
    pub fn resolve(&self, input: &str) -> String {
        let with_params = substitute_path_params(input, self.path_params);
        substitute_variables(&with_params, self.variables)
    }

    /// Resolve every user-authored string in a request snapshot
    pub fn resolve_request(&self, request: &RequestSnapshot) -> RequestSnapshot {
        request.map_values(|s| self.resolve(s))
    }

    /// Resolve auth credentials
    pub fn resolve_auth(&self, auth: &Auth) -> Auth {
        auth.map_values(|s| self.resolve(s))
    }

    /// Resolve a key/value list, keeping only enabled entries
    pub fn resolve_pairs(&self, pairs: &[KeyValue]) -> Vec<(String, String)> {
        pairs
            .iter()
            .filter(|p| p.enabled && !p.name.trim().is_empty())
            .map(|p| (self.resolve(&p.name), self.resolve(&p.value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<Variable> {
        pairs.iter().map(|(n, v)| Variable::new(*n, *v)).collect()
    }

    #[test]
    fn test_variables() {
        let env = vars(&[("host", "api.example.com"), ("v", "2")]);
        assert_eq!(
            substitute_variables("https://{{host}}/v{{ v }}/users", &env),
            "https://api.example.com/v2/users"
        );
    }

    #[test]
    fn test_unresolved_left_verbatim() {
        let env = vars(&[("host", "example.com")]);
        assert_eq!(
            substitute_variables("{{host}}/{{missing}}", &env),
            "example.com/{{missing}}"
        );
        assert_eq!(substitute_variables("{{missing}}", &[]), "{{missing}}");
    }

    #[test]
    fn test_path_params_do_not_touch_variables() {
        let params = vec![KeyValue::new("id", "42"), KeyValue::new("token", "p")];
        assert_eq!(
            substitute_path_params("/users/{id}?t={{token}}", &params),
            "/users/42?t={{token}}"
        );
        assert_eq!(substitute_path_params("/users/{other}", &params), "/users/{other}");
    }

    #[test]
    fn test_disabled_path_param_ignored() {
        let params = vec![KeyValue::new("id", "42").disabled()];
        assert_eq!(substitute_path_params("/users/{id}", &params), "/users/{id}");
    }

    #[test]
    fn test_path_params_first_then_variables() {
        let params = vec![KeyValue::new("id", "{{user}}")];
        let env = vars(&[("user", "alice"), ("base", "https://example.com")]);
        let resolver = Resolver::new(&params, &env);
        assert_eq!(
            resolver.resolve("{{base}}/users/{id}"),
            "https://example.com/users/alice"
        );
    }

    #[test]
    fn test_resolve_auth() {
        let env = vars(&[("token", "secret")]);
        let resolver = Resolver::variables_only(&env);
        let auth = resolver.resolve_auth(&Auth::Bearer {
            token: "{{token}}".into(),
            prefix: None,
            disabled: false,
        });
        assert_eq!(auth.header_value().as_deref(), Some("Bearer secret"));
    }
}
