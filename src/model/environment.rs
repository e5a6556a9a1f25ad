// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Environments and the store that owns the active one

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::request::KeyValue;

/// A single environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Variables of one environment, unique by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentSnapshot {
    variables: Vec<Variable>,
}

impl EnvironmentSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    /// Insert or update a variable
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.variables.iter_mut().find(|v| v.name == name) {
            Some(existing) => existing.value = value,
            None => self.variables.push(Variable { name, value }),
        }
    }

    /// Remove a variable, returning its old value
    pub fn unset(&mut self, name: &str) -> Option<String> {
        let idx = self.variables.iter().position(|v| v.name == name)?;
        Some(self.variables.remove(idx).value)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for EnvironmentSnapshot {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut snapshot = EnvironmentSnapshot::new();
        for (name, value) in iter {
            snapshot.set(name, value);
        }
        snapshot
    }
}

/// A named environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub name: String,
    pub variables: EnvironmentSnapshot,
    /// Default headers, consulted after collection defaults
    pub headers: Vec<KeyValue>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_variables(mut self, variables: EnvironmentSnapshot) -> Self {
        self.variables = variables;
        self
    }
}

/// Owner of the active environment.
///
/// Scripts never see the store; their mutations are flushed through
/// [`EnvironmentStore::update`] once a script finishes.
pub trait EnvironmentStore: Send + Sync {
    /// Snapshot of the active environment
    fn active(&self) -> Environment;

    /// Replace the active environment's variables
    fn update(&self, variables: EnvironmentSnapshot);
}

/// Environment store kept in memory
#[derive(Debug, Default)]
pub struct MemoryEnvironmentStore {
    active: RwLock<Environment>,
}

impl MemoryEnvironmentStore {
    pub fn new(environment: Environment) -> Self {
        Self {
            active: RwLock::new(environment),
        }
    }

    /// Current value of a variable
    pub fn get(&self, name: &str) -> Option<String> {
        self.active.read().variables.get(name).map(String::from)
    }
}

impl EnvironmentStore for MemoryEnvironmentStore {
    fn active(&self) -> Environment {
        self.active.read().clone()
    }

    fn update(&self, variables: EnvironmentSnapshot) {
        self.active.write().variables = variables;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_unique_by_name() {
        let mut env = EnvironmentSnapshot::new();
        env.set("host", "a");
        env.set("token", "t");
        env.set("host", "b");
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("host"), Some("b"));

        assert_eq!(env.unset("token").as_deref(), Some("t"));
        assert_eq!(env.unset("token"), None);
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_snapshot_json_is_a_list() {
        let env: EnvironmentSnapshot = vec![("a", "1")].into_iter().collect();
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, r#"[{"name":"a","value":"1"}]"#);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryEnvironmentStore::new(Environment::new("dev"));
        let mut vars = store.active().variables;
        vars.set("x", "1");
        store.update(vars);
        assert_eq!(store.get("x").as_deref(), Some("1"));
        assert_eq!(store.active().name, "dev");
    }
}
