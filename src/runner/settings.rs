// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Runner settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, DEFAULT_USER_AGENT};
use crate::js::{SandboxHost, ScriptRuntimeConfig};
use crate::model::KeyValue;

/// Persisted settings the pipeline reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// User-Agent sent when a request sets none
    pub user_agent: String,
    /// Wall-clock budget per script
    pub script_timeout_ms: u64,
    /// Send and store cookies
    pub cookie_management: bool,
    /// Transport timeout per call
    pub request_timeout_ms: u64,
    /// Proxy URL
    pub proxy: Option<String>,
    /// Accept invalid TLS certificates
    pub accept_invalid_certs: bool,
    /// Workspace default headers
    pub workspace_headers: Vec<KeyValue>,
    /// Global default headers, consulted last
    pub global_headers: Vec<KeyValue>,
    /// Per-loop iteration cap inside scripts
    pub loop_iteration_limit: u64,
    /// Call depth cap inside scripts
    pub recursion_limit: usize,
    /// Binary started for sandbox processes; the running executable if unset
    pub sandbox_program: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let script = ScriptRuntimeConfig::default();
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            script_timeout_ms: script.timeout.as_millis() as u64,
            cookie_management: true,
            request_timeout_ms: 30_000,
            proxy: None,
            accept_invalid_certs: false,
            workspace_headers: vec![],
            global_headers: vec![],
            loop_iteration_limit: script.loop_iteration_limit,
            recursion_limit: script.recursion_limit,
            sandbox_program: None,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the script timeout
    pub fn script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable/disable cookie handling
    pub fn cookie_management(mut self, enabled: bool) -> Self {
        self.cookie_management = enabled;
        self
    }

    /// Set the transport timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Add a workspace default header
    pub fn workspace_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.workspace_headers.push(KeyValue::new(name, value));
        self
    }

    /// Add a global default header
    pub fn global_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_headers.push(KeyValue::new(name, value));
        self
    }

    /// Set the binary started for sandbox processes
    pub fn sandbox_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.sandbox_program = Some(program.into());
        self
    }

    /// Sandbox configuration derived from these settings
    pub fn script_runtime(&self) -> ScriptRuntimeConfig {
        let host = match &self.sandbox_program {
            Some(program) => SandboxHost::Process {
                program: program.clone(),
            },
            None => SandboxHost::default(),
        };
        ScriptRuntimeConfig {
            timeout: Duration::from_millis(self.script_timeout_ms),
            loop_iteration_limit: self.loop_iteration_limit,
            recursion_limit: self.recursion_limit,
            host,
        }
    }

    /// Transport configuration derived from these settings
    pub fn http_client(&self) -> HttpClientConfig {
        HttpClientConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_millis(self.request_timeout_ms),
            accept_invalid_certs: self.accept_invalid_certs,
            proxy: self.proxy.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.script_timeout_ms, 60_000);
        assert!(settings.cookie_management);
        assert_eq!(settings.script_runtime().timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_builder() {
        let settings = Settings::new()
            .script_timeout(Duration::from_millis(250))
            .cookie_management(false)
            .global_header("X-Global", "1");
        assert_eq!(settings.script_runtime().timeout, Duration::from_millis(250));
        assert!(!settings.cookie_management);
        assert_eq!(settings.global_headers[0].name, "X-Global");
    }

    #[test]
    fn test_sandbox_program() {
        let settings = Settings::new().sandbox_program("/opt/kuriiri/bin/kuriiri");
        assert_eq!(
            settings.script_runtime().host,
            SandboxHost::Process {
                program: PathBuf::from("/opt/kuriiri/bin/kuriiri")
            }
        );

        let settings: Settings = serde_json::from_str(r#"{"sandboxProgram": "/usr/bin/kuriiri"}"#).unwrap();
        assert_eq!(settings.sandbox_program, Some(PathBuf::from("/usr/bin/kuriiri")));
    }

    #[test]
    fn test_from_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"scriptTimeoutMs": 1500, "workspaceHeaders": [{{"name": "X-W", "value": "w"}}]}}"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.script_timeout_ms, 1500);
        assert_eq!(settings.workspace_headers.len(), 1);
        assert!(settings.workspace_headers[0].enabled);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            Settings::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
