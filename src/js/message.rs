// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Messages exchanged with the sandbox
//!
//! Both directions are JSON objects tagged by `type`; nothing else crosses
//! the boundary.

use serde::{Deserialize, Serialize};

use crate::console::ScriptLevel;
use crate::model::{HeaderList, RequestSnapshot, ResponseSnapshot};

/// Posted by the script side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SandboxMessage {
    Log {
        level: ScriptLevel,
        text: String,
    },
    EnvSet {
        name: String,
        value: String,
    },
    EnvUnset {
        name: String,
    },
    HttpRequest {
        id: String,
        method: String,
        url: String,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        headers: HeaderList,
    },
    ExecutionComplete {
        request: RequestSnapshot,
        #[serde(default)]
        response: Option<ResponseSnapshot>,
    },
    ExecutionError {
        error: String,
    },
}

impl SandboxMessage {
    /// Whether this message ends the execution
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SandboxMessage::ExecutionComplete { .. } | SandboxMessage::ExecutionError { .. }
        )
    }
}

/// Posted by the host in reply to an `http-request`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    HttpResponse { id: String, response: ResponseSnapshot },
    HttpFailure { id: String, error: String },
}
