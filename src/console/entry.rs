// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Console entry types

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ScriptStage;
use crate::model::{RequestSnapshot, ResponseSnapshot};

/// Severity of a script console line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLevel {
    Log,
    Error,
}

/// Which part of a run issued an HTTP call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallOrigin {
    /// The tab's own request
    Main,
    /// The collection pre-request
    PreRequest,
    /// An `http.*` call made by a script
    Script,
}

/// How an HTTP call ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CallOutcome {
    Response { response: ResponseSnapshot },
    Failure { reason: String },
    Cancelled,
}

/// One HTTP call as shown in the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpCallRecord {
    pub method: String,
    pub url: String,
    /// Absent unless a response arrived
    pub status: Option<u16>,
    pub time_ms: u64,
    pub request: RequestSnapshot,
    pub origin: CallOrigin,
    #[serde(flatten)]
    pub outcome: CallOutcome,
}

impl HttpCallRecord {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, CallOutcome::Cancelled)
    }
}

/// A console entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConsoleEntry {
    HttpCall(HttpCallRecord),
    #[serde(rename_all = "camelCase")]
    ScriptMessage {
        level: ScriptLevel,
        text: String,
        /// Wall-clock time the line was recorded, epoch milliseconds
        time_ms: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<ScriptStage>,
    },
}

impl ConsoleEntry {
    /// Script line stamped with the current time
    pub fn script(level: ScriptLevel, text: impl Into<String>, stage: Option<ScriptStage>) -> Self {
        ConsoleEntry::ScriptMessage {
            level,
            text: text.into(),
            time_ms: Utc::now().timestamp_millis(),
            stage,
        }
    }

    pub fn log(text: impl Into<String>, stage: Option<ScriptStage>) -> Self {
        Self::script(ScriptLevel::Log, text, stage)
    }

    pub fn error(text: impl Into<String>, stage: Option<ScriptStage>) -> Self {
        Self::script(ScriptLevel::Error, text, stage)
    }

    pub fn as_http_call(&self) -> Option<&HttpCallRecord> {
        match self {
            ConsoleEntry::HttpCall(record) => Some(record),
            _ => None,
        }
    }

    /// Text of a script line
    pub fn text(&self) -> Option<&str> {
        match self {
            ConsoleEntry::ScriptMessage { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            ConsoleEntry::ScriptMessage { level, .. } => *level == ScriptLevel::Error,
            ConsoleEntry::HttpCall(record) => !matches!(record.outcome, CallOutcome::Response { .. }),
        }
    }
}
