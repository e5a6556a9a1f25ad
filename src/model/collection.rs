// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Collection-level settings that wrap every request in the collection

use std::fmt;

use serde::{Deserialize, Serialize};

use super::request::{KeyValue, RequestBody};

/// Collection scripts, default headers and the optional pre-request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub pre_script: Option<String>,
    pub post_script: Option<String>,
    pub pre_request: Option<PreRequest>,
    /// Default headers; fill names the request left unset
    pub headers: Vec<KeyValue>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn pre_script(mut self, script: impl Into<String>) -> Self {
        self.pre_script = Some(script.into());
        self
    }

    pub fn post_script(mut self, script: impl Into<String>) -> Self {
        self.post_script = Some(script.into());
        self
    }

    pub fn pre_request(mut self, pre_request: PreRequest) -> Self {
        self.pre_request = Some(pre_request);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(KeyValue::new(name, value));
        self
    }
}

/// Auxiliary call made before the main request to seed variables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreRequest {
    pub active: bool,
    pub method: String,
    pub url: String,
    pub headers: Vec<KeyValue>,
    pub query_params: Vec<KeyValue>,
    pub body: RequestBody,
    #[serde(rename = "dataToCapture")]
    pub captures: Vec<CaptureRule>,
}

impl PreRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            active: true,
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn capture(mut self, rule: CaptureRule) -> Self {
        self.captures.push(rule);
        self
    }

    /// Active with a non-empty URL
    pub fn is_runnable(&self) -> bool {
        self.active && !self.url.trim().is_empty()
    }
}

/// Where a capture rule looks for its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    Body,
    Header,
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Body => f.write_str("body"),
            CaptureSource::Header => f.write_str("header"),
        }
    }
}

/// Extract one value from the pre-request response into a variable.
///
/// Body paths are a single top-level JSON key; nested paths are not walked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRule {
    #[serde(rename = "type")]
    pub source: CaptureSource,
    pub path: String,
    #[serde(rename = "setEnvVar")]
    pub variable: String,
}

impl CaptureRule {
    pub fn body(path: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            source: CaptureSource::Body,
            path: path.into(),
            variable: variable.into(),
        }
    }

    pub fn header(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            source: CaptureSource::Header,
            path: name.into(),
            variable: variable.into(),
        }
    }
}
