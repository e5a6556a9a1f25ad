// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! The execution context scripts observe and mutate
//!
//! Everything here crosses the sandbox boundary as JSON, so the serde shape
//! is the script-facing API: `request.headers['X-Token']`,
//! `response.body.id`, `response.rawBody`.

use serde::{Deserialize, Serialize};
use url::Url;

use super::headers::{HeaderEntry, HeaderList};
use super::request::{KeyValue, RequestDefinition};
use crate::error::Result;

/// Request body as scripts see it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ScriptBody {
    #[default]
    None,
    Raw {
        #[serde(rename = "contentType", default)]
        content_type: String,
        #[serde(default)]
        text: String,
    },
}

impl ScriptBody {
    pub fn is_none(&self) -> bool {
        matches!(self, ScriptBody::None)
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            ScriptBody::Raw { content_type, .. } if !content_type.is_empty() => {
                Some(content_type)
            }
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ScriptBody::None => None,
            ScriptBody::Raw { text, .. } => Some(text),
        }
    }
}

/// The request as it will be (or was) sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HeaderList,
    #[serde(default)]
    pub query_params: Vec<KeyValue>,
    #[serde(default)]
    pub body: ScriptBody,
}

impl RequestSnapshot {
    /// Build from a definition without resolving any placeholders
    pub fn from_definition(definition: &RequestDefinition) -> Self {
        Self {
            method: definition.method.to_uppercase(),
            url: definition.url.clone(),
            headers: definition
                .headers
                .iter()
                .filter(|h| h.enabled && !h.name.trim().is_empty())
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect(),
            query_params: definition.query_params.clone(),
            body: definition.body.to_script_body(),
        }
    }

    /// Apply `f` to every user-authored string
    pub fn map_values(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            method: self.method.clone(),
            url: f(&self.url),
            headers: self
                .headers
                .iter()
                .map(|h| (f(&h.name), f(&h.value)))
                .collect(),
            query_params: self
                .query_params
                .iter()
                .map(|p| KeyValue {
                    name: f(&p.name),
                    value: f(&p.value),
                    enabled: p.enabled,
                })
                .collect(),
            body: match &self.body {
                ScriptBody::None => ScriptBody::None,
                ScriptBody::Raw { content_type, text } => ScriptBody::Raw {
                    content_type: content_type.clone(),
                    text: f(text),
                },
            },
        }
    }

    /// URL with the enabled query params appended
    pub fn final_url(&self) -> Result<String> {
        let raw = self.url.trim();
        let mut url = if raw.contains("://") {
            Url::parse(raw)?
        } else {
            Url::parse(&format!("http://{}", raw))?
        };

        let enabled: Vec<_> = self
            .query_params
            .iter()
            .filter(|p| p.enabled && !p.name.is_empty())
            .collect();
        if !enabled.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for param in enabled {
                pairs.append_pair(&param.name, &param.value);
            }
        }

        Ok(url.to_string())
    }
}

/// The response as scripts see it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    /// Parsed JSON when the body is JSON, the raw text otherwise
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub raw_body: String,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: Vec<HeaderEntry>, raw_body: impl Into<String>) -> Self {
        let raw_body = raw_body.into();
        let body = serde_json::from_str(&raw_body)
            .unwrap_or_else(|_| serde_json::Value::String(raw_body.clone()));
        Self {
            status,
            headers,
            body,
            raw_body,
        }
    }

    /// First header value with the given name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Request plus, for post-scripts, the response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub request: RequestSnapshot,
    /// Absent while pre-scripts run
    #[serde(default)]
    pub response: Option<ResponseSnapshot>,
}

impl ExecutionContext {
    /// Context for a pre-script
    pub fn pre(request: RequestSnapshot) -> Self {
        Self {
            request,
            response: None,
        }
    }

    /// Context for a post-script
    pub fn post(request: RequestSnapshot, response: ResponseSnapshot) -> Self {
        Self {
            request,
            response: Some(response),
        }
    }
}
