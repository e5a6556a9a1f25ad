// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Outgoing request handed to a transport

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use url::Url;

use crate::error::{Error, Result};
use crate::model::{HeaderList, RequestSnapshot};

/// A fully resolved HTTP request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Request method
    pub method: Method,
    /// Request URL, query params already applied
    pub url: Url,
    /// Request headers, in send order
    pub headers: HeaderList,
    /// Request body
    pub body: Option<Bytes>,
    /// Per-request timeout, falls back to the client default
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Create a request with arbitrary method
    pub fn new(method: &str, url: impl AsRef<str>) -> Result<Self> {
        let method = Method::from_bytes(method.trim().to_uppercase().as_bytes())
            .map_err(|_| Error::transport(url.as_ref(), format!("invalid method '{}'", method)))?;
        Ok(Self {
            method,
            url: Url::parse(url.as_ref())?,
            headers: HeaderList::new(),
            body: None,
            timeout: None,
        })
    }

    /// Build from a resolved snapshot.
    ///
    /// GET and HEAD never carry a body.
    pub fn from_snapshot(snapshot: &RequestSnapshot) -> Result<Self> {
        let mut request = Self::new(&snapshot.method, snapshot.final_url()?)?;
        request.headers = snapshot.headers.clone();
        if request.allows_body() {
            request.body = snapshot.body.text().map(|t| Bytes::from(t.to_string()));
        }
        Ok(request)
    }

    /// Set a header, replacing any existing value
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether this method may carry a body
    pub fn allows_body(&self) -> bool {
        self.method != Method::GET && self.method != Method::HEAD
    }

    /// Get the URL as string
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }
}
