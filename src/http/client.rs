// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cancellable HTTP transport

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::{AbortHandle, Abortable};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use super::request::TransportRequest;
use super::response::TransportResponse;
use super::DEFAULT_USER_AGENT;
use crate::error::{Error, Result};
use crate::model::{HeaderEntry, TabId};

/// Identifies one in-flight call so it can be cancelled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Fresh id scoped to a tab
    pub fn new(tab: &TabId) -> Self {
        Self(format!("{}:{}", tab, uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sends requests and cancels them by correlation id
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one call; a cancelled call yields [`Error::TransportCancelled`]
    async fn send(&self, id: &CorrelationId, request: TransportRequest)
        -> Result<TransportResponse>;

    /// Abort the call registered under `id`; unknown ids are ignored
    fn cancel(&self, id: &CorrelationId);
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Default timeout
    pub timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Accept invalid certificates (dangerous!)
    pub accept_invalid_certs: bool,
    /// Proxy URL
    pub proxy: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            accept_invalid_certs: false,
            proxy: None,
        }
    }
}

/// Transport backed by reqwest
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpClientConfig,
    inflight: Arc<DashMap<CorrelationId, AbortHandle>>,
}

impl HttpTransport {
    /// Create a transport with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a transport with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(ref proxy_url) = config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?,
            );
        }

        Ok(Self {
            client: builder.build()?,
            config,
            inflight: Arc::new(DashMap::new()),
        })
    }

    /// Get client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Number of calls currently in flight
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let start = Instant::now();
        let url = request.url.to_string();

        let mut builder = self.client.request(request.method, request.url);
        for header in request.headers.iter() {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(&url, e.to_string()))?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                HeaderEntry::new(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(&url, e.to_string()))?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            url: final_url,
            time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Removes the abort handle once a call settles
struct InflightGuard<'a> {
    inflight: &'a DashMap<CorrelationId, AbortHandle>,
    id: &'a CorrelationId,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight.remove(self.id);
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        id: &CorrelationId,
        request: TransportRequest,
    ) -> Result<TransportResponse> {
        let url = request.url.to_string();
        let (handle, registration) = AbortHandle::new_pair();
        self.inflight.insert(id.clone(), handle);
        let _guard = InflightGuard {
            inflight: &self.inflight,
            id,
        };

        debug!(%id, method = %request.method, %url, "Sending request");
        match Abortable::new(self.execute(request), registration).await {
            Ok(Ok(response)) => {
                debug!(%id, status = response.status, time_ms = response.time_ms, "Response received");
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!(%id, %url, error = %e, "Request failed");
                Err(e)
            }
            Err(_aborted) => {
                debug!(%id, %url, "Request cancelled");
                Err(Error::cancelled(url))
            }
        }
    }

    fn cancel(&self, id: &CorrelationId) {
        if let Some((_, handle)) = self.inflight.remove(id) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.config().user_agent, DEFAULT_USER_AGENT);
        assert_eq!(transport.inflight(), 0);
    }

    #[test]
    fn test_correlation_ids_are_unique_per_tab() {
        let tab = TabId::new("tab-1");
        let a = CorrelationId::new(&tab);
        let b = CorrelationId::new(&tab);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("tab-1:"));
    }

    #[test]
    fn test_cancel_unknown_id_is_noop() {
        let transport = HttpTransport::new().unwrap();
        transport.cancel(&CorrelationId::new(&TabId::new("t")));
    }
}
