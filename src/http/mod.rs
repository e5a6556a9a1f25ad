// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer for Kuriiri
//!
//! A cancellable transport over reqwest plus the cookie jar the runner
//! feeds from `Set-Cookie` headers.

mod client;
mod cookie;
mod request;
mod response;

pub use client::{CorrelationId, HttpClientConfig, HttpTransport, Transport};
pub use cookie::{domain_matches, Cookie, CookieJar};
pub use request::TransportRequest;
pub use response::TransportResponse;

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("Kuriiri/", env!("CARGO_PKG_VERSION"));

/// Common HTTP headers
pub mod headers {
    pub const AUTHORIZATION: &str = "authorization";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const COOKIE: &str = "cookie";
    pub const SET_COOKIE: &str = "set-cookie";
    pub const USER_AGENT: &str = "user-agent";
}
