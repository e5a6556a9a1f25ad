// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Final header composition

use crate::http::headers::{AUTHORIZATION, CONTENT_TYPE, COOKIE, USER_AGENT};
use crate::model::{HeaderList, RequestSnapshot};

/// Everything besides the request's own headers that can contribute
#[derive(Debug, Clone, Default)]
pub struct HeaderSources {
    pub user_agent: String,
    /// `Authorization` value produced by the request's auth
    pub authorization: Option<String>,
    /// Serialized cookie jar value, when cookie management is on
    pub cookie: Option<String>,
    /// Default header layers, highest precedence first
    pub defaults: Vec<Vec<(String, String)>>,
}

fn carries_body(method: &str) -> bool {
    !method.eq_ignore_ascii_case("GET") && !method.eq_ignore_ascii_case("HEAD")
}

/// Compose the headers actually sent.
///
/// Explicit request headers come first, then `User-Agent` and `Content-Type`
/// if unset, then auth (which replaces an explicit `Authorization`), then the
/// jar's `Cookie` if unset. Default layers fill any name still missing.
pub fn compose(request: &RequestSnapshot, sources: HeaderSources) -> HeaderList {
    let mut headers = request.headers.clone();

    if !sources.user_agent.is_empty() {
        headers.insert_if_absent(USER_AGENT, sources.user_agent);
    }

    if carries_body(&request.method) {
        if let Some(content_type) = request.body.content_type() {
            headers.insert_if_absent(CONTENT_TYPE, content_type);
        }
    }

    if let Some(authorization) = sources.authorization {
        headers.insert(AUTHORIZATION, authorization);
    }

    if let Some(cookie) = sources.cookie.filter(|c| !c.is_empty()) {
        headers.insert_if_absent(COOKIE, cookie);
    }

    for layer in sources.defaults {
        for (name, value) in layer {
            headers.insert_if_absent(name, value);
        }
    }

    headers
}
