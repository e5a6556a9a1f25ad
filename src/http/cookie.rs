// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cookie jar derived from `Set-Cookie` response headers

use chrono::{DateTime, NaiveDateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::model::HeaderEntry;

/// A single HTTP cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie belongs to, leading dot kept as sent
    pub domain: String,
    /// Path the cookie is valid for
    pub path: String,
    /// Expiration time (None = session cookie)
    pub expires: Option<DateTime<Utc>>,
    /// HttpOnly flag
    pub http_only: bool,
    /// SameSite attribute as sent
    pub same_site: String,
}

impl Cookie {
    /// Create a new cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            same_site: String::new(),
        }
    }

    /// Set the domain
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set expiration time
    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Check if the cookie is expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(false, |exp| exp <= now)
    }

    /// Check if the cookie applies to the given URL
    pub fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or("");
        if !domain_matches(&self.domain, host) {
            return false;
        }

        self.path == "/" || url.path().starts_with(&self.path)
    }

    /// Parse a Set-Cookie header value.
    ///
    /// Returns `None` when the first segment has no `=` or an empty name.
    pub fn parse(header: &str, origin: &Url) -> Option<Self> {
        let mut parts = header.split(';');
        let first = parts.next()?.trim();

        let (name, value) = first.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(name, value.trim());

        let mut domain = None;
        for part in parts {
            let part = part.trim();
            let (attr, val) = match part.split_once('=') {
                Some((attr, val)) => (attr.trim().to_lowercase(), val.trim()),
                None => (part.to_lowercase(), ""),
            };
            match attr.as_str() {
                "expires" => {
                    if let Some(dt) = parse_cookie_date(val) {
                        cookie.expires = Some(dt);
                    }
                }
                "max-age" => {
                    if let Ok(secs) = val.parse::<i64>() {
                        cookie.expires = max_age_expiry(secs);
                    }
                }
                "domain" if !val.is_empty() => domain = Some(val.to_lowercase()),
                "path" if !val.is_empty() => cookie.path = val.to_string(),
                "samesite" => cookie.same_site = val.to_string(),
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        cookie.domain = domain.unwrap_or_else(|| origin.host_str().unwrap_or("").to_lowercase());
        Some(cookie)
    }

    /// Convert to cookie header format
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Expiry for a `Max-Age` value.
///
/// Values past what chrono can represent saturate: a huge positive age never
/// expires, a huge negative one is already expired.
fn max_age_expiry(secs: i64) -> Option<DateTime<Utc>> {
    let now = Utc::now();
    match chrono::Duration::try_seconds(secs).and_then(|age| now.checked_add_signed(age)) {
        Some(expires) => Some(expires),
        None if secs > 0 => None,
        None => Some(DateTime::<Utc>::MIN_UTC),
    }
}

/// Check whether a stored cookie domain applies to a host.
///
/// Matches on exact equality, on a leading-dot suffix, or when the two
/// only differ by a `www.` prefix.
pub fn domain_matches(cookie_domain: &str, host: &str) -> bool {
    let cookie_domain = cookie_domain.to_lowercase();
    let host = host.to_lowercase();

    if cookie_domain == host {
        return true;
    }

    if cookie_domain.starts_with('.') && host.ends_with(&cookie_domain) {
        return true;
    }

    let has_www = cookie_domain.starts_with("www.") || host.starts_with("www.");
    has_www && strip_www(&cookie_domain) == strip_www(&host)
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Netscape style: "Wed, 21-Oct-2026 07:28:00 GMT"
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d %b %Y %H:%M:%S GMT"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Thread-safe cookie storage, keyed by domain then name
#[derive(Debug, Clone)]
pub struct CookieJar {
    /// Cookies stored by domain
    cookies: Arc<DashMap<String, Vec<Cookie>>>,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar {
    /// Create a new empty cookie jar
    pub fn new() -> Self {
        Self {
            cookies: Arc::new(DashMap::new()),
        }
    }

    /// Upsert a cookie by (name, domain)
    pub fn add(&self, cookie: Cookie) {
        let mut entry = self.cookies.entry(cookie.domain.clone()).or_default();
        match entry.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => entry.push(cookie),
        }
    }

    /// Merge every `Set-Cookie` header of a response received from `origin`.
    ///
    /// Cookies whose domain does not match the origin host are dropped.
    /// Returns how many cookies were stored.
    pub fn merge(&self, headers: &[HeaderEntry], origin: &Url) -> usize {
        let host = origin.host_str().unwrap_or("");
        let mut stored = 0;

        for header in headers
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case("set-cookie"))
        {
            let Some(cookie) = Cookie::parse(&header.value, origin) else {
                debug!(header = %header.value, "Discarding malformed Set-Cookie");
                continue;
            };
            if !domain_matches(&cookie.domain, host) {
                debug!(cookie = %cookie.name, domain = %cookie.domain, host, "Discarding cookie for foreign domain");
                continue;
            }
            self.add(cookie);
            stored += 1;
        }

        stored
    }

    /// Cookies applicable to a URL; expired cookies are pruned first
    pub fn applicable(&self, url: &Url) -> Vec<Cookie> {
        self.remove_expired();

        let mut result: Vec<Cookie> = self
            .cookies
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|c| c.matches(url))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        // Longer paths first, as browsers send them
        result.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        result
    }

    /// `Cookie` header value for a URL, empty when nothing applies
    pub fn serialize(&self, url: &Url) -> String {
        self.applicable(url)
            .iter()
            .map(|c| c.to_header_value())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Remove every cookie stored for a domain
    pub fn remove(&self, domain: &str) {
        self.cookies.remove(domain);
    }

    /// Clear all cookies
    pub fn clear(&self) {
        self.cookies.clear();
    }

    /// Remove expired cookies
    fn remove_expired(&self) {
        let now = Utc::now();
        self.cookies.retain(|_, cookies| {
            cookies.retain(|c| !c.is_expired_at(now));
            !cookies.is_empty()
        });
    }

    /// All stored cookies, including expired ones not yet pruned
    pub fn all(&self) -> Vec<Cookie> {
        self.cookies
            .iter()
            .flat_map(|e| e.value().clone())
            .collect()
    }

    /// Get total cookie count
    pub fn len(&self) -> usize {
        self.cookies.iter().map(|e| e.value().len()).sum()
    }

    /// Check if jar is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export all cookies as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.all())
    }

    /// Import cookies from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let cookies: Vec<Cookie> = serde_json::from_str(json)?;
        let jar = CookieJar::new();
        for cookie in cookies {
            jar.add(cookie);
        }
        Ok(jar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn set_cookie(value: &str) -> Vec<HeaderEntry> {
        vec![HeaderEntry::new("Set-Cookie", value)]
    }

    #[test]
    fn test_cookie_parsing() {
        let origin = url("https://example.com/path");
        let header = "session=abc=123; Domain=.Example.com; Path=/app; HttpOnly; SameSite=Lax";
        let cookie = Cookie::parse(header, &origin).unwrap();

        assert_eq!(cookie.name, "session");
        assert_eq!(cookie.value, "abc=123");
        assert_eq!(cookie.domain, ".example.com");
        assert_eq!(cookie.path, "/app");
        assert!(cookie.http_only);
        assert_eq!(cookie.same_site, "Lax");
    }

    #[test]
    fn test_malformed_cookies_dropped() {
        let origin = url("https://example.com/");
        assert!(Cookie::parse("novalue", &origin).is_none());
        assert!(Cookie::parse("=value; Path=/", &origin).is_none());
    }

    #[test]
    fn test_domain_defaults_to_origin_host() {
        let cookie = Cookie::parse("a=1", &url("https://api.example.com/x")).unwrap();
        assert_eq!(cookie.domain, "api.example.com");
        assert_eq!(cookie.path, "/");
    }

    #[test]
    fn test_max_age_overrides_earlier_expires() {
        let origin = url("https://example.com/");
        let cookie = Cookie::parse(
            "a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=3600",
            &origin,
        )
        .unwrap();
        assert!(!cookie.is_expired());

        let cookie = Cookie::parse("a=1; Max-Age=3600; Expires=Wed, 21-Oct-2015 07:28:00 GMT", &origin)
            .unwrap();
        assert!(cookie.is_expired());
    }

    #[test]
    fn test_out_of_range_max_age_saturates() {
        let origin = url("https://example.com/");
        let jar = CookieJar::new();
        jar.merge(&set_cookie("far=1; Max-Age=9223372036854775807"), &origin);
        jar.merge(&set_cookie("late=1; Max-Age=1000000000000000"), &origin);
        assert_eq!(jar.serialize(&origin), "far=1; late=1");

        let cookie = Cookie::parse("gone=1; Max-Age=-9223372036854775808", &origin).unwrap();
        assert!(cookie.is_expired());
        let cookie = Cookie::parse("gone=1; Max-Age=-1000000000000000", &origin).unwrap();
        assert!(cookie.is_expired());
    }

    #[test]
    fn test_merge_then_applicable() {
        let jar = CookieJar::new();
        let stored = jar.merge(
            &set_cookie("a=1; Domain=example.com; Path=/; Max-Age=3600"),
            &url("https://example.com/login"),
        );
        assert_eq!(stored, 1);

        let cookies = jar.applicable(&url("https://example.com/x"));
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "a");
        assert_eq!(cookies[0].value, "1");

        assert!(jar.applicable(&url("https://other.com/")).is_empty());
    }

    #[test]
    fn test_leading_dot_domain_match() {
        assert!(domain_matches(".example.com", "www.example.com"));
        assert!(domain_matches(".example.com", "api.example.com"));
        assert!(!domain_matches(".example.com", "notexample.com"));
    }

    #[test]
    fn test_www_equivalence() {
        assert!(domain_matches("www.example.com", "example.com"));
        assert!(domain_matches("example.com", "www.example.com"));
        assert!(!domain_matches("example.com", "api.example.com"));
    }

    #[test]
    fn test_foreign_domain_rejected_on_merge() {
        let jar = CookieJar::new();
        let stored = jar.merge(
            &set_cookie("a=1; Domain=other.com"),
            &url("https://example.com/"),
        );
        assert_eq!(stored, 0);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_upsert_by_name_and_domain() {
        let jar = CookieJar::new();
        let origin = url("https://example.com/");
        jar.merge(&set_cookie("a=1"), &origin);
        jar.merge(&set_cookie("a=2"), &origin);
        jar.merge(&set_cookie("b=3"), &origin);

        assert_eq!(jar.len(), 2);
        assert_eq!(jar.serialize(&origin), "a=2; b=3");
    }

    #[test]
    fn test_path_prefix() {
        let jar = CookieJar::new();
        jar.add(Cookie::new("scoped", "1").domain("example.com").path("/api"));
        jar.add(Cookie::new("root", "2").domain("example.com"));

        assert_eq!(jar.serialize(&url("https://example.com/api/users")), "scoped=1; root=2");
        assert_eq!(jar.serialize(&url("https://example.com/web")), "root=2");
    }

    #[test]
    fn test_expired_cookie_pruned_on_read() {
        let jar = CookieJar::new();
        let origin = url("https://example.com/");
        jar.merge(&set_cookie("gone=1; Max-Age=0"), &origin);
        assert_eq!(jar.len(), 1);

        assert!(jar.applicable(&origin).is_empty());
        assert_eq!(jar.len(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let jar = CookieJar::new();
        jar.add(Cookie::new("a", "1").domain("a.com"));
        jar.add(Cookie::new("b", "1").domain("b.com"));

        jar.remove("a.com");
        assert_eq!(jar.len(), 1);
        jar.clear();
        assert!(jar.is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let jar = CookieJar::new();
        jar.add(Cookie::new("a", "1").domain("example.com"));
        let restored = CookieJar::from_json(&jar.to_json().unwrap()).unwrap();
        assert_eq!(restored.all(), jar.all());
    }
}
