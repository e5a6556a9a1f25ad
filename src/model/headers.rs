// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Header collections
//!
//! Requests carry a [`HeaderList`]: ordered, case-preserving, one entry per
//! name (compared case-insensitively), last write wins. Responses keep every
//! header line, duplicates included, as a list of [`HeaderEntry`].

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single header line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered request header map.
///
/// Serializes as a JSON object so scripts can index it by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<HeaderEntry>,
}

impl HeaderList {
    /// Create an empty header list
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing entry with the same name.
    ///
    /// The replaced entry keeps its position but takes the new spelling.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx] = HeaderEntry { name, value },
            None => self.entries.push(HeaderEntry { name, value }),
        }
    }

    /// Set a header only if no entry with that name exists yet
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push(HeaderEntry::new(name, value));
        true
    }

    /// Get a header value by case-insensitive name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].value.as_str())
    }

    /// Check if a header is present
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove a header, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.entries.remove(idx).value)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut list = HeaderList::new();
        for (name, value) in iter {
            list.insert(name, value);
        }
        list
    }
}

impl IntoIterator for HeaderList {
    type Item = HeaderEntry;
    type IntoIter = std::vec::IntoIter<HeaderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for HeaderList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(HeaderListVisitor)
    }
}

struct HeaderListVisitor;

impl<'de> Visitor<'de> for HeaderListVisitor {
    type Value = HeaderList;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of header names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut list = HeaderList::new();
        while let Some((name, value)) = access.next_entry::<String, serde_json::Value>()? {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => continue,
                other => other.to_string(),
            };
            list.insert(name, value);
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut headers = HeaderList::new();
        headers.insert("Content-Type", "text/plain");
        headers.insert("X-Trace", "1");
        headers.insert("content-type", "application/json");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        let names: Vec<_> = headers.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["content-type", "X-Trace"]);
    }

    #[test]
    fn test_insert_if_absent() {
        let mut headers = HeaderList::new();
        assert!(headers.insert_if_absent("Accept", "*/*"));
        assert!(!headers.insert_if_absent("accept", "text/html"));
        assert_eq!(headers.get("Accept"), Some("*/*"));
    }

    #[test]
    fn test_json_shape_keeps_order() {
        let headers: HeaderList = vec![("B", "2"), ("A", "1")].into_iter().collect();
        let json = serde_json::to_string(&headers).unwrap();
        assert_eq!(json, r#"{"B":"2","A":"1"}"#);

        let back: HeaderList = serde_json::from_str(r#"{"X-Num": 5, "X-Str": "s", "X-Null": null}"#).unwrap();
        assert_eq!(back.get("x-num"), Some("5"));
        assert_eq!(back.get("x-str"), Some("s"));
        assert!(!back.contains("x-null"));
    }
}
