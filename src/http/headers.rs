//! Outgoing header merge and incoming header-line parsing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Placeholder written wherever a header observer would otherwise be printed.
pub const OMITTED: &str = "*omitted";

/// Response headers keyed by normalized name (`Content-Type` → `content_type`).
pub type ResponseHeaders = BTreeMap<String, String>;

/// Ordered request headers. Names keep the spelling they were given with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders(Vec<(String, String)>);

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers sent with every request unless the caller overrides them.
    pub fn defaults() -> Self {
        Self::from_pairs([
            ("Accept", "*/*"),
            ("Cache-Control", "max-age=0"),
            ("Connection", "keep-alive"),
            ("Expect", ""),
            ("Pragma", ""),
        ])
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.insert(name, value);
        }
        headers
    }

    /// Sets `name`, replacing any entry whose name matches case-insensitively.
    /// The replacement takes the new spelling but keeps the old position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, value),
            None => self.0.push((name, value)),
        }
    }

    /// Returns a new set: `self` overridden and extended by `overrides`.
    pub fn merged(&self, overrides: &RequestHeaders) -> RequestHeaders {
        let mut merged = self.clone();
        for (name, value) in &overrides.0 {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Name: value` lines with both halves trimmed.
    pub fn to_header_lines(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(name, value)| format!("{}: {}", name.trim(), value.trim()))
            .collect()
    }
}

impl Serialize for RequestHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Parses one raw response header line into a normalized `(name, value)`.
///
/// Returns `None` for lines without a colon and for lines starting with one;
/// the status line falls in the first group.
pub fn parse_header_line(line: &str) -> Option<(String, String)> {
    let pos = line.find(':')?;
    if pos == 0 {
        return None;
    }
    let name = line[..pos].to_lowercase().replace('-', "_");
    let value = line[pos + 1..].trim().to_string();
    Some((name, value))
}

/// Hook receiving every raw response header line, status line included.
#[derive(Clone)]
pub struct HeaderObserver(Arc<dyn Fn(&str) + Send + Sync>);

impl HeaderObserver {
    pub fn new(f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, line: &str) {
        (self.0)(line)
    }
}

impl fmt::Debug for HeaderObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(OMITTED)
    }
}

/// Accumulates parsed response headers for a single exchange.
#[derive(Debug, Default)]
pub struct HeaderCollector {
    headers: ResponseHeaders,
    observer: Option<HeaderObserver>,
}

impl HeaderCollector {
    pub fn new(observer: Option<HeaderObserver>) -> Self {
        Self {
            headers: ResponseHeaders::new(),
            observer,
        }
    }

    /// Consumes one header line and reports how many bytes were taken,
    /// which is always the whole line.
    pub fn feed(&mut self, line: &str) -> usize {
        if let Some(observer) = &self.observer {
            observer.call(line);
        }
        if let Some((name, value)) = parse_header_line(line) {
            self.headers.insert(name, value);
        }
        line.len()
    }

    pub fn headers(&self) -> &ResponseHeaders {
        &self.headers
    }

    pub fn finish(self) -> ResponseHeaders {
        self.headers
    }
}
