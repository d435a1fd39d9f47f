//! Typed transport configuration and its merge/patch layer.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::http::headers::{HeaderObserver, OMITTED};

/// Effective configuration handed to the transport for one request.
///
/// Serializes with durations as fractional seconds and the header observer
/// replaced by `"*omitted"`.
#[derive(Debug, Clone, Serialize)]
pub struct TransportOptions {
    #[serde(serialize_with = "secs::serialize")]
    pub timeout: Duration,
    #[serde(serialize_with = "secs::serialize")]
    pub connect_timeout: Duration,
    pub verify_peer: bool,
    pub verify_host: bool,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub user_agent: String,
    #[serde(rename = "header_function", serialize_with = "omitted")]
    pub header_observer: Option<HeaderObserver>,
    /// Transport-specific passthrough settings.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            verify_peer: true,
            verify_host: true,
            follow_redirects: true,
            max_redirects: 5,
            user_agent: concat!("idp_http/", env!("CARGO_PKG_VERSION")).to_string(),
            header_observer: None,
            extra: BTreeMap::new(),
        }
    }
}

/// A partial [`TransportOptions`]; every `Some` field overwrites, and `extra`
/// entries overwrite by key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportOptionsPatch {
    #[serde(deserialize_with = "secs::deserialize_option")]
    pub timeout: Option<Duration>,
    #[serde(deserialize_with = "secs::deserialize_option")]
    pub connect_timeout: Option<Duration>,
    pub verify_peer: Option<bool>,
    pub verify_host: Option<bool>,
    pub follow_redirects: Option<bool>,
    pub max_redirects: Option<usize>,
    pub user_agent: Option<String>,
    #[serde(skip)]
    pub header_observer: Option<HeaderObserver>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TransportOptionsPatch {
    /// Reads a patch from a JSON file. Durations are in seconds.
    ///
    /// ```json
    /// { "timeout": 10, "verify_peer": false, "extra": { "proxy": "http://127.0.0.1:3128" } }
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| OptionsError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Errors reading an options file.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("failed to read transport options from '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid transport options in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportOptions {
    /// Returns a new configuration with `patch` applied on top of `self`.
    pub fn merge(&self, patch: &TransportOptionsPatch) -> TransportOptions {
        let mut merged = self.clone();
        if let Some(timeout) = patch.timeout {
            merged.timeout = timeout;
        }
        if let Some(connect_timeout) = patch.connect_timeout {
            merged.connect_timeout = connect_timeout;
        }
        if let Some(verify_peer) = patch.verify_peer {
            merged.verify_peer = verify_peer;
        }
        if let Some(verify_host) = patch.verify_host {
            merged.verify_host = verify_host;
        }
        if let Some(follow_redirects) = patch.follow_redirects {
            merged.follow_redirects = follow_redirects;
        }
        if let Some(max_redirects) = patch.max_redirects {
            merged.max_redirects = max_redirects;
        }
        if let Some(user_agent) = &patch.user_agent {
            merged.user_agent = user_agent.clone();
        }
        if let Some(observer) = &patch.header_observer {
            merged.header_observer = Some(observer.clone());
        }
        for (key, value) in &patch.extra {
            merged.extra.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Loads a JSON patch file (see [`TransportOptionsPatch::load`]) and
    /// applies it over the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        Ok(Self::default().merge(&TransportOptionsPatch::load(path)?))
    }
}

fn omitted<S: Serializer>(_: &Option<HeaderObserver>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(OMITTED)
}

/// Durations as fractional seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}
