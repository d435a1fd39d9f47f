//! Request parameters and their query/body encodings.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Parameters attached to a request.
///
/// `Form` pairs keep insertion order and are URL-encoded on the way out.
/// `Raw` is an already-encoded payload passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameters {
    Form(Vec<(String, String)>),
    Raw(String),
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters::Form(Vec::new())
    }
}

impl Parameters {
    /// Builds form parameters from any iterator of name/value pairs.
    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Parameters::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn raw(payload: impl Into<String>) -> Self {
        Parameters::Raw(payload.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Parameters::Form(pairs) => pairs.is_empty(),
            Parameters::Raw(payload) => payload.is_empty(),
        }
    }

    /// Encodes as `application/x-www-form-urlencoded` (spaces become `+`).
    ///
    /// # Errors
    ///
    /// Returns an error if the form serializer rejects a pair.
    pub fn encode(&self) -> Result<String, serde_urlencoded::ser::Error> {
        match self {
            Parameters::Form(pairs) => serde_urlencoded::to_string(pairs),
            Parameters::Raw(payload) => Ok(payload.clone()),
        }
    }

    /// Renders form pairs as a JSON object; a repeated name keeps its last value.
    /// A raw payload becomes a JSON string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Parameters::Form(pairs) => serde_json::Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ),
            Parameters::Raw(payload) => serde_json::Value::String(payload.clone()),
        }
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Parameters::Form(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (k, v) in pairs {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Parameters::Raw(payload) => serializer.serialize_str(payload),
        }
    }
}

/// Appends an encoded query to `uri`.
///
/// The separator is `&` whenever `uri` contains a `?` anywhere, even one that
/// is not the start of a query, and `?` otherwise. An empty query leaves the
/// URI as it was.
pub fn append_query(uri: &str, query: &str) -> String {
    if query.is_empty() {
        return uri.to_string();
    }
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}{query}")
}
