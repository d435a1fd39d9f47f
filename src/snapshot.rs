//! Records of the last exchange and the serializable snapshot built from them.

use serde::{Serialize, Serializer};

use crate::http::{Method, Parameters, RequestHeaders, ResponseHeaders};
use crate::transport::TransportOptions;

/// Body of the last response, or the sentinel for an exchange that never
/// completed.
///
/// `Received("")` is a real empty body; `Failed` serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Received(String),
    Failed,
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::Received(String::new())
    }
}

impl ResponseBody {
    pub fn is_failed(&self) -> bool {
        matches!(self, ResponseBody::Failed)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResponseBody::Received(body) => Some(body),
            ResponseBody::Failed => None,
        }
    }
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResponseBody::Received(body) => serializer.serialize_str(body),
            ResponseBody::Failed => serializer.serialize_none(),
        }
    }
}

/// Per-call transfer diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferInfo {
    /// Final URL after redirects, or the requested URL if nothing came back.
    pub url: String,
    pub http_code: u16,
    /// Wall-clock seconds spent in the transport.
    pub total_time: f64,
    pub primary_ip: Option<String>,
    pub http_version: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Header lines as handed to the transport.
    pub request_header: Vec<String>,
}

/// Inputs of the last request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestRecord {
    pub uri: String,
    pub method: Option<Method>,
    pub parameters: Parameters,
    /// Final merged header set.
    pub headers: RequestHeaders,
}

/// Outcome of the last request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseRecord {
    pub body: ResponseBody,
    /// `0` when no server answered.
    pub code: u16,
    pub headers: ResponseHeaders,
    /// Empty on success.
    pub client_error: String,
    pub client_info: TransferInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseView {
    pub code: u16,
    pub headers: ResponseHeaders,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientView {
    pub error: String,
    pub info: TransferInfo,
    pub opts: TransportOptions,
}

/// Aggregate view of the last exchange, detached from the executor.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseSnapshot {
    pub response: ResponseView,
    pub request: RequestRecord,
    pub client: ClientView,
}

impl ResponseSnapshot {
    pub fn new(request: &RequestRecord, response: &ResponseRecord, opts: &TransportOptions) -> Self {
        Self {
            response: ResponseView {
                code: response.code,
                headers: response.headers.clone(),
                body: response.body.clone(),
            },
            request: request.clone(),
            client: ClientView {
                error: response.client_error.clone(),
                info: response.client_info.clone(),
                opts: opts.clone(),
            },
        }
    }

    /// JSON form used for logging; falls back to `null` if serialization fails.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
