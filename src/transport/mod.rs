//! The blocking transport seam and its reqwest implementation.

mod blocking;
mod error;
pub mod options;

pub use blocking::ReqwestTransport;
pub use error::TransportError;
pub use options::{OptionsError, TransportOptions, TransportOptionsPatch};

use crate::http::{HeaderCollector, Method, RequestHeaders};

/// Everything a transport needs for one round trip.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    /// Absolute URL, query string already attached.
    pub url: String,
    pub headers: RequestHeaders,
    pub body: Option<String>,
    pub options: TransportOptions,
}

/// What came back from a completed exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// Final URL after redirects.
    pub effective_url: String,
    pub primary_ip: Option<String>,
    pub http_version: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Executes exactly one blocking HTTP exchange.
///
/// Implementations must hand every received header line, status line
/// first, to `headers` as it arrives. HTTP error statuses are responses,
/// not errors.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: &PreparedRequest,
        headers: &mut HeaderCollector,
    ) -> Result<RawResponse, TransportError>;
}
