//! Blocking HTTP client adapter for talking to identity providers.
//!
//! [`HttpRequestExecutor`] issues one request per call over a pluggable
//! [`Transport`] and keeps the last exchange around as a serializable
//! [`ResponseSnapshot`].

pub mod executor;
pub mod http;
pub mod logger;
pub mod snapshot;
pub mod transport;

pub use executor::HttpRequestExecutor;
pub use http::{HeaderObserver, Method, Parameters, RequestHeaders, ResponseHeaders};
pub use logger::{Logger, TracingLogger};
pub use snapshot::{ResponseBody, ResponseSnapshot, TransferInfo};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportOptions, TransportOptionsPatch};
