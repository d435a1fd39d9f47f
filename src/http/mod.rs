//! Request-side building blocks: methods, parameters and headers.

pub mod headers;
mod method;
mod params;

pub use headers::{
    HeaderCollector, HeaderObserver, RequestHeaders, ResponseHeaders, parse_header_line,
};
pub use method::{Method, UnsupportedMethod};
pub use params::{Parameters, append_query};
