//! Transport-level failures.

use std::error::Error as StdError;

/// Why a round trip did not produce a response.
///
/// The `Display` text is what the executor records as the client error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("failed to configure transport: {0}")]
    Build(String),
    #[error("invalid request header: {0}")]
    InvalidHeader(String),
    #[error("failed to encode parameters: {0}")]
    Encode(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("redirect failed: {0}")]
    Redirect(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() {
            TransportError::Connect(message)
        } else if err.is_redirect() {
            TransportError::Redirect(message)
        } else if err.is_builder() {
            TransportError::Build(message)
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(message)
        } else {
            TransportError::Request(message)
        }
    }
}

/// Joins an error and all of its sources with `": "`.
///
/// reqwest keeps the useful part (DNS, TLS, refused) in the source chain.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
