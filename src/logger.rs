//! Optional diagnostics collaborator for the executor.
//!
//! [`Logger`] is the narrow capability the executor reports through.
//! [`TracingLogger`] forwards both levels to `tracing`.

use serde_json::Value;

/// Receives a message plus a structured context for each diagnostic event.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str, context: &Value);
    fn error(&self, message: &str, context: &Value);
}

/// [`Logger`] that emits `tracing` events under the `idp_http` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str, context: &Value) {
        tracing::debug!(target: "idp_http", context = %context, "{message}");
    }

    fn error(&self, message: &str, context: &Value) {
        tracing::error!(target: "idp_http", context = %context, "{message}");
    }
}
