//! The request executor: one blocking exchange per call, with the outcome
//! kept for inspection until the next call replaces it.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use crate::http::{
    HeaderCollector, Method, Parameters, RequestHeaders, ResponseHeaders, UnsupportedMethod,
    append_query,
};
use crate::logger::Logger;
use crate::snapshot::{
    RequestRecord, ResponseBody, ResponseRecord, ResponseSnapshot, TransferInfo,
};
use crate::transport::{
    PreparedRequest, ReqwestTransport, Transport, TransportError, TransportOptions,
    TransportOptionsPatch,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Issues blocking HTTP requests and records the last exchange.
///
/// Transport options persist across calls and change only through
/// [`set_transport_options`](Self::set_transport_options). Request headers
/// are merged over the defaults afresh on every call, so nothing a caller
/// passes once leaks into later requests.
///
/// `request` takes `&mut self`; share an executor across threads behind a
/// `Mutex` or use one per in-flight request.
pub struct HttpRequestExecutor {
    transport: Box<dyn Transport>,
    options: TransportOptions,
    default_headers: RequestHeaders,
    logger: Option<Arc<dyn Logger>>,
    last_request: RequestRecord,
    last_response: ResponseRecord,
}

impl Default for HttpRequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequestExecutor {
    /// Executor backed by [`ReqwestTransport`] with default options.
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            options: TransportOptions::default(),
            default_headers: RequestHeaders::defaults(),
            logger: None,
            last_request: RequestRecord::default(),
            last_response: ResponseRecord::default(),
        }
    }

    /// Performs one round trip and returns the body, or
    /// [`ResponseBody::Failed`] when the transport could not complete it.
    ///
    /// Never fails: transport problems land in
    /// [`response_client_error`](Self::response_client_error) with the status
    /// left at `0`.
    pub fn request(
        &mut self,
        uri: &str,
        method: Method,
        parameters: Parameters,
        headers: &RequestHeaders,
    ) -> ResponseBody {
        let mut merged = self.default_headers.merged(headers);
        if method.sends_body() && !parameters.is_empty() && merged.get("Content-Type").is_none() {
            merged.insert("Content-Type", FORM_CONTENT_TYPE);
        }
        let request_header = merged.to_header_lines();

        let mut collector = HeaderCollector::new(self.options.header_observer.clone());
        let started = Instant::now();
        let (url, outcome) = match self.prepare(uri, method, &parameters, &merged) {
            Ok(prepared) => {
                let outcome = self.transport.execute(&prepared, &mut collector);
                (prepared.url, outcome)
            }
            Err(err) => (uri.to_string(), Err(err)),
        };
        let total_time = started.elapsed().as_secs_f64();

        self.last_request = RequestRecord {
            uri: uri.to_string(),
            method: Some(method),
            parameters,
            headers: merged,
        };
        self.last_response = match outcome {
            Ok(raw) => ResponseRecord {
                body: ResponseBody::Received(raw.body),
                code: raw.status,
                headers: collector.finish(),
                client_error: String::new(),
                client_info: TransferInfo {
                    url: raw.effective_url,
                    http_code: raw.status,
                    total_time,
                    primary_ip: raw.primary_ip,
                    http_version: raw.http_version,
                    content_type: raw.content_type,
                    content_length: raw.content_length,
                    request_header,
                },
            },
            Err(err) => ResponseRecord {
                body: ResponseBody::Failed,
                code: 0,
                headers: collector.finish(),
                client_error: err.to_string(),
                client_info: TransferInfo {
                    url: url.clone(),
                    total_time,
                    request_header,
                    ..Default::default()
                },
            },
        };

        if let Some(logger) = &self.logger {
            let call = format!("HttpClient::request( {url}, {method} )");
            logger.debug(&format!("{call}, response:"), &self.get_response().to_json());
            if self.last_response.body.is_failed() {
                logger.error(
                    &format!("{call}, transport error:"),
                    &json!({ "error": self.last_response.client_error }),
                );
            }
        }

        self.last_response.body.clone()
    }

    /// Like [`request`](Self::request) but takes the verb as text.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedMethod`] for anything but `GET`, `POST`, `PUT`,
    /// `PATCH` or `DELETE`; nothing is sent and the last snapshot is kept.
    pub fn request_str(
        &mut self,
        uri: &str,
        method: &str,
        parameters: Parameters,
        headers: &RequestHeaders,
    ) -> Result<ResponseBody, UnsupportedMethod> {
        let method = method.parse::<Method>()?;
        Ok(self.request(uri, method, parameters, headers))
    }

    pub fn get(&mut self, uri: &str, parameters: Parameters, headers: &RequestHeaders) -> ResponseBody {
        self.request(uri, Method::Get, parameters, headers)
    }

    pub fn post(&mut self, uri: &str, parameters: Parameters, headers: &RequestHeaders) -> ResponseBody {
        self.request(uri, Method::Post, parameters, headers)
    }

    fn prepare(
        &self,
        uri: &str,
        method: Method,
        parameters: &Parameters,
        headers: &RequestHeaders,
    ) -> Result<PreparedRequest, TransportError> {
        let (url, body) = if method.sends_body() {
            (uri.to_string(), Some(encode_body(parameters, headers)?))
        } else {
            let query = parameters
                .encode()
                .map_err(|e| TransportError::Encode(e.to_string()))?;
            (append_query(uri, &query), None)
        };
        Ok(PreparedRequest {
            method,
            url,
            headers: headers.clone(),
            body,
            options: self.options.clone(),
        })
    }

    /// Snapshot of the last exchange with the header observer redacted.
    pub fn get_response(&self) -> ResponseSnapshot {
        ResponseSnapshot::new(&self.last_request, &self.last_response, &self.options)
    }

    pub fn response_body(&self) -> &ResponseBody {
        &self.last_response.body
    }

    pub fn response_headers(&self) -> &ResponseHeaders {
        &self.last_response.headers
    }

    pub fn response_http_code(&self) -> u16 {
        self.last_response.code
    }

    /// Empty when the last exchange completed.
    pub fn response_client_error(&self) -> &str {
        &self.last_response.client_error
    }

    pub fn response_client_info(&self) -> &TransferInfo {
        &self.last_response.client_info
    }

    pub fn request_record(&self) -> &RequestRecord {
        &self.last_request
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.options
    }

    /// Merges `patch` into the persistent options; applies from the next call.
    pub fn set_transport_options(&mut self, patch: &TransportOptionsPatch) {
        self.options = self.options.merge(patch);
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = Some(logger);
    }

    /// Replaces the headers every request starts from.
    pub fn set_default_headers(&mut self, headers: RequestHeaders) {
        self.default_headers = headers;
    }
}

/// Body encoding follows the declared content type: JSON for
/// `application/json` form parameters, URL-encoding otherwise.
fn encode_body(parameters: &Parameters, headers: &RequestHeaders) -> Result<String, TransportError> {
    let is_json = headers
        .get("Content-Type")
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"));
    match parameters {
        Parameters::Form(_) if is_json => serde_json::to_string(&parameters.to_json())
            .map_err(|e| TransportError::Encode(e.to_string())),
        _ => parameters
            .encode()
            .map_err(|e| TransportError::Encode(e.to_string())),
    }
}
