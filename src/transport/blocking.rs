use reqwest::blocking::{Client, Response};
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue,
    LOCATION, PROXY_AUTHORIZATION,
};
use reqwest::redirect::Policy;
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::{PreparedRequest, RawResponse, Transport, TransportError, TransportOptions};
use crate::http::{HeaderCollector, RequestHeaders};

/// [`Transport`] over `reqwest::blocking`.
///
/// A fresh client is built for every request from that request's options,
/// so nothing (connections included) outlives a single call. Redirects are
/// followed here rather than inside reqwest so that every hop's head reaches
/// the header collector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }

    fn client(options: &TransportOptions) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(!options.verify_peer)
            .danger_accept_invalid_hostnames(!options.verify_host)
            .redirect(Policy::none())
            .user_agent(options.user_agent.as_str());

        for (key, value) in &options.extra {
            builder = match (key.as_str(), value) {
                ("proxy", Value::String(url)) => builder.proxy(reqwest::Proxy::all(url)?),
                ("gzip", Value::Bool(on)) => builder.gzip(*on),
                ("https_only", Value::Bool(on)) => builder.https_only(*on),
                ("tcp_nodelay", Value::Bool(on)) => builder.tcp_nodelay(*on),
                ("referer", Value::Bool(on)) => builder.referer(*on),
                _ => {
                    debug!(key = %key, value = %value, "Transport option ignored");
                    builder
                }
            };
        }

        Ok(builder.build()?)
    }
}

impl Transport for ReqwestTransport {
    #[tracing::instrument(
        name = "transport",
        skip_all,
        fields(method = %request.method, url = %request.url)
    )]
    fn execute(
        &self,
        request: &PreparedRequest,
        headers: &mut HeaderCollector,
    ) -> Result<RawResponse, TransportError> {
        let options = &request.options;
        let client = Self::client(options)?;

        let mut method = Method::from(request.method);
        let mut url = Url::parse(&request.url).map_err(|e| {
            TransportError::Build(format!("invalid URL '{}': {e}", request.url))
        })?;
        let mut outgoing = header_map(&request.headers)?;
        let mut body = request.body.clone();
        let mut hops = 0;

        let response = loop {
            let mut builder = client
                .request(method.clone(), url.clone())
                .headers(outgoing.clone());
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }

            let response = builder.send()?;
            capture_headers(&response, headers)?;

            if !options.follow_redirects {
                break response;
            }
            let Some(next) = redirect_target(&response)? else {
                break response;
            };
            if hops >= options.max_redirects {
                return Err(TransportError::Redirect(format!(
                    "too many redirects (limit {}) at {}",
                    options.max_redirects,
                    response.url()
                )));
            }
            hops += 1;

            let status = response.status();
            if status == StatusCode::SEE_OTHER
                || (method == Method::POST
                    && matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND))
            {
                method = Method::GET;
                body = None;
                outgoing.remove(CONTENT_TYPE);
                outgoing.remove(CONTENT_LENGTH);
            }
            if !same_origin(&url, &next) {
                for name in [AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION] {
                    outgoing.remove(name);
                }
            }
            debug!(status = status.as_u16(), location = %next, hops, "Following redirect");
            url = next;
        };

        let status = response.status().as_u16();
        let effective_url = response.url().to_string();
        let primary_ip = response.remote_addr().map(|addr| addr.ip().to_string());
        let http_version = Some(format!("{:?}", response.version()));
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();
        let body = response.text()?;

        debug!(status, bytes = body.len(), "Response received");

        Ok(RawResponse {
            status,
            body,
            effective_url,
            primary_ip,
            http_version,
            content_type,
            content_length,
        })
    }
}

/// Converts the merged request headers into a reqwest map.
///
/// A header whose value is empty is left out entirely, which is how curl
/// treats `Expect:` and `Pragma:`.
fn header_map(headers: &RequestHeaders) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let (name, value) = (name.trim(), value.trim());
        if value.is_empty() {
            continue;
        }
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidHeader(format!("'{name}': {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidHeader(format!("'{name}': {e}")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Where a redirect response points, resolved against its own URL.
///
/// `None` for non-redirect statuses and for redirects without a `Location`,
/// which are handed back to the caller as the final response.
fn redirect_target(response: &Response) -> Result<Option<Url>, TransportError> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return Ok(None);
    }
    let Some(location) = response.headers().get(LOCATION) else {
        return Ok(None);
    };
    let location = location
        .to_str()
        .map_err(|e| TransportError::Redirect(format!("unreadable Location header: {e}")))?;
    response
        .url()
        .join(location)
        .map(Some)
        .map_err(|e| TransportError::Redirect(format!("invalid Location '{location}': {e}")))
}

/// Credentials only travel to the host they were given for.
fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Replays the response head into `collector` one line at a time.
fn capture_headers(response: &Response, collector: &mut HeaderCollector) -> Result<(), TransportError> {
    let status = response.status();
    let mut lines = Vec::with_capacity(response.headers().len() + 2);
    lines.push(format!(
        "{:?} {} {}\r\n",
        response.version(),
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    ));
    for (name, value) in response.headers() {
        lines.push(format!(
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    lines.push("\r\n".to_string());

    for line in &lines {
        let consumed = collector.feed(line);
        if consumed != line.len() {
            return Err(TransportError::Request(format!(
                "header callback consumed {consumed} of {} bytes",
                line.len()
            )));
        }
    }
    Ok(())
}
