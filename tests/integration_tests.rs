//! End-to-end exchanges against a local axum server.
//!
//! The server runs on its own thread and current-thread runtime so the
//! blocking transport never executes inside an async context.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::RawQuery,
    http::{HeaderMap, Method as HttpMethod, StatusCode, header::LOCATION},
    response::{IntoResponse, Redirect},
    routing::get,
};
use idp_http::{
    HeaderObserver, HttpRequestExecutor, Method, Parameters, RequestHeaders, ResponseBody,
    TransportOptionsPatch,
};
use serde_json::{Value, json};

async fn echo(
    method: HttpMethod,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                Value::String(value.to_str().unwrap_or_default().to_string()),
            )
        })
        .collect();
    (
        [("X-Custom-Header", "custom-value")],
        Json(json!({
            "method": method.as_str(),
            "query": query,
            "headers": headers,
            "body": body,
        })),
    )
}

async fn unauthorized() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#)
}

async fn found() -> impl IntoResponse {
    (
        StatusCode::FOUND,
        [(LOCATION, "/echo"), (axum::http::header::SET_COOKIE, "hop=1")],
    )
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "late"
}

fn app() -> Router {
    Router::new()
        .route("/echo", get(echo).post(echo).put(echo).delete(echo))
        .route("/unauthorized", get(unauthorized))
        .route("/redirect", get(|| async { Redirect::to("/echo?from=redirect") }))
        .route("/found", axum::routing::post(found))
        .route("/slow", get(slow))
}

/// Starts the test server on a random port and returns its base URL.
fn spawn_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            axum::serve(listener, app()).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn body_json(body: &ResponseBody) -> Value {
    serde_json::from_str(body.as_str().expect("exchange failed")).unwrap()
}

#[test]
fn test_get_sends_query_and_merged_headers() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();

    let body = executor.get(
        &format!("{base}/echo"),
        Parameters::form([("a", "1"), ("b", "x y")]),
        &RequestHeaders::from_pairs([("Accept", "application/json")]),
    );

    let echoed = body_json(&body);
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["query"], "a=1&b=x+y");
    assert_eq!(echoed["headers"]["accept"], "application/json");
    assert_eq!(echoed["headers"]["cache-control"], "max-age=0");
    assert!(echoed["headers"].get("expect").is_none());
    assert!(
        echoed["headers"]["user-agent"]
            .as_str()
            .unwrap()
            .starts_with("idp_http/")
    );

    assert_eq!(executor.response_http_code(), 200);
    assert_eq!(executor.response_client_error(), "");
}

#[test]
fn test_response_headers_are_normalized() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();

    executor.get(&format!("{base}/echo"), Parameters::default(), &RequestHeaders::new());

    let headers = executor.response_headers();
    assert_eq!(headers["x_custom_header"], "custom-value");
    assert_eq!(headers["content_type"], "application/json");
    assert!(headers.keys().all(|k| !k.contains('-') && k.to_lowercase() == *k));

    let info = executor.response_client_info();
    assert_eq!(info.url, format!("{base}/echo"));
    assert_eq!(info.http_code, 200);
    assert_eq!(info.primary_ip.as_deref(), Some("127.0.0.1"));
    assert_eq!(info.http_version.as_deref(), Some("HTTP/1.1"));
}

#[test]
fn test_post_sends_form_body() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();

    let body = executor.post(
        &format!("{base}/echo"),
        Parameters::form([("grant_type", "authorization_code"), ("code", "abc")]),
        &RequestHeaders::new(),
    );

    let echoed = body_json(&body);
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["query"], Value::Null);
    assert_eq!(echoed["body"], "grant_type=authorization_code&code=abc");
    assert_eq!(
        echoed["headers"]["content-type"],
        "application/x-www-form-urlencoded"
    );
}

#[test]
fn test_request_str_accepts_put() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();

    let body = executor
        .request_str(
            &format!("{base}/echo"),
            "PUT",
            Parameters::form([("client_id", "abc")]),
            &RequestHeaders::from_pairs([("Content-Type", "application/json")]),
        )
        .unwrap();

    let echoed = body_json(&body);
    assert_eq!(echoed["method"], "PUT");
    let sent: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
    assert_eq!(sent, json!({ "client_id": "abc" }));
}

#[test]
fn test_error_status_is_captured_as_data() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();

    let body = executor.get(
        &format!("{base}/unauthorized"),
        Parameters::default(),
        &RequestHeaders::new(),
    );

    assert_eq!(body.as_str(), Some(r#"{"error":"invalid_client"}"#));
    assert_eq!(executor.response_http_code(), 401);
    assert_eq!(executor.response_client_error(), "");
}

#[test]
fn test_redirects_follow_by_default() {
    let base = spawn_server();
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = seen.clone();
    let mut executor = HttpRequestExecutor::new();
    executor.set_transport_options(&TransportOptionsPatch {
        header_observer: Some(HeaderObserver::new(move |line| {
            sink.lock().unwrap().push(line.to_string())
        })),
        ..Default::default()
    });

    let body = executor.get(&format!("{base}/redirect"), Parameters::default(), &RequestHeaders::new());

    assert_eq!(executor.response_http_code(), 200);
    assert_eq!(body_json(&body)["query"], "from=redirect");
    assert_eq!(
        executor.response_client_info().url,
        format!("{base}/echo?from=redirect")
    );

    // Every hop's head reaches the collector, the final one last.
    let status_lines: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with("HTTP/"))
        .cloned()
        .collect();
    assert_eq!(status_lines.len(), 2);
    assert!(status_lines[0].starts_with("HTTP/1.1 303"));
    assert!(status_lines[1].starts_with("HTTP/1.1 200"));
    assert_eq!(executor.response_headers()["location"], "/echo?from=redirect");
    assert_eq!(executor.response_headers()["x_custom_header"], "custom-value");
}

#[test]
fn test_post_redirected_by_found_becomes_get() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();

    let body = executor.post(
        &format!("{base}/found"),
        Parameters::form([("code", "abc")]),
        &RequestHeaders::new(),
    );

    let echoed = body_json(&body);
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["body"], "");
    assert!(echoed["headers"].get("content-type").is_none());
    assert_eq!(executor.response_headers()["set_cookie"], "hop=1");
    assert_eq!(executor.response_client_info().url, format!("{base}/echo"));
}

#[test]
fn test_redirect_limit_is_a_transport_error() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();
    executor.set_transport_options(&TransportOptionsPatch {
        max_redirects: Some(0),
        ..Default::default()
    });

    let body = executor.get(&format!("{base}/redirect"), Parameters::default(), &RequestHeaders::new());

    assert!(body.is_failed());
    assert_eq!(executor.response_http_code(), 0);
    assert!(
        executor
            .response_client_error()
            .starts_with("redirect failed: too many redirects")
    );
}

#[test]
fn test_redirects_can_be_disabled() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();
    executor.set_transport_options(&TransportOptionsPatch {
        follow_redirects: Some(false),
        ..Default::default()
    });

    executor.get(&format!("{base}/redirect"), Parameters::default(), &RequestHeaders::new());

    assert_eq!(executor.response_http_code(), 303);
    assert_eq!(executor.response_headers()["location"], "/echo?from=redirect");
}

#[test]
fn test_connection_refused_is_recorded() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut executor = HttpRequestExecutor::new();

    let body = executor.get(
        &format!("http://127.0.0.1:{port}/echo"),
        Parameters::form([("a", "1")]),
        &RequestHeaders::new(),
    );

    assert_eq!(body, ResponseBody::Failed);
    assert_eq!(executor.response_http_code(), 0);
    assert!(!executor.response_client_error().is_empty());
    assert_eq!(
        executor.response_client_info().url,
        format!("http://127.0.0.1:{port}/echo?a=1")
    );
}

#[test]
fn test_timeout_is_recorded() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();
    executor.set_transport_options(&TransportOptionsPatch {
        timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    });

    let body = executor.get(&format!("{base}/slow"), Parameters::default(), &RequestHeaders::new());

    assert!(body.is_failed());
    assert_eq!(executor.response_http_code(), 0);
    assert!(
        executor
            .response_client_error()
            .starts_with("operation timed out")
    );
}

#[test]
fn test_header_observer_sees_status_line_first() {
    let base = spawn_server();
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = seen.clone();
    let mut executor = HttpRequestExecutor::new();
    executor.set_transport_options(&TransportOptionsPatch {
        header_observer: Some(HeaderObserver::new(move |line| {
            sink.lock().unwrap().push(line.to_string())
        })),
        ..Default::default()
    });

    executor.get(&format!("{base}/echo"), Parameters::default(), &RequestHeaders::new());

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], "HTTP/1.1 200 OK\r\n");
    assert_eq!(seen.last().map(String::as_str), Some("\r\n"));

    let snapshot = serde_json::to_value(executor.get_response()).unwrap();
    assert_eq!(snapshot["client"]["opts"]["header_function"], "*omitted");
}

#[test]
fn test_second_request_replaces_snapshot() {
    let base = spawn_server();
    let mut executor = HttpRequestExecutor::new();

    executor.get(&format!("{base}/echo"), Parameters::default(), &RequestHeaders::new());
    executor.request(
        &format!("{base}/unauthorized"),
        Method::Get,
        Parameters::default(),
        &RequestHeaders::new(),
    );

    let snapshot = executor.get_response();
    assert_eq!(snapshot.response.code, 401);
    assert!(!snapshot.response.headers.contains_key("x_custom_header"));
    assert_eq!(snapshot.request.uri, format!("{base}/unauthorized"));
}
