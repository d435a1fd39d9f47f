//! CLI probe for the idp_http executor.
//!
//! Sends one request to an identity provider (or anything else speaking HTTP)
//! and prints the captured exchange as JSON.

use std::ffi::OsStr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use idp_http::{
    HttpRequestExecutor, Parameters, RequestHeaders, TracingLogger, TransportOptionsPatch,
};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "idp_http")]
#[command(about = "Issue one HTTP request and inspect the captured exchange", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single request and print the response snapshot as JSON
    Request {
        /// Absolute URL to request
        #[arg(value_name = "URL")]
        url: String,

        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Form parameter, repeatable
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// Pre-encoded parameters sent verbatim
        #[arg(short, long, conflicts_with = "params")]
        data: Option<String>,

        /// Request header, repeatable
        #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
        headers: Vec<String>,

        /// JSON file with transport options
        #[arg(long, value_name = "FILE")]
        options: Option<String>,

        /// Overall timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Skip TLS certificate and host name verification
        #[arg(short = 'k', long, default_value_t = false)]
        insecure: bool,
    },
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/idp_http.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("idp_http.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Request {
            url,
            method,
            params,
            data,
            headers,
            options,
            timeout,
            insecure,
        } => {
            let mut executor = HttpRequestExecutor::new();
            executor.set_logger(Arc::new(TracingLogger));

            if let Some(path) = options {
                let patch = TransportOptionsPatch::load(&path)
                    .with_context(|| format!("loading options from '{path}'"))?;
                executor.set_transport_options(&patch);
            }
            executor.set_transport_options(&TransportOptionsPatch {
                timeout: timeout.map(Duration::from_secs),
                verify_peer: insecure.then_some(false),
                verify_host: insecure.then_some(false),
                ..Default::default()
            });

            let parameters = match data {
                Some(raw) => Parameters::raw(raw),
                None => Parameters::form(
                    params
                        .iter()
                        .map(|p| parse_param(p))
                        .collect::<Result<Vec<_>>>()?,
                ),
            };
            let headers = RequestHeaders::from_pairs(
                headers
                    .iter()
                    .map(|h| parse_header(h))
                    .collect::<Result<Vec<_>>>()?,
            );

            executor.request_str(&url, &method, parameters, &headers)?;

            let snapshot = executor.get_response();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);

            info!(
                code = executor.response_http_code(),
                error = executor.response_client_error(),
                "Request finished"
            );

            if !executor.response_client_error().is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Splits `name=value`; a bare `name` gets an empty value.
fn parse_param(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw.split_once('=').unwrap_or((raw, ""));
    if name.is_empty() {
        return Err(anyhow!("parameter '{raw}' has no name"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header '{raw}' is not in 'Name: value' form"))?;
    if name.trim().is_empty() {
        return Err(anyhow!("header '{raw}' has no name"));
    }
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("a=1").unwrap(), ("a".to_string(), "1".to_string()));
        assert_eq!(parse_param("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
        assert_eq!(parse_param("flag").unwrap(), ("flag".to_string(), String::new()));
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization: Bearer x").unwrap(),
            ("Authorization".to_string(), "Bearer x".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_cli_parses_request() {
        let cli = Cli::try_parse_from([
            "idp_http", "request", "http://x/", "-X", "POST", "-p", "a=1", "-H", "X-A: 1", "-k",
        ])
        .unwrap();
        let Commands::Request { method, params, headers, insecure, .. } = cli.command;
        assert_eq!(method, "POST");
        assert_eq!(params, vec!["a=1"]);
        assert_eq!(headers, vec!["X-A: 1"]);
        assert!(insecure);
    }

    #[test]
    fn test_cli_rejects_data_with_params() {
        assert!(Cli::try_parse_from(["idp_http", "request", "http://x/", "-p", "a=1", "-d", "raw"]).is_err());
    }
}
