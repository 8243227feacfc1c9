//! HTTP server exposing the analytics chat pipeline to the dashboard.
//! Raw tokio HTTP handling, same approach as the platform's other internal
//! services (no web framework).

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use ventes_analytics::config::Config;
use ventes_analytics::executor::SqlExecutor;
use ventes_analytics::llm::LlmClient;
use ventes_analytics::pipeline::AnalyticsChat;

const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "ventes-analytics")]
#[command(about = "Service d'analyse de données par langage naturel")]
struct Args {
    /// Listen address, e.g. 0.0.0.0:8000 (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let bind = args.bind.unwrap_or_else(|| config.bind_addr.clone());

    if !config.has_api_key() {
        warn!("OPENAI_API_KEY non configurée - la classification échouera");
    }

    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    );
    let executor = SqlExecutor::connect(&config.database_url).await?;
    let chat = Arc::new(AnalyticsChat::new(Arc::new(llm), Arc::new(executor)));

    let listener = TcpListener::bind(&bind).await?;
    info!("service analytics en écoute sur {}", bind);

    loop {
        let (stream, addr) = listener.accept().await?;
        let chat = Arc::clone(&chat);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, chat).await {
                error!("erreur de connexion depuis {}: {}", addr, e);
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, chat: Arc<AnalyticsChat>) -> Result<()> {
    let request = read_request(&mut stream).await?;
    let response = handle_request(&request, chat).await;
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

/// Read one HTTP request: headers, then as many body bytes as
/// Content-Length announces.
async fn read_request(stream: &mut TcpStream) -> Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = find_subslice(&buf, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..header_end]);
            let content_length = headers
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }

        if buf.len() > MAX_REQUEST_BYTES {
            anyhow::bail!("request too large");
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn handle_request(request: &str, chat: Arc<AnalyticsChat>) -> String {
    let request_line = request.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts
        .next()
        .unwrap_or_default()
        .split('?')
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    match (method, path) {
        ("GET", "/api/health") => create_response(
            200,
            "OK",
            r#"{"status":"ok","service":"ventes-analytics"}"#,
        ),
        ("POST", "/analytics/chat") => {
            let body = request
                .split_once("\r\n\r\n")
                .map(|(_, body)| body)
                .unwrap_or_default();
            let query = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|json| {
                    json.get("query")
                        .and_then(|v| v.as_str())
                        .map(|s| s.trim().to_string())
                })
                .unwrap_or_default();

            if query.is_empty() {
                return create_response(400, "Bad Request", r#"{"error":"Query is required"}"#);
            }

            let reply = chat.ask(&query).await;
            match serde_json::to_string(&reply) {
                Ok(json) => create_response(200, "OK", &json),
                Err(e) => {
                    error!("échec de sérialisation de la réponse: {}", e);
                    create_response(
                        500,
                        "Internal Server Error",
                        r#"{"error":"Failed to serialize response"}"#,
                    )
                }
            }
        }
        ("OPTIONS", _) => create_response(200, "OK", ""),
        _ => create_response(
            404,
            "Not Found",
            &format!(r#"{{"error":"Endpoint not found: {} {}"}}"#, method, path),
        ),
    }
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
