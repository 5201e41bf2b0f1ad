//! HTTP responder against a local one-shot server

use fluentai::config::ResponderConfig;
use fluentai::dispatch::{ChatRequest, HttpResponder, Responder};
use fluentai::FluentError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, answer it, and return the raw request
async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/api/chatbox", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }

        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8_lossy(&request).into_owned()
    });

    (endpoint, server)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= header_end + 4 + content_length
}

fn responder_for(endpoint: &str) -> HttpResponder {
    HttpResponder::new(&ResponderConfig {
        endpoint: endpoint.to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

fn request(text: &str) -> ChatRequest {
    ChatRequest {
        message: text.to_string(),
    }
}

#[tokio::test]
async fn test_posts_json_and_decodes_reply() {
    let (endpoint, server) =
        serve_once("200 OK", r#"{"status":"success","data":{"response":"Hi there!"}}"#).await;

    let response = responder_for(&endpoint).respond(&request("hi")).await.unwrap();
    assert_eq!(response.into_reply().unwrap(), "Hi there!");

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /api/chatbox HTTP/1.1"));
    assert!(raw.to_ascii_lowercase().contains("content-type: application/json"));
    let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
    let body: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(body, serde_json::json!({ "message": "hi" }));
}

#[tokio::test]
async fn test_failure_status_in_body() {
    let (endpoint, _server) =
        serve_once("200 OK", r#"{"status":"error","message":"model offline"}"#).await;

    let response = responder_for(&endpoint).respond(&request("hi")).await.unwrap();
    let err = response.into_reply().unwrap_err();
    assert!(matches!(err, FluentError::ProtocolError(ref m) if m == "model offline"));
}

#[tokio::test]
async fn test_non_success_http_status() {
    let (endpoint, _server) = serve_once("500 Internal Server Error", "boom").await;

    let err = responder_for(&endpoint)
        .respond(&request("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, FluentError::TransportError(_)));
    assert_eq!(
        err.to_string(),
        "Transport error: Failed to fetch from API. Status: 500. Error: boom"
    );
}

#[tokio::test]
async fn test_malformed_body() {
    let (endpoint, _server) = serve_once("200 OK", "not json").await;

    let err = responder_for(&endpoint)
        .respond(&request("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, FluentError::ProtocolError(_)));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/api/chatbox", listener.local_addr().unwrap());
    drop(listener);

    let err = responder_for(&endpoint)
        .respond(&request("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, FluentError::TransportError(_)));
}
