//! `VeracodeClient` against a loopback HTTP server.

#![allow(clippy::expect_used)]

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use veracode_api::{ApplicationQuery, Transport, VeracodeClient, VeracodeConfig, VeracodeError};

const KEY_ID: &str = "3ddaeeb10ca690df3fee5e3bd1c329fa";
const KEY_SECRET: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

/// Accept one connection, capture the raw request, answer with `response`.
async fn serve_once(response: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.expect("read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let lower = line.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn client_for(base_url: &str) -> VeracodeClient {
    VeracodeClient::new(VeracodeConfig::new(KEY_ID, KEY_SECRET).with_base_url(base_url))
        .expect("client builds")
}

#[tokio::test]
async fn test_get_is_signed_over_full_url_without_content_type() {
    let (base_url, server) = serve_once(http_response(
        "200 OK",
        r#"{"page": {"number": 0, "size": 50, "total_elements": 0, "total_pages": 0}}"#,
    ))
    .await;

    let client = client_for(&base_url);
    let page = client
        .applications_api()
        .get_applications(&ApplicationQuery::new().with_name("demo").with_size(50))
        .await
        .expect("listing succeeds");
    assert_eq!(page.total_pages(), 0);

    let request = server.await.expect("server task");
    let lower = request.to_ascii_lowercase();
    assert!(request.starts_with("GET /appsec/v1/applications?name=demo&size=50 HTTP/1.1"));
    assert!(lower.contains(&format!(
        "authorization: veracode-hmac-sha-256 id={KEY_ID},ts="
    )));
    assert!(lower.contains("accept: application/json"));
    assert!(lower.contains("user-agent: veratui/"));
    assert!(!lower.contains("content-type:"));
}

#[tokio::test]
async fn test_post_carries_json_content_type() {
    let (base_url, server) = serve_once(http_response("200 OK", "")).await;

    let client = client_for(&base_url);
    let body = client
        .request(
            reqwest::Method::POST,
            "/appsec/v2/applications/app-guid/annotations",
            &[],
            Some(br#"{"issue_list":"1","action":"COMMENT"}"#.to_vec()),
        )
        .await
        .expect("post succeeds");
    assert!(body.is_empty());

    let request = server.await.expect("server task");
    let lower = request.to_ascii_lowercase();
    assert!(lower.contains("content-type: application/json"));
    assert!(request.ends_with(r#"{"issue_list":"1","action":"COMMENT"}"#));
}

#[tokio::test]
async fn test_404_surfaces_status_and_verbatim_body() {
    let (base_url, server) =
        serve_once(http_response("404 Not Found", r#"{"message":"not found"}"#)).await;

    let client = client_for(&base_url);
    let err = client
        .applications_api()
        .get_application("missing-guid")
        .await
        .expect_err("404 is an error");
    server.await.expect("server task");

    assert_eq!(err.status_code(), Some(404));
    match err {
        VeracodeError::Http(http) => {
            assert_eq!(http.status_code, 404);
            assert_eq!(http.status, "404 Not Found");
            assert_eq!(http.body_text(), r#"{"message":"not found"}"#);
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(socket);
    });

    let config = VeracodeConfig::new(KEY_ID, KEY_SECRET)
        .with_base_url(format!("http://{addr}"))
        .with_timeouts(Duration::from_secs(1), Duration::from_millis(200));
    let client = VeracodeClient::new(config).expect("client builds");

    let err = client
        .identity_api()
        .get_principal()
        .await
        .expect_err("server never answers");
    assert!(matches!(err, VeracodeError::Transport(_)));
    assert!(err.is_timeout());

    server.abort();
}

#[tokio::test]
async fn test_health_check() {
    let (base_url, server) = serve_once(http_response("200 OK", "")).await;

    client_for(&base_url)
        .health_check()
        .await
        .expect("healthy");

    let request = server.await.expect("server task");
    assert!(request.starts_with("GET /healthcheck/status HTTP/1.1"));
}
