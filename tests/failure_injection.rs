//! Failure injection tests for the gateway.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

#[tokio::test]
async fn unreachable_backend_is_502() {
    let auth = common::start_mock_backend("auth").await;
    let books = common::closed_port().await;
    let gateway = common::spawn_gateway(common::gateway_config(auth, books, false)).await;
    let client = common::client();

    let res = client.get(gateway.url("/api/books")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "status": "error",
            "message": "Books Service Unavailable",
            "error": "Books Service Unavailable",
        })
    );

    // A dead backend does not affect its neighbours.
    let res = client.get(gateway.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "auth");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn slow_backend_is_bounded_by_route_timeout() {
    let books = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        (200, "late".to_string())
    })
    .await;
    let auth = common::closed_port().await;

    let mut config = common::gateway_config(auth, books, false);
    config.routes[1].timeout_secs = Some(1);
    let gateway = common::spawn_gateway(config).await;

    let start = Instant::now();
    let res = common::client().get(gateway.url("/api/books")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert!(start.elapsed() < Duration::from_secs(5), "took {:?}", start.elapsed());

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn backend_errors_are_relayed_unchanged() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let books = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (500, r#"{"message":"db down"}"#.to_string())
        }
    })
    .await;
    let auth = common::closed_port().await;
    let gateway = common::spawn_gateway(common::gateway_config(auth, books, false)).await;

    let res = common::client().get(gateway.url("/api/books")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), r#"{"message":"db down"}"#);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "failed requests are never retried");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_stops_the_server() {
    let down = common::closed_port().await;
    let gateway = common::spawn_gateway(common::gateway_config(down, down, false)).await;

    let res = common::client().get(gateway.url("/api/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    gateway.shutdown.trigger();
    let outcome = tokio::time::timeout(Duration::from_secs(5), gateway.task).await;
    assert!(matches!(outcome, Ok(Ok(Ok(())))), "server did not stop cleanly");
}

#[tokio::test]
async fn queued_requests_are_bounded_by_request_deadline() {
    let books = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        (200, "late".to_string())
    })
    .await;
    let auth = common::closed_port().await;

    let mut config = common::gateway_config(auth, books, false);
    config.listener.max_concurrent_requests = 1;
    config.timeouts.request_secs = 2;
    config.routes[1].timeout_secs = Some(1);
    let gateway = common::spawn_gateway(config).await;
    let client = common::client();

    let start = Instant::now();
    let mut tasks = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        let url = gateway.url("/api/books");
        tasks.push(tokio::spawn(async move {
            let res = client.get(&url).send().await.unwrap();
            let status = res.status().as_u16();
            let body: Value = res.json().await.unwrap();
            (status, body)
        }));
    }

    let mut statuses = Vec::new();
    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(body["status"], "error");
        statuses.push(status);
    }

    // Five requests through one slot would take five route timeouts without the ceiling.
    assert!(start.elapsed() < Duration::from_millis(3500), "took {:?}", start.elapsed());
    assert!(statuses.iter().all(|s| *s == 502 || *s == 408), "{:?}", statuses);
    assert!(statuses.contains(&408), "{:?}", statuses);

    gateway.shutdown.trigger();
}

/// Read one HTTP/1.1 response with a Content-Length body, or whatever arrives before EOF.
async fn read_response(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }

        let text = String::from_utf8_lossy(&buf);
        if let Some((head, body)) = text.split_once("\r\n\r\n") {
            let length = head.lines().find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            });
            if length.is_some_and(|len| body.len() >= len) {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[tokio::test]
async fn stalled_request_body_times_out_with_json_error() {
    let auth = common::start_echo_backend().await;
    let books = common::closed_port().await;
    let mut config = common::gateway_config(auth, books, false);
    config.timeouts.request_secs = 1;
    let gateway = common::spawn_gateway(config).await;

    let mut stream = TcpStream::connect(gateway.addr).await.unwrap();
    stream
        .write_all(
            b"POST /api/auth/login HTTP/1.1\r\n\
              Host: gateway\r\n\
              Content-Type: application/json\r\n\
              Content-Length: 100\r\n\r\n\
              {\"email\":",
        )
        .await
        .unwrap();

    let start = Instant::now();
    let response = tokio::time::timeout(Duration::from_secs(5), read_response(&mut stream))
        .await
        .expect("gateway never answered");

    assert!(start.elapsed() < Duration::from_secs(3), "took {:?}", start.elapsed());
    assert!(response.starts_with("HTTP/1.1 408"), "{}", response);

    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    let body: Value = serde_json::from_str(body).unwrap();
    assert_eq!(body, json!({ "status": "error", "message": "Request timed out" }));

    gateway.shutdown.trigger();
}

/// Sets the flag when the backend handler future goes away, finished or not.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn client_disconnect_cancels_backend_request() {
    let dropped = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicU32::new(0));

    let (flag, done) = (dropped.clone(), completed.clone());
    let app = axum::Router::new().fallback(move || {
        let (flag, done) = (flag.clone(), done.clone());
        async move {
            let _guard = DropFlag(flag);
            tokio::time::sleep(Duration::from_secs(10)).await;
            done.fetch_add(1, Ordering::SeqCst);
            "late"
        }
    });
    let books = common::start_backend(app).await;
    let auth = common::closed_port().await;

    let mut config = common::gateway_config(auth, books, false);
    config.routes[1].timeout_secs = Some(20);
    let gateway = common::spawn_gateway(config).await;

    let impatient = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let err = impatient.get(gateway.url("/api/books")).send().await.unwrap_err();
    assert!(err.is_timeout());
    drop(impatient);

    let start = Instant::now();
    while !dropped.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert!(dropped.load(Ordering::SeqCst), "backend request outlived the client");
    assert_eq!(completed.load(Ordering::SeqCst), 0);

    gateway.shutdown.trigger();
}
