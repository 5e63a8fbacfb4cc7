use relay_xhr::{ReadyState, RelayConfig, Runtime, XmlHttpRequest, run_event_loop};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

/// Minimal relay: answers one descriptor with the lines built by `reply`
/// and returns the descriptor's query parameters.
async fn serve_once(
    listener: TcpListener,
    reply: impl Fn(&str) -> Vec<String>,
) -> HashMap<String, String> {
    let (mut socket, _) = listener.accept().await.expect("accept");

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.expect("read request");
        assert!(n > 0, "client closed before sending a request");
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf).to_string();
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .expect("request line");
    let params: HashMap<String, String> = Url::parse(&format!("http://relay{}", target))
        .expect("descriptor")
        .query_pairs()
        .into_owned()
        .collect();

    socket
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n",
        )
        .await
        .unwrap();

    // Stream line by line so the client sees several chunks
    for line in reply(&params["object"]) {
        socket.write_all(line.as_bytes()).await.unwrap();
        socket.write_all(b"\n").await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let _ = socket.shutdown().await;

    params
}

async fn wait_for_done(runtime: &mut Runtime, request: &XmlHttpRequest) {
    for _ in 0..300 {
        runtime.process_callbacks();
        if request.ready_state() == ReadyState::Done {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("request did not finish: {:?}", request);
}

fn config_for(listener: &TcpListener) -> RelayConfig {
    let addr = listener.local_addr().unwrap();
    RelayConfig::new(Url::parse(&format!("http://{}/proxy.js", addr)).unwrap())
        .with_base_url(Url::parse("https://app.test/index.html").unwrap())
        .with_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_relay_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&listener);

    let server = tokio::spawn(serve_once(listener, |object| {
        vec![
            json!({"object": object, "event": "liveness"}).to_string(),
            json!({
                "object": object,
                "event": "headers_received",
                "status": 201,
                "statusText": "Created",
                "headers": {"Content-Type": "text/plain", "Location": "/items/7"}
            })
            .to_string(),
            json!({"object": object, "event": "body_chunk", "text": "line one\n"}).to_string(),
            json!({"object": object, "event": "body_chunk", "text": "line two"}).to_string(),
            json!({"object": object, "event": "done"}).to_string(),
        ]
    }));

    let (mut runtime, scheduler_rx, callback_tx) = Runtime::new(config);
    let event_loop = tokio::spawn(run_event_loop(scheduler_rx, callback_tx));

    let request = runtime.request();
    request.open("POST", "/items").unwrap();
    request.set_request_header("X-Client", "tests").unwrap();
    request.send_body("name=seven").unwrap();

    wait_for_done(&mut runtime, &request).await;

    assert_eq!(request.status(), Some(201));
    assert_eq!(request.status_text().as_deref(), Some("Created"));
    assert_eq!(
        request.get_response_header("location").as_deref(),
        Some("/items/7")
    );
    assert_eq!(
        request.response_text().as_deref(),
        Some("line one\nline two")
    );
    assert_eq!(runtime.open_requests(), 0);

    let params = server.await.unwrap();
    assert_eq!(params["url"], "https://app.test/items");
    assert_eq!(params["method"], "POST");
    assert_eq!(params["data"], "name=seven");
    assert!(params["object"].starts_with("relayRequests["));

    drop(runtime);
    let _ = tokio::time::timeout(Duration::from_secs(1), event_loop).await;
}

#[tokio::test]
async fn test_relay_noise_is_ignored() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&listener);

    let server = tokio::spawn(serve_once(listener, |object| {
        vec![
            format!("{}.status = 200;", object),
            json!({"object": "relayRequests[1]", "event": "done"}).to_string(),
            json!({"object": "somethingElse", "event": "done"}).to_string(),
            json!({"object": object, "event": "teleport"}).to_string(),
            json!({"object": object, "event": "headers_received", "status": 200}).to_string(),
            json!({"object": object, "event": "done"}).to_string(),
        ]
    }));

    let (mut runtime, scheduler_rx, callback_tx) = Runtime::new(config);
    let event_loop = tokio::spawn(run_event_loop(scheduler_rx, callback_tx));

    let request = runtime.request();
    request.open("GET", "https://api.test/x").unwrap();
    request.send().unwrap();

    wait_for_done(&mut runtime, &request).await;

    assert_eq!(request.status(), Some(200));
    assert_eq!(request.status_text().as_deref(), Some(""));
    assert_eq!(request.response_text(), None);

    server.await.unwrap();
    drop(runtime);
    let _ = tokio::time::timeout(Duration::from_secs(1), event_loop).await;
}

#[tokio::test]
async fn test_unreachable_relay_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&listener).with_timeout(Duration::from_millis(100));
    drop(listener);

    let (mut runtime, scheduler_rx, callback_tx) = Runtime::new(config);
    let event_loop = tokio::spawn(run_event_loop(scheduler_rx, callback_tx));

    let request = runtime.request();
    request.open("GET", "/x").unwrap();
    request.send().unwrap();

    wait_for_done(&mut runtime, &request).await;

    assert_eq!(request.status(), Some(504));
    assert_eq!(request.status_text().as_deref(), Some("Gateway Timeout"));

    drop(runtime);
    let _ = tokio::time::timeout(Duration::from_secs(1), event_loop).await;
}
