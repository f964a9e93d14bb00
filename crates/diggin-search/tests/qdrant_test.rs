//! `QdrantCollection` against a scripted HTTP server.
//!
//! The server speaks just enough HTTP/1.1 for reqwest: one request per
//! connection, `Content-Length` bodies, `Connection: close` responses.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use diggin_search::{QdrantCollection, StoreError, VectorCollection};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Default)]
struct FakeQdrant {
    created: bool,
    indexed: Vec<String>,
    /// Index requests still to answer with a 500.
    failing_index_puts: usize,
    /// `"METHOD /path"` of every request, in arrival order.
    requests: Vec<String>,
}

impl FakeQdrant {
    fn handle(&mut self, method: &str, target: &str, body: &str) -> (u16, Value) {
        self.requests.push(format!("{method} {target}"));
        let path = target.split('?').next().unwrap_or(target);

        match (method, path) {
            ("GET", "/collections/albums") if self.created => {
                let schema: serde_json::Map<String, Value> = self
                    .indexed
                    .iter()
                    .map(|f| (f.clone(), json!({ "data_type": "keyword" })))
                    .collect();
                (
                    200,
                    json!({ "result": { "status": "green", "payload_schema": schema } }),
                )
            }
            ("GET", "/collections/albums") => {
                (404, json!({ "status": { "error": "Not found: Collection `albums` doesn't exist!" } }))
            }
            ("PUT", "/collections/albums") => {
                self.created = true;
                (200, json!({ "result": true, "status": "ok" }))
            }
            ("PUT", "/collections/albums/index") if self.failing_index_puts > 0 => {
                self.failing_index_puts -= 1;
                (500, json!({ "status": { "error": "Service internal error" } }))
            }
            ("PUT", "/collections/albums/index") => {
                let request: Value = serde_json::from_str(body).unwrap();
                let field = request["field_name"].as_str().unwrap().to_string();
                if !self.indexed.contains(&field) {
                    self.indexed.push(field);
                }
                (200, json!({ "result": { "status": "completed" }, "status": "ok" }))
            }
            _ => (404, json!({ "status": { "error": "unexpected request" } })),
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<(String, String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < end + 4 + content_length {
                let n = stream.read(&mut chunk).await.ok()?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = String::from_utf8_lossy(&buf[end + 4..]).to_string();
            let mut request_line = head.lines().next()?.split_whitespace();
            let method = request_line.next()?.to_string();
            let target = request_line.next()?.to_string();
            return Some((method, target, body));
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Serve `fake` on an ephemeral port and return the base URL.
async fn serve(fake: Arc<Mutex<FakeQdrant>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let fake = Arc::clone(&fake);
            tokio::spawn(async move {
                let Some((method, target, body)) = read_request(&mut stream).await else {
                    return;
                };
                let (status, payload) = fake.lock().unwrap().handle(&method, &target, &body);
                let payload = payload.to_string();
                let response = format!(
                    "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
                    payload.len()
                );
                stream.write_all(response.as_bytes()).await.ok();
                stream.shutdown().await.ok();
            });
        }
    });
    format!("http://{addr}")
}

async fn collection_on(fake: &Arc<Mutex<FakeQdrant>>) -> QdrantCollection {
    let base_url = serve(Arc::clone(fake)).await;
    QdrantCollection::new(&base_url, "albums", 768, Duration::from_secs(5)).unwrap()
}

fn index_requests(fake: &Arc<Mutex<FakeQdrant>>) -> usize {
    fake.lock()
        .unwrap()
        .requests
        .iter()
        .filter(|r| r.starts_with("PUT /collections/albums/index"))
        .count()
}

#[tokio::test]
async fn test_fresh_collection_gets_both_indices() {
    let fake = Arc::new(Mutex::new(FakeQdrant::default()));
    let collection = collection_on(&fake).await;

    collection.ensure_collection().await.unwrap();

    let state = fake.lock().unwrap();
    assert!(state.created);
    assert_eq!(state.indexed, vec!["artist", "title"]);
    assert_eq!(state.requests[0], "GET /collections/albums");
    assert_eq!(state.requests[1], "PUT /collections/albums");
}

#[tokio::test]
async fn test_failed_index_is_created_on_next_ensure() {
    let fake = Arc::new(Mutex::new(FakeQdrant {
        failing_index_puts: 1,
        ..FakeQdrant::default()
    }));
    let collection = collection_on(&fake).await;

    let err = collection.ensure_collection().await.unwrap_err();
    assert!(matches!(err, StoreError::Api { status: 500, .. }));
    assert!(err.is_transient());
    assert!(fake.lock().unwrap().indexed.is_empty());

    collection.ensure_collection().await.unwrap();

    let state = fake.lock().unwrap();
    assert_eq!(state.indexed, vec!["artist", "title"]);
    // The collection itself was only created once.
    let creates = state
        .requests
        .iter()
        .filter(|r| r.as_str() == "PUT /collections/albums")
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test]
async fn test_missing_index_on_existing_collection_is_added() {
    let fake = Arc::new(Mutex::new(FakeQdrant {
        created: true,
        indexed: vec!["artist".to_string()],
        ..FakeQdrant::default()
    }));
    let collection = collection_on(&fake).await;

    collection.ensure_collection().await.unwrap();

    assert_eq!(fake.lock().unwrap().indexed, vec!["artist", "title"]);
    assert_eq!(index_requests(&fake), 1);
}

#[tokio::test]
async fn test_ensure_is_a_read_when_everything_exists() {
    let fake = Arc::new(Mutex::new(FakeQdrant::default()));
    let collection = collection_on(&fake).await;

    collection.ensure_collection().await.unwrap();
    let before = fake.lock().unwrap().requests.len();
    collection.ensure_collection().await.unwrap();

    let state = fake.lock().unwrap();
    assert_eq!(&state.requests[before..], &["GET /collections/albums".to_string()]);
    drop(state);
    assert_eq!(index_requests(&fake), 2);
}
