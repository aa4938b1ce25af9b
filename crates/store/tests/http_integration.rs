//! HTTP store integration tests
//!
//! Drives `HttpStore` against a loopback document service stub so the
//! poll-watch and merge-notify contracts run over a real socket: the first
//! fetch is a baseline (no event), remote changes become full-snapshot
//! events, merges notify immediately, and a missing document loads empty.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use hueport_store::{Document, DocumentPath, DocumentStore, HttpStore};

/// The stub service's single document; `None` answers 404
type SharedDoc = Arc<Mutex<Option<Value>>>;

fn mixer() -> DocumentPath {
    DocumentPath::new("colors", "mixer")
}

fn content_length(head: &str) -> usize {
    for line in head.lines() {
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                return value.trim().parse().unwrap_or(0);
            }
        }
    }
    0
}

/// True once the request head and its announced body have arrived
fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    match text.find("\r\n\r\n") {
        Some(head_end) => raw.len() >= head_end + 4 + content_length(&text[..head_end]),
        None => false,
    }
}

fn respond(request: &str, doc: &SharedDoc) -> String {
    let method = request.split_whitespace().next().unwrap_or("");
    let mut state = doc.lock().unwrap();
    match method {
        "GET" => match state.as_ref() {
            Some(value) => {
                let body = value.to_string();
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
            }
            None => {
                "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    .to_string()
            }
        },
        "PATCH" => {
            let body_start = request.find("\r\n\r\n").map_or(request.len(), |i| i + 4);
            let patch: Value =
                serde_json::from_str(&request[body_start..]).unwrap_or(Value::Null);
            let merged = state.get_or_insert_with(|| json!({}));
            if let (Some(target), Some(fields)) = (merged.as_object_mut(), patch.as_object()) {
                for (field, value) in fields {
                    target.insert(field.clone(), value.clone());
                }
            }
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
        }
        _ => "HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string(),
    }
}

/// Serve `GET`/`PATCH {base}/colors/mixer` from `doc` on a loopback port,
/// merging PATCH bodies the way a document service would
async fn spawn_document_service(doc: SharedDoc) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let doc = doc.clone();
            tokio::spawn(async move {
                let mut raw = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let Ok(n) = socket.read(&mut buf).await else {
                        return;
                    };
                    if n == 0 {
                        return;
                    }
                    raw.extend_from_slice(&buf[..n]);
                    if request_complete(&raw) {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&raw).into_owned();
                let response = respond(&request, &doc);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

/// A document the service does not have yet loads as the empty document
#[tokio::test]
async fn test_missing_document_loads_empty() {
    let doc: SharedDoc = Arc::new(Mutex::new(None));
    let base = spawn_document_service(doc).await;
    let store = HttpStore::new(base, Duration::from_secs(3600));

    let loaded = store.load(&mixer()).await.unwrap();
    assert!(loaded.is_empty());
}

/// The first poll only establishes the baseline; events begin with the
/// first change after it
#[tokio::test]
async fn test_watch_reports_changes_but_not_the_baseline() {
    let doc: SharedDoc = Arc::new(Mutex::new(Some(json!({ "red": "0.2" }))));
    let base = spawn_document_service(doc.clone()).await;
    let store = HttpStore::new(base, Duration::from_millis(100));

    let mut events = store.watch(&mixer()).await.unwrap();

    // Several poll cycles pass over the unchanged document in silence
    let silence = tokio::time::timeout(Duration::from_millis(500), events.recv()).await;
    assert!(silence.is_err(), "baseline fetch must not produce an event");

    *doc.lock().unwrap() = Some(json!({ "red": "0.9" }));

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a change event")
        .unwrap();
    assert_eq!(event.path, mixer());
    assert_eq!(event.document.get("red"), Some(&json!("0.9")));
}

/// A merge notifies watchers at once with the merged snapshot, keeping
/// fields the patch did not carry
#[tokio::test]
async fn test_merge_notifies_watchers_with_the_merged_snapshot() {
    let doc: SharedDoc = Arc::new(Mutex::new(Some(json!({ "red": "0.2" }))));
    let base = spawn_document_service(doc.clone()).await;
    // Poll far slower than the test, so the only possible event source is
    // the merge itself
    let store = HttpStore::new(base, Duration::from_secs(3600));

    let mut events = store.watch(&mixer()).await.unwrap();

    store
        .merge(&mixer(), Document::single("blue", json!("0.5")))
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for the merge notification")
        .unwrap();
    assert_eq!(event.document.get("red"), Some(&json!("0.2")));
    assert_eq!(event.document.get("blue"), Some(&json!("0.5")));

    // The service itself saw the merged write
    let served = doc.lock().unwrap().clone().unwrap();
    assert_eq!(served, json!({ "red": "0.2", "blue": "0.5" }));
}

/// Loading refreshes the poll baseline, so the poll after a load reports
/// nothing new
#[tokio::test]
async fn test_load_refreshes_the_poll_baseline() {
    let doc: SharedDoc = Arc::new(Mutex::new(Some(json!({ "green": "1.0" }))));
    let base = spawn_document_service(doc.clone()).await;
    // The first tick establishes the baseline; the next fires at t+1s,
    // long after the change-then-load below has settled
    let store = HttpStore::new(base, Duration::from_secs(1));

    let mut events = store.watch(&mixer()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await; // baseline settles

    // Change the document, then load it before the next poll fires
    *doc.lock().unwrap() = Some(json!({ "green": "2.0" }));
    let loaded = store.load(&mixer()).await.unwrap();
    assert_eq!(loaded.get("green"), Some(&json!("2.0")));

    // The poller sees exactly what the load recorded: no event
    let silence = tokio::time::timeout(Duration::from_millis(1400), events.recv()).await;
    assert!(silence.is_err(), "a load must not replay as a change event");
}
