//! Integration tests for the chat WebSocket.
//!
//! Each test spins up an Axum server on a random port, connects via
//! tokio-tungstenite, and walks a conversation over the real protocol.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use decision_chat::config::ChatConfig;
use decision_chat::conversation::SessionRegistry;
use decision_chat::server::chat_routes;
use decision_chat::tree::{DecisionTree, parse_tree};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const TREE: &str = r#"{
    "language_select": {
        "message": "Hi\nWelcome",
        "options": [
            {"label": "<b>English</b>", "next": "en_menu"},
            {"label": "Klingon", "next": "missing_state"}
        ]
    },
    "en_menu": {
        "message": "Menu",
        "products": [
            {"title": "Tent", "description": "Sleeps two", "images": ["t1.jpg", "t2.jpg"], "price": "$19.99"},
            {"title": "Stove", "description": "Compact", "images": ["s1.jpg", "s2.jpg"], "price": "$19.99"}
        ]
    }
}"#;

fn tree() -> Arc<DecisionTree> {
    Arc::new(parse_tree("test", TREE).unwrap())
}

/// Start an Axum server on a random port, return (port, registry).
async fn start_server(tree: Option<Arc<DecisionTree>>) -> (u16, Arc<SessionRegistry>) {
    let config = ChatConfig {
        typing_delay: Duration::from_millis(100),
        ..ChatConfig::default()
    };
    let registry = SessionRegistry::new(tree, &config);
    let app = chat_routes(Arc::clone(&registry));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, registry)
}

async fn connect(port: u16) -> Ws {
    let (ws, _resp) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
        .await
        .expect("WS connect failed");
    ws
}

/// Next text frame as JSON.
async fn next_json(ws: &mut Ws) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(txt) => return serde_json::from_str(&txt).expect("invalid JSON from server"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected Text frame, got {:?}", other),
        }
    }
}

async fn send(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

fn appended_types(ops: &Value) -> Vec<String> {
    ops.as_array()
        .unwrap()
        .iter()
        .filter(|op| op["op"] == "append")
        .map(|op| op["entry"]["type"].as_str().unwrap().to_string())
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_receives_initial_render() {
    timeout(TEST_TIMEOUT, async {
        let (port, registry) = start_server(Some(tree())).await;
        let mut ws = connect(port).await;

        let sync = next_json(&mut ws).await;
        assert_eq!(sync["type"], "sync");
        assert_eq!(sync["current"], "language_select");

        let entries = sync["entries"].as_array().unwrap();
        assert_eq!(entries[0]["type"], "header");
        assert_eq!(entries[1]["type"], "bot");
        assert_eq!(entries[1]["html"], "Hi<br>Welcome");
        assert_eq!(entries[2]["type"], "options");

        let choices = entries[2]["choices"].as_array().unwrap();
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0]["label_text"], "English");
        assert_eq!(choices[0]["next"], "en_menu");
        assert_eq!(choices[1]["next"], "missing_state");

        assert_eq!(registry.len().await, 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn select_echoes_then_renders_after_delay() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server(Some(tree())).await;
        let mut ws = connect(port).await;
        let _ = next_json(&mut ws).await;

        send(&mut ws, serde_json::json!({"type": "select", "index": 0})).await;

        // Echo batch: user entry + option removal, no bot content yet.
        let echo = next_json(&mut ws).await;
        assert_eq!(echo["type"], "ops");
        assert_eq!(appended_types(&echo["ops"]), ["user"]);
        assert_eq!(echo["ops"][0]["entry"]["text"], "English");
        assert!(
            echo["ops"]
                .as_array()
                .unwrap()
                .iter()
                .any(|op| op["op"] == "remove_options")
        );

        // Render batch: the target state's bot entry, no controls (leaf).
        let render = next_json(&mut ws).await;
        assert_eq!(appended_types(&render["ops"]), ["bot"]);
        let bot = &render["ops"][0]["entry"];
        assert_eq!(bot["html"], "Menu");

        let products = bot["products"].as_array().unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0]["title"], "Tent");
        assert_eq!(products[1]["title"], "Stove");
        assert_eq!(products[0]["images"][0]["src"], "t1.jpg");
        assert_eq!(products[0]["images"][1]["src"], "t2.jpg");
        assert_eq!(products[1]["price"], "$19.99");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dangling_option_stalls_silently() {
    timeout(TEST_TIMEOUT, async {
        let (port, registry) = start_server(Some(tree())).await;
        let mut ws = connect(port).await;
        let sync = next_json(&mut ws).await;
        let session_id = sync["session_id"].as_str().unwrap().parse().unwrap();

        send(&mut ws, serde_json::json!({"type": "select", "index": 1})).await;
        let echo = next_json(&mut ws).await;
        assert_eq!(echo["ops"][0]["entry"]["text"], "Klingon");

        // Nothing else arrives.
        let more = timeout(Duration::from_millis(200), ws.next()).await;
        assert!(more.is_err(), "expected no further frames");

        let session = registry.get(session_id).await.unwrap();
        let snap = session.snapshot().await;
        assert_eq!(snap.current.as_deref(), Some("language_select"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn reset_restores_initial_transcript() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server(Some(tree())).await;
        let mut ws = connect(port).await;
        let _ = next_json(&mut ws).await;

        send(&mut ws, serde_json::json!({"type": "select", "index": 0})).await;
        let _echo = next_json(&mut ws).await;
        let _render = next_json(&mut ws).await;

        send(&mut ws, serde_json::json!({"type": "reset"})).await;
        let reset = next_json(&mut ws).await;
        let ops = reset["ops"].as_array().unwrap();
        assert_eq!(ops[0]["op"], "clear");
        assert_eq!(appended_types(&reset["ops"]), ["header", "bot", "options"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn reset_during_typing_drops_stale_render() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server(Some(tree())).await;
        let mut ws = connect(port).await;
        let _ = next_json(&mut ws).await;

        send(&mut ws, serde_json::json!({"type": "select", "index": 0})).await;
        send(&mut ws, serde_json::json!({"type": "reset"})).await;

        let echo = next_json(&mut ws).await;
        assert_eq!(appended_types(&echo["ops"]), ["user"]);
        let reset = next_json(&mut ws).await;
        assert_eq!(reset["ops"][0]["op"], "clear");

        // The scheduled render for en_menu never shows up.
        let more = timeout(Duration::from_millis(200), ws.next()).await;
        assert!(more.is_err(), "stale render leaked after reset");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_selection_gets_error_reply() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server(Some(tree())).await;
        let mut ws = connect(port).await;
        let _ = next_json(&mut ws).await;

        send(&mut ws, serde_json::json!({"type": "select", "index": 9})).await;
        let reply = next_json(&mut ws).await;
        assert_eq!(reply["type"], "error");
        assert!(reply["message"].as_str().unwrap().contains("index 9"));

        send(&mut ws, serde_json::json!({"type": "dance"})).await;
        let reply = next_json(&mut ws).await;
        assert_eq!(reply["type"], "error");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unloaded_tree_shows_single_error_entry() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server(None).await;
        let mut ws = connect(port).await;

        let sync = next_json(&mut ws).await;
        let entries = sync["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["type"], "error");
        assert!(sync["current"].is_null());

        send(&mut ws, serde_json::json!({"type": "select", "index": 0})).await;
        let reply = next_json(&mut ws).await;
        assert_eq!(reply["type"], "error");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn disconnect_removes_session() {
    timeout(TEST_TIMEOUT, async {
        let (port, registry) = start_server(Some(tree())).await;
        let mut ws = connect(port).await;
        let _ = next_json(&mut ws).await;
        assert_eq!(registry.len().await, 1);

        ws.close(None).await.unwrap();

        for _ in 0..50 {
            if registry.is_empty().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session was not removed after disconnect");
    })
    .await
    .expect("test timed out");
}
