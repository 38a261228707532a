// crates/hub-server/tests/server.rs
//
// Full stack over TCP: listener, upgrade, identity headers, hub.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hub_server::config::Config;
use hub_server::identity::TrustedHeaders;
use hub_server::server;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_test_server(max_clients: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = Config {
        max_clients,
        ..Config::default()
    };

    tokio::spawn(async move {
        let _ = server::serve(listener, config, TrustedHeaders::default()).await;
    });

    addr
}

async fn dial(addr: SocketAddr, path: &str, identity: Option<(i64, &str)>) -> Result<Client, WsError> {
    let mut request = format!("ws://{addr}{path}").into_client_request()?;
    if let Some((user_id, name)) = identity {
        let headers = request.headers_mut();
        headers.insert("x-user-id", user_id.to_string().parse().unwrap());
        headers.insert("x-user-name", name.parse().unwrap());
    }
    let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(ws)
}

async fn next_text(ws: &mut Client) -> String {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("transport error");
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

async fn next_json(ws: &mut Client) -> Value {
    serde_json::from_str(&next_text(ws).await).unwrap()
}

fn expect_http_status(result: Result<Client, WsError>, expected: StatusCode) {
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), expected),
        Err(other) => panic!("expected HTTP {expected}, got {other:?}"),
        Ok(_) => panic!("expected HTTP {expected}, upgrade succeeded"),
    }
}

#[tokio::test]
async fn users_chat_over_tcp() {
    let addr = start_test_server(16).await;
    let mut alice = dial(addr, "/ws", Some((1, "alice"))).await.unwrap();
    let mut bob = dial(addr, "/ws", Some((2, "bob"))).await.unwrap();

    assert_eq!(
        next_json(&mut alice).await,
        json!({"type": "status", "data": {"user_id": 2, "username": "bob", "online": true}})
    );

    alice
        .send(Message::Text(json!({"receiver_id": 2, "content": "hi"}).to_string()))
        .await
        .unwrap();

    assert_eq!(next_text(&mut bob).await, "hi");

    bob.close(None).await.unwrap();
    assert_eq!(
        next_json(&mut alice).await,
        json!({"type": "status", "data": {"user_id": 2, "username": "bob", "online": false}})
    );
}

#[tokio::test]
async fn upgrade_without_identity_is_unauthorized() {
    let addr = start_test_server(16).await;
    expect_http_status(dial(addr, "/ws", None).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let addr = start_test_server(16).await;
    expect_http_status(
        dial(addr, "/elsewhere", Some((1, "alice"))).await,
        StatusCode::NOT_FOUND,
    );
}

#[tokio::test]
async fn connections_beyond_max_clients_are_refused() {
    let addr = start_test_server(2).await;
    let mut alice = dial(addr, "/ws", Some((1, "alice"))).await.unwrap();
    let _bob = dial(addr, "/ws", Some((2, "bob"))).await.unwrap();

    // Once alice has seen bob arrive, both are registered.
    assert_eq!(next_json(&mut alice).await["data"]["user_id"], 2);

    assert!(dial(addr, "/ws", Some((3, "carol"))).await.is_err());
}
