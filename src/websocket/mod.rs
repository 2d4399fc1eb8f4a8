//! WebSocket upgrade handler and the per-socket reader/writer task pair.
//!
//! Each live connection owns two Tokio tasks instead of one: a reader that
//! only ever consumes frames and a writer that owns the socket's send half.
//! They communicate with the rest of the process exclusively through the
//! [`crate::hub::Hub`] — neither task ever touches another connection's
//! state directly.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Duration};

use crate::auth;
use crate::hub::Envelope;
use crate::state::AppState;

const WRITE_WAIT: Duration = Duration::from_secs(10);
const PONG_WAIT: Duration = Duration::from_secs(60);
const PING_PERIOD: Duration = Duration::from_secs(54);
const MAX_INBOUND_FRAME_BYTES: usize = 64 * 1024;
const OUTBOUND_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// Inbound client→server frame. Unparseable frames are dropped, not fatal —
/// a malformed frame must never close the socket.
#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    kind: String,
    payload: Value,
}

/// `GET /api/ws?token=<bearer>` — the token arrives as a query parameter
/// because a browser `WebSocket` cannot set an `Authorization` header on the
/// handshake request.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    let (user_id, username) = match auth::user_from_query_token(&params.token, &state.jwt_secret) {
        Ok(pair) => pair,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user_id, username, state))
}

async fn handle_socket(socket: WebSocket, user_id: i64, username: String, state: AppState) {
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Envelope>(OUTBOUND_QUEUE_DEPTH);

    let conn_id = state.hub.register(user_id, username, tx);

    let mut writer = tokio::spawn(run_writer(ws_sender, rx));
    let mut reader = tokio::spawn(run_reader(ws_receiver, user_id, state.clone()));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    state.hub.unregister(user_id, conn_id);
}

/// Reads frames until a read error, a close frame, or a missed pong deadline.
/// Any of these trigger the caller's unregister — never fatal to the process.
async fn run_reader(
    mut ws_receiver: futures::stream::SplitStream<WebSocket>,
    user_id: i64,
    state: AppState,
) {
    loop {
        let next = match timeout(PONG_WAIT, ws_receiver.next()).await {
            Ok(Some(Ok(msg))) => msg,
            // Pong deadline exceeded, read error, or stream closed — all the
            // same outcome: tear the connection down.
            Ok(Some(Err(_))) | Ok(None) | Err(_) => break,
        };

        match next {
            Message::Text(text) => {
                if text.len() > MAX_INBOUND_FRAME_BYTES {
                    tracing::debug!(user_id, "dropping oversized inbound frame");
                    continue;
                }
                handle_inbound_frame(user_id, &text, &state).await;
            }
            Message::Close(_) => break,
            // Pong frames just reset the timeout on the next loop iteration;
            // ping frames are answered transparently by the underlying library.
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }
}

/// Drains the outbound queue onto the socket, pinging on a fixed period.
/// Exits on any write error or once the queue is closed by the hub (which
/// only happens when this connection is evicted or unregistered).
async fn run_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Envelope>,
) {
    let mut ping_ticker = interval(PING_PERIOD);
    ping_ticker.tick().await; // first tick fires immediately; discard it

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(envelope) => {
                        let Ok(json) = serde_json::to_string(&envelope) else {
                            continue;
                        };
                        if timeout(WRITE_WAIT, ws_sender.send(Message::Text(json))).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = timeout(WRITE_WAIT, ws_sender.send(Message::Close(None))).await;
                        break;
                    }
                }
            }
            _ = ping_ticker.tick() => {
                if timeout(WRITE_WAIT, ws_sender.send(Message::Ping(Vec::new()))).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn handle_inbound_frame(sender_id: i64, text: &str, state: &AppState) {
    let Ok(frame) = serde_json::from_str::<ClientFrame>(text) else {
        return;
    };

    match frame.kind.as_str() {
        "typing" => {
            let Some(to) = frame.payload.get("to").and_then(Value::as_i64) else {
                return;
            };
            let envelope = Envelope::relay("typing", sender_id, to, frame.payload.clone());
            state.hub.send_message(to, envelope).await;
        }
        kind @ ("call_offer" | "call_answer" | "call_ice" | "call_end") => {
            let Some(to) = frame.payload.get("to").and_then(Value::as_i64) else {
                return;
            };
            let data = frame.payload.get("data").cloned().unwrap_or(Value::Null);
            let envelope = Envelope::relay(kind, sender_id, to, data);
            state.hub.send_message(to, envelope).await;
        }
        // No other inbound types are defined; unknown types are ignored.
        _ => {}
    }
}
