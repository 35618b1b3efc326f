//! WebSocket upgrade + message loop. Each connection owns one wizard session, created on
//! connect and dropped on disconnect. Every client command is parsed as JSON and forwarded
//! to core logic; each resulting server message is sent as its own frame.

use std::sync::Arc;
use async_trait::async_trait;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::logic::handle_message;
use crate::state::AppState;

/// The two socket operations the session loop needs.
#[async_trait]
trait Frames: Send {
  async fn recv_frame(&mut self) -> Option<Result<Message, axum::Error>>;
  async fn send_frame(&mut self, msg: Message) -> Result<(), axum::Error>;
}

#[async_trait]
impl Frames for WebSocket {
  async fn recv_frame(&mut self) -> Option<Result<Message, axum::Error>> {
    self.recv().await
  }

  async fn send_frame(&mut self, msg: Message) -> Result<(), axum::Error> {
    self.send(msg).await
  }
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "learniverse", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  run_session(&mut socket, &state).await;
}

async fn run_session<F: Frames>(socket: &mut F, state: &AppState) {
  let session = state.create_socket_session().await;
  info!(target: "learniverse", %session, "WebSocket connected");

  // Greet with the initial snapshot so the client can render the first step.
  let mut pending = handle_message(state, &session, ClientMessage::GetState).await;

  'conn: loop {
    for reply in pending.drain(..) {
      if let Err(e) = socket.send_frame(Message::Text(encode(&reply))).await {
        error!(target: "learniverse", %session, error = %e, "WS send error");
        break 'conn;
      }
    }

    let Some(Ok(msg)) = socket.recv_frame().await else { break };
    match msg {
      Message::Text(txt) => {
        pending = match serde_json::from_str::<ClientMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "learniverse", %session, kind = incoming.kind(), "WS received");
            handle_message(state, &session, incoming).await
          }
          Err(e) => vec![ServerMessage::Error { message: format!("Invalid JSON: {}", e) }],
        };
      }
      Message::Ping(payload) => {
        if let Err(e) = socket.send_frame(Message::Pong(payload)).await {
          error!(target: "learniverse", %session, error = %e, "WS pong send error");
          break;
        }
      }
      Message::Close(_) => break,
      _ => {}
    }
  }

  state.remove_session(&session).await;
  info!(target: "learniverse", %session, "WebSocket disconnected");
}

fn encode(msg: &ServerMessage) -> String {
  serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  })
}
