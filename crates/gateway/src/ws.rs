//! `/ws` realtime transport. No authentication in scope: a connection
//! subscribes to exactly one room and then receives broadcast chat messages
//! for that room until it disconnects.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chatstorm_protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};

use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let client_id = uuid::Uuid::new_v4().to_string();

    let room_id = match wait_for_subscribe(&mut stream).await {
        Some(room_id) => room_id,
        None => {
            tracing::debug!(client_id = %client_id, "client disconnected before subscribing");
            return;
        }
    };

    let queue = state
        .clients
        .register(&room_id, client_id.clone(), state.config.server.client_queue_depth);

    let subscribed = ServerMessage::Subscribed { room_id: room_id.clone() };
    if send_ws_message(&mut sink, &subscribed).await.is_err() {
        state.clients.deregister(&room_id, &client_id);
        return;
    }

    tracing::info!(client_id = %client_id, room_id = %room_id, "client subscribed");

    // Writer task: drains the client's drop-oldest queue onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(msg) = queue.recv().await {
            if send_ws_message(&mut sink, &msg).await.is_err() {
                break;
            }
        }
    });

    // Reader loop: the protocol has nothing further to say after subscribe,
    // so this only watches for close/ping and ignores anything else.
    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Close(_) => break,
            Message::Text(text) => {
                tracing::debug!(client_id = %client_id, raw = %text, "ignoring post-subscribe client message");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            _ => {}
        }
    }

    writer.abort();
    state.clients.deregister(&room_id, &client_id);
    tracing::info!(client_id = %client_id, room_id = %room_id, "client disconnected");
}

async fn wait_for_subscribe(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<String> {
    let timeout = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while let Some(Ok(msg)) = stream.next().await {
            if let Message::Text(text) = msg {
                if let Ok(ClientMessage::Subscribe { room_id }) = serde_json::from_str::<ClientMessage>(&text) {
                    return Some(room_id);
                }
            }
        }
        None
    })
    .await;

    timeout.unwrap_or(None)
}

async fn send_ws_message(
    sink: &mut (impl SinkExt<Message> + Unpin),
    msg: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
