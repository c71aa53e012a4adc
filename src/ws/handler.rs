//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchHandle, Seat, SessionInput};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{decode, encode, ClientMsg, Envelope, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.match_settings.outbound_queue);

    let (handle, seat) = match state.lobby.join(outbound_tx).await {
        Ok(seated) => seated,
        Err(e) => {
            error!(conn_id = %conn_id, error = %e, "Failed to seat connection");
            let _ = send_msg(&mut ws_sink, &ServerMsg::error("match_unavailable", e.to_string()))
                .await;
            let _ = ws_sink.close().await;
            return;
        }
    };

    info!(conn_id = %conn_id, match_id = %handle.id, seat = %seat, "Connection seated");

    run_session(conn_id, seat, &handle, ws_sink, ws_stream, outbound_rx).await;

    info!(conn_id = %conn_id, match_id = %handle.id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: Uuid,
    seat: Seat,
    handle: &MatchHandle,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    // Writer task: session queue -> WebSocket, in order
    let mut writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                return;
            }
        }
        // The session let go of this seat
        debug!(conn_id = %conn_id, "Outbound queue closed");
        let _ = ws_sink.close().await;
    });

    // Reader loop: WebSocket -> match session
    loop {
        let result = tokio::select! {
            next = ws_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
            _ = &mut writer_handle => break,
        };

        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                match decode::<ClientMsg>(&text) {
                    Ok(Some(msg)) => {
                        debug!(conn_id = %conn_id, kind = msg.kind(), "Client message");
                        if handle
                            .input_tx
                            .send(SessionInput::Message { seat, msg })
                            .await
                            .is_err()
                        {
                            debug!(conn_id = %conn_id, "Match session closed");
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(conn_id = %conn_id, "Ignoring unknown message type");
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to the session
    let _ = handle.input_tx.send(SessionInput::Leave { seat }).await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = encode(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
