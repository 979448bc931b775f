//! Accepts client WebSocket connections and wires each one to a relay session.

use super::{
    protocol::{ClientMessage, ServerMessage},
    session::RelaySession,
};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, Stream, StreamExt, stream::SplitSink};
use std::{fmt::Display, sync::Arc};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

/// Frames buffered for a slow client before the relay applies backpressure.
const CLIENT_BUFFER: usize = 64;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Outgoing frames are funnelled through a channel into a single writer task,
/// so the inbound loop and the outbound relay never contend for the socket.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));
    info!("New WebSocket connection");

    let (socket_tx, socket_rx) = socket.split();
    let (client_tx, client_rx) = mpsc::channel(CLIENT_BUFFER);
    let writer = tokio::spawn(forward_to_client(socket_tx, client_rx).in_current_span());

    serve_session(&state, session_id, client_tx, socket_rx).await;

    if let Err(e) = writer.await {
        error!(error = %e, "Client writer task failed");
    }
    info!("WebSocket connection closed");
}

/// Runs one relay session to completion.
///
/// Connects upstream, relays client messages until the client stops or the
/// session fails, then tears everything down. A failed connect is reported to
/// the client with a single `error` frame.
pub async fn serve_session<S, E>(
    state: &AppState,
    session_id: Uuid,
    client_tx: mpsc::Sender<ServerMessage>,
    inbound: S,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut session = RelaySession::new(session_id, state.settings.clone(), client_tx.clone());

    match session.connect(state.connector.as_ref()).await {
        Ok(receiver) => {
            session.spawn_outbound(receiver);
            drop(client_tx);
            relay_inbound(&session, inbound).await;
        }
        Err(e) => {
            error!(error = %e, "Session could not start");
            let message = ServerMessage::Error {
                message: e.to_string(),
            };
            if client_tx.send(message).await.is_err() {
                debug!("Client left before the error could be reported");
            }
        }
    }

    session.close().await;
    info!(state = %session.state(), "Relay session finished");
}

/// Dispatches client messages to the session until the client stops,
/// disconnects, or the session stops being active.
pub async fn relay_inbound<S, E>(session: &RelaySession, mut inbound: S)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            next = inbound.next() => next,
            _ = session.deactivated() => {
                info!(state = %session.state(), "Session no longer active");
                break;
            }
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(error = %e, "Error receiving from client WebSocket");
                break;
            }
            None => {
                info!("Client disconnected");
                break;
            }
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::AudioChunk { data }) => session.send_audio(&data).await,
                Ok(ClientMessage::EndOfTurn) => session.send_end_of_turn().await,
                Ok(ClientMessage::TextMessage { text }) => session.send_text(&text).await,
                Ok(ClientMessage::Stop) => {
                    info!("Client requested stop");
                    break;
                }
                Ok(ClientMessage::Unknown) => debug!("Ignoring unknown client message type"),
                Err(e) => warn!(error = %e, "Ignoring malformed client message"),
            },
            Message::Close(_) => {
                info!("Client sent close frame");
                break;
            }
            Message::Binary(_) => warn!("Ignoring binary frame, audio is sent as audio_chunk"),
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Drains queued frames onto the socket, then closes it once every sender is gone.
async fn forward_to_client(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut client_rx: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = client_rx.recv().await {
        if let Err(e) = send_msg(&mut socket_tx, msg).await {
            warn!(error = %e, "Failed to send message to client");
            return;
        }
    }
    if let Err(e) = socket_tx.send(Message::Close(None)).await {
        debug!(error = %e, "Client socket already closed");
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
