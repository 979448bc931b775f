//! The per-connection relay session.
//!
//! A [`RelaySession`] owns one upstream live connection. The inbound side
//! (client -> upstream) is driven through its `send_*` methods by the gateway,
//! while a spawned [`ResponseRelay`] drains the upstream's multiplexed
//! response stream and re-emits it to the client.

use super::{
    lifecycle::{SessionState, StateCell},
    protocol::ServerMessage,
};
use crate::config::RelaySettings;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use futures_util::StreamExt;
use parley_core::{
    FunctionResponse, LiveConnection, LiveConnector, LiveError, LiveReceiver, LiveSender,
    OUTPUT_SAMPLE_RATE, ToolCall, UpstreamEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

/// Failures of a relay session.
///
/// Only the connect variants ever leave [`RelaySession::connect`]; the others
/// are contained inside the session and turned into a soft failure.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to connect to the live model: {0}")]
    Connect(#[source] LiveError),
    #[error("timed out after {0:?} connecting to the live model")]
    ConnectTimeout(Duration),
    #[error("cannot connect a session that is {0}")]
    InvalidState(SessionState),
    #[error("client is no longer listening")]
    ClientGone,
    #[error(transparent)]
    Upstream(#[from] LiveError),
}

/// Queues a message for the client connection.
async fn send_msg(
    client_tx: &mpsc::Sender<ServerMessage>,
    msg: ServerMessage,
) -> Result<(), SessionError> {
    client_tx
        .send(msg)
        .await
        .map_err(|_| SessionError::ClientGone)
}

pub struct RelaySession {
    id: Uuid,
    settings: Arc<RelaySettings>,
    state: Arc<StateCell>,
    client_tx: mpsc::Sender<ServerMessage>,
    upstream: Option<Arc<dyn LiveSender>>,
    outbound: Option<JoinHandle<()>>,
}

impl RelaySession {
    pub fn new(
        id: Uuid,
        settings: Arc<RelaySettings>,
        client_tx: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            settings,
            state: Arc::new(StateCell::default()),
            client_tx,
            upstream: None,
            outbound: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Resolves once the session stops being active, whatever the cause.
    pub async fn deactivated(&self) {
        self.state.deactivated().await
    }

    /// Opens the upstream session and tells the client it is ready.
    ///
    /// On success the receiving half is returned so the caller can hand it to
    /// [`RelaySession::spawn_outbound`]. A failed or timed out handshake leaves
    /// the session `Failed` and is returned to the caller.
    pub async fn connect(
        &mut self,
        connector: &dyn LiveConnector,
    ) -> Result<Box<dyn LiveReceiver>, SessionError> {
        if !self.state.transition(SessionState::Idle, SessionState::Connecting) {
            return Err(SessionError::InvalidState(self.state.get()));
        }
        info!(model = %self.settings.model, "Connecting to live model");

        let attempt = connector.connect(&self.settings.model, &self.settings.live);
        let result = match self.settings.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result.map_err(SessionError::Connect),
                Err(_) => Err(SessionError::ConnectTimeout(limit)),
            },
            None => attempt.await.map_err(SessionError::Connect),
        };

        let LiveConnection { sender, receiver } = match result {
            Ok(connection) => connection,
            Err(e) => {
                error!(error = %e, "Error connecting to live model");
                self.state.set(SessionState::Failed);
                return Err(e);
            }
        };

        self.upstream = Some(sender);
        self.state.transition(SessionState::Connecting, SessionState::Active);
        info!("Connected to live model");

        send_msg(
            &self.client_tx,
            ServerMessage::Connected {
                message: "Successfully connected to Gemini".to_string(),
            },
        )
        .await
        .inspect_err(|_| {
            self.state.degrade();
        })?;

        Ok(receiver)
    }

    /// Starts draining upstream responses in a background task.
    pub fn spawn_outbound(&mut self, receiver: Box<dyn LiveReceiver>) {
        let Some(upstream) = self.upstream.clone() else {
            warn!("Cannot start outbound relay - session never connected");
            return;
        };
        if let Some(previous) = self.outbound.take() {
            previous.abort();
        }
        let relay = ResponseRelay {
            state: self.state.clone(),
            upstream,
            client_tx: self.client_tx.clone(),
        };
        let span = tracing::info_span!("outbound_relay", session_id = %self.id);
        self.outbound = Some(tokio::spawn(relay.drain_responses(receiver).instrument(span)));
    }

    /// Returns the upstream sender if the session accepts traffic.
    fn live_upstream(&self, what: &str) -> Option<&Arc<dyn LiveSender>> {
        if !self.state.is_active() {
            warn!(state = %self.state.get(), "Cannot send {what} - session not active");
            return None;
        }
        self.upstream.as_ref()
    }

    fn fail_soft(&self, what: &str, e: LiveError) {
        error!(error = %e, "Error sending {what} to live model");
        self.state.degrade();
    }

    /// Decodes a base64 audio chunk and streams it upstream.
    ///
    /// Empty or undecodable chunks are dropped; the session carries on.
    pub async fn send_audio(&self, audio_base64: &str) {
        let Some(upstream) = self.live_upstream("audio") else {
            return;
        };
        let audio = match STANDARD.decode(audio_base64) {
            Ok(bytes) if bytes.is_empty() => {
                debug!("Ignoring empty audio chunk");
                return;
            }
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                warn!(error = %e, "Dropping audio chunk that is not valid base64");
                return;
            }
        };
        debug!(bytes = audio.len(), "Decoded PCM audio chunk");

        let len = audio.len();
        match upstream
            .send_audio(audio, self.settings.input_sample_rate)
            .await
        {
            Ok(()) => debug!(bytes = len, "Sent audio to live model"),
            Err(e) => self.fail_soft("audio", e),
        }
    }

    /// Signals that the user finished speaking.
    pub async fn send_end_of_turn(&self) {
        let Some(upstream) = self.live_upstream("end of turn") else {
            return;
        };
        match upstream.send_end_of_turn().await {
            Ok(()) => info!("Sent end of turn to live model"),
            Err(e) => self.fail_soft("end of turn", e),
        }
    }

    /// Sends a complete text turn.
    pub async fn send_text(&self, text: &str) {
        if text.is_empty() {
            debug!("Ignoring empty text message");
            return;
        }
        let Some(upstream) = self.live_upstream("text") else {
            return;
        };
        if let Err(e) = upstream.send_text(text).await {
            self.fail_soft("text", e);
        }
    }

    /// Ends the session: cancels the outbound relay, waits for it to unwind,
    /// then releases the upstream connection. Safe to call more than once.
    pub async fn close(&mut self) {
        self.state.transition(SessionState::Active, SessionState::Closing);

        if let Some(outbound) = self.outbound.take() {
            outbound.abort();
            match outbound.await {
                Ok(()) => debug!("Outbound relay had already finished"),
                Err(e) if e.is_cancelled() => debug!("Outbound relay cancelled"),
                Err(e) => error!(error = %e, "Outbound relay panicked"),
            }
        }

        if let Some(upstream) = self.upstream.take() {
            match upstream.close().await {
                Ok(()) => info!("Closed live session"),
                Err(e) => error!(error = %e, "Error closing live session"),
            }
        }

        if self.state.get() != SessionState::Closed {
            self.state.set(SessionState::Closed);
        }
    }
}

/// The outbound half of a session: drains upstream turns and demultiplexes
/// each event into client messages.
pub struct ResponseRelay {
    state: Arc<StateCell>,
    upstream: Arc<dyn LiveSender>,
    client_tx: mpsc::Sender<ServerMessage>,
}

impl ResponseRelay {
    /// Relays turn after turn until the session stops being active.
    ///
    /// Any receive error, or a client that stopped listening, soft-fails the
    /// session and ends the loop.
    pub async fn drain_responses(self, mut receiver: Box<dyn LiveReceiver>) {
        'turns: while self.state.is_active() {
            let mut turn = receiver.next_turn();
            let mut events = 0usize;
            while let Some(item) = turn.next().await {
                events += 1;
                if !self.state.is_active() {
                    break 'turns;
                }
                let outcome = match item {
                    Ok(event) => self.relay_event(event).await,
                    Err(e) => Err(SessionError::Upstream(e)),
                };
                if let Err(e) = outcome {
                    error!(error = %e, "Error receiving from live model");
                    self.state.degrade();
                    break 'turns;
                }
            }
            if events == 0 {
                // An empty turn may be ready immediately; let other tasks run.
                tokio::task::yield_now().await;
            }
            debug!(events, "Turn finished, waiting for the next one");
        }
        debug!(state = %self.state.get(), "Outbound relay stopped");
    }

    async fn relay_event(&self, event: UpstreamEvent) -> Result<(), SessionError> {
        if let Some(tool_call) = event.tool_call {
            self.handle_tool_call(tool_call).await?;
        }

        if let Some(audio) = event.audio.filter(|a| !a.is_empty()) {
            send_msg(
                &self.client_tx,
                ServerMessage::AudioResponse {
                    data: STANDARD.encode(&audio),
                },
            )
            .await?;
            debug!(
                bytes = audio.len(),
                sample_rate = OUTPUT_SAMPLE_RATE,
                "Sent audio response to client"
            );
        }

        if let Some(text) = event.text.filter(|t| !t.is_empty()) {
            info!(%text, "Model text");
            send_msg(&self.client_tx, ServerMessage::Transcription { text }).await?;
        }

        if !event.cancelled_tool_calls.is_empty() {
            info!(ids = ?event.cancelled_tool_calls, "Model cancelled tool calls");
        }

        if event.turn_complete {
            info!("Turn complete");
            send_msg(&self.client_tx, ServerMessage::TurnComplete).await?;
        }

        if event.interrupted {
            info!("Generation interrupted");
            send_msg(&self.client_tx, ServerMessage::Interrupted).await?;
        }

        Ok(())
    }

    /// Notifies the client of every call in the batch, then acknowledges the
    /// whole batch upstream in a single reply.
    pub async fn handle_tool_call(&self, tool_call: ToolCall) -> Result<(), SessionError> {
        let mut responses = Vec::with_capacity(tool_call.function_calls.len());
        for call in tool_call.function_calls {
            info!(tool = %call.name, args = ?call.args, "Tool call received");
            send_msg(
                &self.client_tx,
                ServerMessage::ToolCall {
                    tool: call.name.clone(),
                    args: call.args.clone(),
                },
            )
            .await?;
            responses.push(FunctionResponse::acknowledge(&call));
        }

        if responses.is_empty() {
            return Ok(());
        }
        let count = responses.len();
        self.upstream.send_tool_responses(responses).await?;
        info!(count, "Sent tool responses");
        Ok(())
    }
}
