//! Handles the WebSocket connection to the Gemini Live API.

use crate::types::{
    BidiGenerateContentClientContent, BidiGenerateContentRealtimeInput, BidiGenerateContentSetup,
    BidiGenerateContentToolResponse, Blob, ClientMessage, Content, Part, ServerMessage,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{self, SplitSink, SplitStream},
};
use parley_core::{
    FunctionResponse, LiveConnectConfig, LiveConnection, LiveConnector, LiveError, LiveReceiver,
    LiveSender, LiveTurn, UpstreamEvent,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::protocol::{CloseFrame, Message as WsMessage},
};
use tracing::{debug, info, warn};

/// The public Gemini Live endpoint.
pub const GEMINI_LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens Gemini Live sessions with an API key.
#[derive(Clone)]
pub struct GeminiLiveConnector {
    api_key: String,
    endpoint: String,
}

impl GeminiLiveConnector {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: GEMINI_LIVE_ENDPOINT.to_string(),
        }
    }

    /// Points the connector at a different `BidiGenerateContent` endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key)
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(
        &self,
        model: &str,
        config: &LiveConnectConfig,
    ) -> Result<LiveConnection, LiveError> {
        let (ws_stream, _) = connect_async(self.url())
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        debug!(endpoint = %self.endpoint, "Gemini Live WebSocket opened");
        let (mut gemini_tx, mut gemini_rx) = ws_stream.split();

        let setup = ClientMessage::Setup(BidiGenerateContentSetup::new(model, config));
        send_json(&mut gemini_tx, &setup).await?;
        await_setup_complete(&mut gemini_rx).await?;
        info!(model, "Gemini Live session setup is complete");

        Ok(LiveConnection {
            sender: Arc::new(GeminiLiveSender {
                sink: Mutex::new(gemini_tx),
                closed: AtomicBool::new(false),
            }),
            receiver: Box::new(GeminiLiveReceiver { stream: gemini_rx }),
        })
    }
}

/// Reads until the server acknowledges the setup message.
async fn await_setup_complete(rx: &mut SplitStream<WsStream>) -> Result<(), LiveError> {
    while let Some(msg_result) = rx.next().await {
        let msg = match msg_result {
            Ok(WsMessage::Text(text)) => parse(text.as_bytes())?,
            Ok(WsMessage::Binary(data)) => parse(&data)?,
            Ok(WsMessage::Close(frame)) => return Err(LiveError::Handshake(close_reason(frame))),
            Ok(_) => continue,
            Err(e) => return Err(LiveError::Connect(e.to_string())),
        };
        if msg.setup_complete.is_some() {
            return Ok(());
        }
        warn!(?msg, "Unexpected message during Gemini setup");
    }
    Err(LiveError::Handshake(
        "connection ended before setup completed".to_string(),
    ))
}

fn parse(raw: &[u8]) -> Result<ServerMessage, LiveError> {
    serde_json::from_slice(raw).map_err(|e| LiveError::Protocol(e.to_string()))
}

fn close_reason(frame: Option<CloseFrame>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => format!("{} ({})", frame.reason, frame.code),
        Some(frame) => format!("close code {}", frame.code),
        None => "no close frame".to_string(),
    }
}

async fn send_json(
    sink: &mut SplitSink<WsStream, WsMessage>,
    msg: &ClientMessage,
) -> Result<(), LiveError> {
    let payload = serde_json::to_string(msg).map_err(|e| LiveError::Protocol(e.to_string()))?;
    sink.send(WsMessage::Text(payload.into()))
        .await
        .map_err(|e| LiveError::Transport(e.to_string()))
}

/// The sending half of a Gemini Live session.
pub struct GeminiLiveSender {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    closed: AtomicBool,
}

impl GeminiLiveSender {
    async fn send(&self, msg: ClientMessage) -> Result<(), LiveError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LiveError::Closed("session already closed".to_string()));
        }
        let mut sink = self.sink.lock().await;
        send_json(&mut sink, &msg).await
    }
}

#[async_trait]
impl LiveSender for GeminiLiveSender {
    async fn send_audio(&self, audio: Bytes, sample_rate: u32) -> Result<(), LiveError> {
        self.send(ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio: Some(Blob::pcm(&audio, sample_rate)),
            ..Default::default()
        }))
        .await
    }

    async fn send_end_of_turn(&self) -> Result<(), LiveError> {
        self.send(ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio_stream_end: Some(true),
            ..Default::default()
        }))
        .await
    }

    async fn send_text(&self, text: &str) -> Result<(), LiveError> {
        self.send(ClientMessage::ClientContent(BidiGenerateContentClientContent {
            turns: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
            turn_complete: true,
        }))
        .await
    }

    async fn send_tool_responses(&self, responses: Vec<FunctionResponse>) -> Result<(), LiveError> {
        self.send(ClientMessage::ToolResponse(BidiGenerateContentToolResponse {
            function_responses: responses,
        }))
        .await
    }

    async fn close(&self) -> Result<(), LiveError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| LiveError::Transport(e.to_string()))
    }
}

/// The receiving half of a Gemini Live session.
pub struct GeminiLiveReceiver {
    stream: SplitStream<WsStream>,
}

impl LiveReceiver for GeminiLiveReceiver {
    fn next_turn(&mut self) -> LiveTurn<'_> {
        Box::pin(stream::unfold(Some(&mut self.stream), |state| async move {
            let rx = state?;
            match next_event(rx).await {
                Ok(event) => {
                    let turn_done = event.turn_complete;
                    Some((Ok(event), if turn_done { None } else { Some(rx) }))
                }
                Err(e) => Some((Err(e), None)),
            }
        }))
    }
}

/// Waits for the next relayable event, skipping control frames and empty messages.
async fn next_event(rx: &mut SplitStream<WsStream>) -> Result<UpstreamEvent, LiveError> {
    loop {
        let msg = match rx.next().await {
            Some(Ok(WsMessage::Text(text))) => parse(text.as_bytes())?,
            Some(Ok(WsMessage::Binary(data))) => parse(&data)?,
            Some(Ok(WsMessage::Close(frame))) => return Err(LiveError::Closed(close_reason(frame))),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(LiveError::Transport(e.to_string())),
            None => return Err(LiveError::Closed("stream ended".to_string())),
        };
        if let Some(go_away) = &msg.go_away {
            warn!(time_left = ?go_away.time_left, "Gemini announced it will close the session");
        }
        if let Some(event) = msg.into_event()? {
            return Ok(event);
        }
    }
}
