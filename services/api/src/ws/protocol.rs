//! Defines the WebSocket message protocol between the browser client and the relay.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A chunk of base64 encoded 16kHz PCM16 microphone audio.
    AudioChunk {
        #[serde(default)]
        data: String,
    },
    /// The user finished speaking; the model should start answering.
    EndOfTurn,
    /// A text turn, used when audio capture is unavailable.
    TextMessage {
        #[serde(default)]
        text: String,
    },
    /// Ends the session.
    Stop,
    /// Any unrecognised `type`. Ignored.
    #[serde(other)]
    Unknown,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The upstream session is ready for audio.
    Connected { message: String },
    /// A chunk of base64 encoded 24kHz PCM16 audio spoken by the model.
    AudioResponse { data: String },
    /// Text produced by the model.
    Transcription { text: String },
    /// The model finished speaking; the client may resume capturing.
    TurnComplete,
    /// The in-flight response was preempted; playback should stop.
    Interrupted,
    /// The model invoked a coaching tool.
    ToolCall {
        tool: String,
        args: Map<String, Value>,
    },
    /// Reports a fatal error to the client.
    Error { message: String },
}
