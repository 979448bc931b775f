use crate::generic_types::{FunctionResponse, LiveConnectConfig, UpstreamEvent};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Errors surfaced by a live streaming provider.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("could not reach live endpoint: {0}")]
    Connect(String),
    #[error("live handshake rejected: {0}")]
    Handshake(String),
    #[error("live transport error: {0}")]
    Transport(String),
    #[error("malformed live message: {0}")]
    Protocol(String),
    #[error("live connection closed: {0}")]
    Closed(String),
}

/// The events of one conversational turn, in the order the provider produced them.
///
/// The stream ends after the event that completes the turn.
pub type LiveTurn<'a> = BoxStream<'a, Result<UpstreamEvent, LiveError>>;

/// An established live session, split into its two directions.
pub struct LiveConnection {
    pub sender: Arc<dyn LiveSender>,
    pub receiver: Box<dyn LiveReceiver>,
}

/// Opens live sessions against a remote streaming endpoint.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Performs the full handshake; the returned connection is ready to stream.
    async fn connect(&self, model: &str, config: &LiveConnectConfig)
    -> Result<LiveConnection, LiveError>;
}

/// The sending half of a live session.
///
/// Implementations serialise concurrent calls so only one send is in flight.
#[async_trait]
pub trait LiveSender: Send + Sync {
    /// Streams a chunk of raw PCM audio recorded at `sample_rate`.
    async fn send_audio(&self, audio: Bytes, sample_rate: u32) -> Result<(), LiveError>;

    /// Signals the end of the user's speech so the model starts answering.
    async fn send_end_of_turn(&self) -> Result<(), LiveError>;

    /// Sends a complete text turn.
    async fn send_text(&self, text: &str) -> Result<(), LiveError>;

    /// Answers a batch of function calls in a single reply.
    async fn send_tool_responses(&self, responses: Vec<FunctionResponse>) -> Result<(), LiveError>;

    /// Tears the session down. Calling it again is a no-op.
    async fn close(&self) -> Result<(), LiveError>;
}

/// The receiving half of a live session.
pub trait LiveReceiver: Send {
    /// Returns the lazy event sequence of the next turn.
    ///
    /// The sequence should wait for upstream traffic rather than end empty;
    /// callers yield to the runtime after an empty turn but keep asking.
    fn next_turn(&mut self) -> LiveTurn<'_>;
}
