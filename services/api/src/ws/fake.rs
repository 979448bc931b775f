//! In-memory upstream used by the relay tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use mockall::mock;
use parley_core::{
    FunctionResponse, LiveConnectConfig, LiveConnection, LiveConnector, LiveError, LiveReceiver,
    LiveSender, LiveTurn, UpstreamEvent,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::mpsc;

/// One call the relay made on the upstream sender.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamCall {
    Audio { audio: Bytes, sample_rate: u32 },
    EndOfTurn,
    Text(String),
    ToolResponses(Vec<FunctionResponse>),
}

#[derive(Default)]
pub struct FakeSender {
    calls: Mutex<Vec<UpstreamCall>>,
    closes: AtomicUsize,
    failing: AtomicBool,
}

impl FakeSender {
    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Makes every later send fail with a transport error.
    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: UpstreamCall) -> Result<(), LiveError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LiveError::Transport("connection reset".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl LiveSender for FakeSender {
    async fn send_audio(&self, audio: Bytes, sample_rate: u32) -> Result<(), LiveError> {
        self.record(UpstreamCall::Audio { audio, sample_rate })
    }

    async fn send_end_of_turn(&self) -> Result<(), LiveError> {
        self.record(UpstreamCall::EndOfTurn)
    }

    async fn send_text(&self, text: &str) -> Result<(), LiveError> {
        self.record(UpstreamCall::Text(text.to_string()))
    }

    async fn send_tool_responses(&self, responses: Vec<FunctionResponse>) -> Result<(), LiveError> {
        self.record(UpstreamCall::ToolResponses(responses))
    }

    async fn close(&self) -> Result<(), LiveError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What the fake upstream produces next.
pub enum TurnItem {
    Event(UpstreamEvent),
    /// Ends the current turn's event sequence.
    EndTurn,
    Fail(LiveError),
}

pub struct FakeReceiver {
    rx: mpsc::UnboundedReceiver<TurnItem>,
}

impl LiveReceiver for FakeReceiver {
    fn next_turn(&mut self) -> LiveTurn<'_> {
        Box::pin(stream::unfold(Some(&mut self.rx), |state| async move {
            let rx = state?;
            match rx.recv().await {
                Some(TurnItem::Event(event)) => Some((Ok(event), Some(rx))),
                Some(TurnItem::EndTurn) => None,
                Some(TurnItem::Fail(e)) => Some((Err(e), None)),
                None => Some((Err(LiveError::Closed("fake upstream gone".to_string())), None)),
            }
        }))
    }
}

/// Handles a test keeps on the fake upstream.
pub struct FakeUpstream {
    pub sender: Arc<FakeSender>,
    pub events: mpsc::UnboundedSender<TurnItem>,
}

impl FakeUpstream {
    pub fn new() -> (Self, LiveConnection) {
        let sender = Arc::new(FakeSender::default());
        let (events, rx) = mpsc::unbounded_channel();
        let connection = LiveConnection {
            sender: sender.clone(),
            receiver: Box::new(FakeReceiver { rx }),
        };
        (Self { sender, events }, connection)
    }

    pub fn emit(&self, event: UpstreamEvent) {
        let _ = self.events.send(TurnItem::Event(event));
    }

    pub fn end_turn(&self) {
        let _ = self.events.send(TurnItem::EndTurn);
    }

    pub fn fail(&self, error: LiveError) {
        let _ = self.events.send(TurnItem::Fail(error));
    }
}

/// Hands out a single prepared connection.
pub struct FakeConnector {
    connection: Mutex<Option<LiveConnection>>,
    pub models: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new() -> (Self, FakeUpstream) {
        let (upstream, connection) = FakeUpstream::new();
        let connector = Self {
            connection: Mutex::new(Some(connection)),
            models: Mutex::new(Vec::new()),
        };
        (connector, upstream)
    }
}

#[async_trait]
impl LiveConnector for FakeConnector {
    async fn connect(
        &self,
        model: &str,
        _config: &LiveConnectConfig,
    ) -> Result<LiveConnection, LiveError> {
        self.models.lock().unwrap().push(model.to_string());
        self.connection
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| LiveError::Connect("fake connection already used".to_string()))
    }
}

mock! {
    pub Connector {}

    #[async_trait]
    impl LiveConnector for Connector {
        async fn connect(
            &self,
            model: &str,
            config: &LiveConnectConfig,
        ) -> Result<LiveConnection, LiveError>;
    }
}
