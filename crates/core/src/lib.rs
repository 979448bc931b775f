pub mod coach;
pub mod generic_types;
pub mod live_client;

pub use generic_types::{
    FunctionCall, FunctionResponse, INPUT_SAMPLE_RATE, LiveConnectConfig, OUTPUT_SAMPLE_RATE,
    ResponseModality, ToolCall, ToolDeclaration, UpstreamEvent,
};
pub use live_client::{
    LiveConnection, LiveConnector, LiveError, LiveReceiver, LiveSender, LiveTurn,
};
