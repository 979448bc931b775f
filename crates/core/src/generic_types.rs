//! Provider-agnostic types shared between the relay and any live streaming provider.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Sample rate (16kHz) of the PCM audio the client streams in.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
/// Sample rate (24kHz) of the PCM audio the upstream model speaks back.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// The modality the upstream model should answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseModality {
    #[default]
    Audio,
    Text,
}

/// A function the upstream model may call. Declarations are passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// Whether the model keeps generating while the call is outstanding.
    pub non_blocking: bool,
}

impl ToolDeclaration {
    pub fn non_blocking(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            non_blocking: true,
        }
    }
}

/// Generic configuration for opening a live session with any provider.
#[derive(Debug, Clone, Default)]
pub struct LiveConnectConfig {
    pub response_modality: ResponseModality,
    pub system_instruction: String,
    pub tools: Vec<ToolDeclaration>,
}

/// A single function call requested by the upstream model.
///
/// The arguments are never interpreted; they are relayed to the client as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// An ordered batch of function calls carried by one upstream event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolCall {
    pub function_calls: Vec<FunctionCall>,
}

/// The reply to one [`FunctionCall`], matched to it by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

impl FunctionResponse {
    /// Builds the fixed "acknowledged, keep going" reply for an advisory call.
    pub fn acknowledge(call: &FunctionCall) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            response: json!({ "result": "ok", "scheduling": "SILENT" }),
        }
    }
}

/// One event from the upstream's multiplexed response stream.
///
/// A single event may carry several parts at once (for example a tool call and
/// a chunk of audio); consumers handle each populated part independently.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpstreamEvent {
    pub tool_call: Option<ToolCall>,
    /// Raw PCM audio spoken by the model.
    pub audio: Option<Bytes>,
    pub text: Option<String>,
    /// Ids of previously issued tool calls the model no longer needs answered.
    pub cancelled_tool_calls: Vec<String>,
    /// The model finished speaking for this turn.
    pub turn_complete: bool,
    /// New input preempted the response that was in flight.
    pub interrupted: bool,
}

impl UpstreamEvent {
    /// True when the event carries nothing worth relaying.
    pub fn is_empty(&self) -> bool {
        self.tool_call.is_none()
            && self.audio.as_ref().is_none_or(|a| a.is_empty())
            && self.text.as_ref().is_none_or(|t| t.is_empty())
            && self.cancelled_tool_calls.is_empty()
            && !self.turn_complete
            && !self.interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledge_keeps_call_identity() {
        let call = FunctionCall {
            id: Some("42".to_string()),
            name: "suggest_mirroring".to_string(),
            args: Map::new(),
        };

        let response = FunctionResponse::acknowledge(&call);

        assert_eq!(response.id.as_deref(), Some("42"));
        assert_eq!(response.name, "suggest_mirroring");
        assert_eq!(response.response["result"], "ok");
        assert_eq!(response.response["scheduling"], "SILENT");
    }

    #[test]
    fn test_function_call_args_default_to_empty_object() {
        let call: FunctionCall = serde_json::from_str(r#"{"name":"summarize_negotiation"}"#).unwrap();
        assert!(call.id.is_none());
        assert!(call.args.is_empty());
    }

    #[test]
    fn test_upstream_event_is_empty() {
        assert!(UpstreamEvent::default().is_empty());
        assert!(
            UpstreamEvent {
                audio: Some(Bytes::new()),
                text: Some(String::new()),
                ..Default::default()
            }
            .is_empty()
        );
        assert!(
            !UpstreamEvent {
                turn_complete: true,
                ..Default::default()
            }
            .is_empty()
        );
        assert!(
            !UpstreamEvent {
                audio: Some(Bytes::from_static(&[0, 1])),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
