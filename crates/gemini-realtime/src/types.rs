//! Wire types for the Gemini Live `BidiGenerateContent` WebSocket protocol.

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use parley_core::{
    FunctionCall, FunctionResponse, LiveConnectConfig, LiveError, ToolCall, ToolDeclaration,
    UpstreamEvent,
};
use serde::{Deserialize, Serialize};

// --- Client -> Gemini ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(BidiGenerateContentSetup),
    RealtimeInput(BidiGenerateContentRealtimeInput),
    ClientContent(BidiGenerateContentClientContent),
    ToolResponse(BidiGenerateContentToolResponse),
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentSetup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl BidiGenerateContentSetup {
    pub fn new(model: &str, config: &LiveConnectConfig) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        let system_instruction = (!config.system_instruction.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: config.system_instruction.clone(),
            }],
        });
        let tools = if config.tools.is_empty() {
            vec![]
        } else {
            vec![Tool {
                function_declarations: config.tools.iter().map(FunctionDeclaration::from).collect(),
            }]
        };
        Self {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![config.response_modality.into()],
            },
            system_instruction,
            tools,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Text,
    Audio,
}

impl From<parley_core::ResponseModality> for ResponseModality {
    fn from(modality: parley_core::ResponseModality) -> Self {
        match modality {
            parley_core::ResponseModality::Audio => Self::Audio,
            parley_core::ResponseModality::Text => Self::Text,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize, Debug)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Behavior>,
}

impl From<&ToolDeclaration> for FunctionDeclaration {
    fn from(tool: &ToolDeclaration) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            behavior: tool.non_blocking.then_some(Behavior::NonBlocking),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Behavior {
    Blocking,
    NonBlocking,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentRealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    pub fn pcm(audio: &[u8], sample_rate: u32) -> Self {
        Self {
            mime_type: format!("audio/pcm;rate={sample_rate}"),
            data: STANDARD.encode(audio),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

// --- Gemini -> Client ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<LiveServerContent>,
    pub tool_call: Option<LiveServerToolCall>,
    pub tool_call_cancellation: Option<LiveServerToolCallCancellation>,
    pub go_away: Option<GoAway>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveServerContent {
    pub model_turn: Option<ServerContentTurn>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ServerContentTurn {
    pub parts: Vec<ServerPart>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerPart {
    pub text: Option<String>,
    pub inline_data: Option<ServerBlob>,
    pub thought: Option<bool>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerBlob {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveServerToolCall {
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct LiveServerToolCallCancellation {
    pub ids: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GoAway {
    pub time_left: Option<String>,
}

impl ServerMessage {
    /// Flattens the message into a provider-agnostic event.
    ///
    /// Audio and text parts of the model turn are concatenated in order; thought
    /// parts are skipped. Returns `None` when nothing in the message is relayable.
    pub fn into_event(self) -> Result<Option<UpstreamEvent>, LiveError> {
        let mut event = UpstreamEvent::default();

        if let Some(content) = self.server_content {
            if let Some(turn) = content.model_turn {
                let mut audio: Vec<u8> = Vec::new();
                let mut text = String::new();
                for part in turn.parts {
                    if part.thought == Some(true) {
                        continue;
                    }
                    if let Some(blob) = part.inline_data {
                        let decoded = STANDARD
                            .decode(blob.data.as_bytes())
                            .map_err(|e| LiveError::Protocol(format!("inline audio: {e}")))?;
                        audio.extend_from_slice(&decoded);
                    }
                    if let Some(chunk) = part.text {
                        text.push_str(&chunk);
                    }
                }
                if !audio.is_empty() {
                    event.audio = Some(Bytes::from(audio));
                }
                if !text.is_empty() {
                    event.text = Some(text);
                }
            }
            event.turn_complete = content.turn_complete.unwrap_or(false);
            event.interrupted = content.interrupted.unwrap_or(false);
        }

        if let Some(tool_call) = self.tool_call {
            if !tool_call.function_calls.is_empty() {
                event.tool_call = Some(ToolCall {
                    function_calls: tool_call.function_calls,
                });
            }
        }

        if let Some(cancellation) = self.tool_call_cancellation {
            event.cancelled_tool_calls = cancellation.ids;
        }

        Ok((!event.is_empty()).then_some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::coach;
    use serde_json::json;

    #[test]
    fn test_setup_message_shape() {
        let config = LiveConnectConfig {
            system_instruction: "Coach quietly.".to_string(),
            tools: vec![ToolDeclaration::non_blocking("suggest_mirroring", "Mirror.")],
            ..Default::default()
        };
        let msg = ClientMessage::Setup(BidiGenerateContentSetup::new("gemini-live", &config));

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/gemini-live",
                    "generationConfig": { "responseModalities": ["AUDIO"] },
                    "systemInstruction": { "parts": [{ "text": "Coach quietly." }] },
                    "tools": [{
                        "functionDeclarations": [{
                            "name": "suggest_mirroring",
                            "description": "Mirror.",
                            "behavior": "NON_BLOCKING"
                        }]
                    }]
                }
            })
        );
    }

    #[test]
    fn test_setup_keeps_qualified_model_name() {
        let setup = BidiGenerateContentSetup::new("models/gemini-live", &coach::connect_config(None));
        assert_eq!(setup.model, "models/gemini-live");
        assert_eq!(setup.tools[0].function_declarations.len(), 7);
    }

    #[test]
    fn test_realtime_input_messages() {
        let audio = ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio: Some(Blob::pcm(&[0, 0, 1, 0], 16_000)),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&audio).unwrap(),
            json!({ "realtimeInput": { "audio": { "mimeType": "audio/pcm;rate=16000", "data": "AAABAA==" } } })
        );

        let end = ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio_stream_end: Some(true),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&end).unwrap(),
            json!({ "realtimeInput": { "audioStreamEnd": true } })
        );
    }

    #[test]
    fn test_tool_response_message() {
        let call = FunctionCall {
            id: Some("42".to_string()),
            name: "suggest_mirroring".to_string(),
            args: Default::default(),
        };
        let msg = ClientMessage::ToolResponse(BidiGenerateContentToolResponse {
            function_responses: vec![FunctionResponse::acknowledge(&call)],
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "toolResponse": {
                    "functionResponses": [{
                        "id": "42",
                        "name": "suggest_mirroring",
                        "response": { "result": "ok", "scheduling": "SILENT" }
                    }]
                }
            })
        );
    }

    #[test]
    fn test_server_content_into_event() {
        let raw = json!({
            "serverContent": {
                "modelTurn": { "parts": [
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAE=" } },
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AgM=" } },
                    { "text": "thinking", "thought": true },
                    { "text": "Mirror, fair price?" }
                ]},
                "turnComplete": true
            }
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();

        let event = msg.into_event().unwrap().unwrap();
        assert_eq!(event.audio.as_deref(), Some(&[0u8, 1, 2, 3][..]));
        assert_eq!(event.text.as_deref(), Some("Mirror, fair price?"));
        assert!(event.turn_complete);
        assert!(!event.interrupted);
        assert!(event.tool_call.is_none());
    }

    #[test]
    fn test_tool_call_into_event() {
        let raw = json!({
            "toolCall": { "functionCalls": [
                { "id": "1", "name": "suggest_labeling", "args": { "emotion": "frustrated" } },
                { "id": "2", "name": "suggest_effective_pauses" }
            ]}
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();

        let event = msg.into_event().unwrap().unwrap();
        let calls = event.tool_call.unwrap().function_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args["emotion"], "frustrated");
        assert!(calls[1].args.is_empty());
    }

    #[test]
    fn test_interrupted_and_cancellation() {
        let msg: ServerMessage =
            serde_json::from_value(json!({ "serverContent": { "interrupted": true } })).unwrap();
        assert!(msg.into_event().unwrap().unwrap().interrupted);

        let msg: ServerMessage =
            serde_json::from_value(json!({ "toolCallCancellation": { "ids": ["7"] } })).unwrap();
        assert_eq!(msg.into_event().unwrap().unwrap().cancelled_tool_calls, vec!["7"]);
    }

    #[test]
    fn test_non_relayable_messages_are_skipped() {
        let setup: ServerMessage = serde_json::from_value(json!({ "setupComplete": {} })).unwrap();
        assert!(setup.setup_complete.is_some());
        assert!(setup.into_event().unwrap().is_none());

        let usage: ServerMessage =
            serde_json::from_value(json!({ "usageMetadata": { "totalTokenCount": 12 } })).unwrap();
        assert!(usage.into_event().unwrap().is_none());
    }

    #[test]
    fn test_bad_inline_audio_is_a_protocol_error() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "serverContent": { "modelTurn": { "parts": [{ "inlineData": { "data": "not base64!" } }] } }
        }))
        .unwrap();
        assert!(matches!(msg.into_event(), Err(LiveError::Protocol(_))));
    }
}
