//! Events sent by the play server over the persistent connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Character, CharacterMood, ConversationRef, Memory, Metadata, Speech};

/// Messages from the play server to the client.
///
/// The envelope is internally tagged: `{"type": "start-typing", ...}`. Event
/// payloads are flattened into the envelope object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Connection status report. `"ready"` means the server will now accept
    /// commands for this playthrough.
    Status { status: String },
    /// Narrator output for a conversation.
    Message(MessageEvent),
    /// The server has started composing output for a conversation.
    StartTyping(TypingEvent),
    /// The server has stopped composing output without producing a message.
    StopTyping(TypingEvent),
    /// Transcription result for streamed player audio.
    SpeechRecognitionResult(SpeechRecognitionResult),
    /// Non-fatal diagnostic, e.g. a rejected out-of-turn command.
    Problem(ProblemEvent),
    /// Heartbeat acknowledgement.
    Pong,
    /// Fatal diagnostic. The server will usually close the connection next.
    Error(ErrorEvent),
}

impl ServerEvent {
    /// Decode one wire frame.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The `status` value that signals readiness to play.
pub const STATUS_READY: &str = "ready";

/// Kind of narrator message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Spoken by a character; carries a character body and clears the
    /// conversation's processing window.
    Character,
    /// Standalone narrative panel with no speaking character.
    Panel,
}

/// One narrator message, immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub conversation_uuid: ConversationRef,
    pub message_type: MessageType,
    pub message: MessageBody,
    /// Monotonic event id, used for history paging and playthrough resets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// True when this message ends the story.
    #[serde(default)]
    pub end_story: bool,
    /// True when the story waits for a tap before continuing.
    #[serde(default)]
    pub tap_to_continue: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub character_moods: Vec<CharacterMood>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memories: Vec<Memory>,
}

/// Body of a [`MessageEvent`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<Character>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<Speech>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// Start/stop marker bracketing a conversation's processing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub conversation_uuid: ConversationRef,
}

/// Transcription of streamed player audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRecognitionResult {
    #[serde(default)]
    pub text: String,
    /// False for interim hypotheses that later results replace.
    #[serde(default)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Non-fatal server diagnostic. The session continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_uuid: Option<ConversationRef>,
}

/// Fatal server diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub error: String,
}
