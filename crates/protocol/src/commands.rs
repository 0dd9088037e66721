//! Commands sent by the client over the persistent connection.

use serde::{Deserialize, Serialize};

use crate::model::{ConversationRef, SpeechConfig, SpeechRecognitionConfig};

/// Messages from the client to the play server.
///
/// Same envelope convention as [`crate::ServerEvent`]: internally tagged with
/// kebab-case command names and camelCase fields. `speechConfig` is omitted
/// from the wire entirely when the session has not negotiated one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Begin the story in a conversation, from a scene or a subplot graph.
    Start {
        conversation_uuid: ConversationRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scene_index: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_graph_reference_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speech_config: Option<SpeechConfig>,
    },
    /// Resume a conversation where a previous session left off.
    Resume {
        conversation_uuid: ConversationRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speech_config: Option<SpeechConfig>,
    },
    /// Player reply text.
    Reply {
        conversation_uuid: ConversationRef,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speech_config: Option<SpeechConfig>,
    },
    /// Acknowledge a tap-to-continue message.
    Tap {
        conversation_uuid: ConversationRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speech_config: Option<SpeechConfig>,
    },
    /// Non-verbal player action, e.g. `"pick up the lantern"`.
    Action {
        conversation_uuid: ConversationRef,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speech_config: Option<SpeechConfig>,
    },
    /// Heartbeat probe; the server answers with `pong`.
    Ping,
    /// Begin streaming speech recognition with the given options.
    StartSpeechRecognition(SpeechRecognitionConfig),
    /// Stop streaming speech recognition.
    StopSpeechRecognition,
}

impl ClientCommand {
    /// Encode for the wire.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The conversation this command addresses, if it addresses one.
    pub fn conversation(&self) -> Option<&ConversationRef> {
        match self {
            Self::Start {
                conversation_uuid, ..
            }
            | Self::Resume {
                conversation_uuid, ..
            }
            | Self::Reply {
                conversation_uuid, ..
            }
            | Self::Tap {
                conversation_uuid, ..
            }
            | Self::Action {
                conversation_uuid, ..
            } => Some(conversation_uuid),
            Self::Ping | Self::StartSpeechRecognition(_) | Self::StopSpeechRecognition => None,
        }
    }
}

/// Parameters for [`ClientCommand::Start`].
///
/// A start may name a scene index, a subplot graph reference, or neither
/// (story start from the beginning).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartParams {
    pub scene_index: Option<i32>,
    pub start_graph_reference_id: Option<String>,
    pub speech_config: Option<SpeechConfig>,
}

impl StartParams {
    pub fn from_scene(scene_index: i32) -> Self {
        Self {
            scene_index: Some(scene_index),
            ..Self::default()
        }
    }

    pub fn from_graph(reference_id: impl Into<String>) -> Self {
        Self {
            start_graph_reference_id: Some(reference_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_speech_config(mut self, config: SpeechConfig) -> Self {
        self.speech_config = Some(config);
        self
    }
}
