//! Data model carried by play-server events and client commands.

use std::collections::HashMap;
use std::fmt;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Opaque reference to one conversation (narrative thread) in a playthrough.
///
/// Created once per thread by the conversation endpoint and passed into every
/// outbound command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationRef(String);

impl ConversationRef {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self(uuid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConversationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConversationRef {
    fn from(uuid: String) -> Self {
        Self(uuid)
    }
}

impl From<&str> for ConversationRef {
    fn from(uuid: &str) -> Self {
        Self(uuid.to_string())
    }
}

/// A character in the story, as attached to narrator messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Mood vector for a character. Values are 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emotion {
    pub happiness: i32,
    pub anger: i32,
    pub trust: i32,
    pub patience: i32,
    pub fearlessness: i32,
}

/// A character's mood at the time a message was generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterMood {
    pub id: i64,
    pub name: String,
    pub mood: Emotion,
}

/// A saved story memory. `recall_value` identifies the memory slot,
/// `save_value` is its current contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub recall_value: String,
    pub save_value: String,
}

impl Memory {
    pub fn new(recall_value: impl Into<String>, save_value: impl Into<String>) -> Self {
        Self {
            id: None,
            recall_value: recall_value.into(),
            save_value: save_value.into(),
        }
    }
}

/// Synthesized speech attached to a message when a speech config was
/// negotiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speech {
    pub audio: SpeechAudio,
    /// Clip length in seconds.
    #[serde(default)]
    pub duration: f32,
}

/// Audio payload of a [`Speech`] value. Exactly one of `data` (base64) or
/// `url` is populated, depending on the negotiated [`AudioOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAudio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Encoding of the payload, e.g. `"ogg"`.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub encoding: Option<String>,
}

impl SpeechAudio {
    /// Decode the base64 `data` buffer, if this payload carries one.
    pub fn decode_data(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.data
            .as_deref()
            .map(|data| base64::engine::general_purpose::STANDARD.decode(data))
    }
}

/// Audio encodings a client can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    Mp3,
    Ogg,
    Wav,
}

/// How speech audio should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioOutput {
    /// Inline base64 buffer on the message itself.
    Buffer,
    /// A URL the client fetches out of band.
    Url,
}

/// Speech synthesis options. Attaching one to a command asks the server to
/// return audio alongside the text of subsequent messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub encoding: Vec<AudioEncoding>,
    pub output: AudioOutput,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            encoding: vec![AudioEncoding::Ogg, AudioEncoding::Mp3, AudioEncoding::Wav],
            output: AudioOutput::Buffer,
        }
    }
}

/// Backend used for speech-to-text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecognitionService {
    #[default]
    #[serde(rename = "unified")]
    Unified,
    #[serde(rename = "unified:google")]
    Google,
    #[serde(rename = "unified:aws")]
    Aws,
    #[serde(rename = "unified:deepgram")]
    Deepgram,
}

/// Speech recognition options negotiated for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRecognitionConfig {
    pub service: RecognitionService,
    pub language_code: String,
    pub sample_rate: u32,
}

impl Default for SpeechRecognitionConfig {
    fn default() -> Self {
        Self {
            service: RecognitionService::Unified,
            language_code: "en-US".to_string(),
            sample_rate: 16_000,
        }
    }
}

/// Free-form metadata attached to a message by the story author.
pub type Metadata = HashMap<String, String>;
