//! Wire protocol for the StoryWeave play server.
//!
//! This crate contains the message types exchanged over the persistent play
//! connection, plus the data model they carry. The play server sends
//! [`ServerEvent`]s; clients send [`ClientCommand`]s. Both sides use the same
//! JSON envelope: an internally tagged object whose `type` field names the
//! event (`message`, `start-typing`, `reply`, ...).
//!
//! The types here are deliberately free of any transport or runtime concerns
//! so they can be shared by any client implementation.

pub mod commands;
pub mod events;
pub mod model;

pub use commands::{ClientCommand, StartParams};
pub use events::{
    ErrorEvent, MessageBody, MessageEvent, MessageType, ProblemEvent, ServerEvent,
    SpeechRecognitionResult, TypingEvent,
};
pub use model::{
    AudioEncoding, AudioOutput, Character, CharacterMood, ConversationRef, Emotion, Memory,
    RecognitionService, Speech, SpeechAudio, SpeechConfig, SpeechRecognitionConfig,
};
