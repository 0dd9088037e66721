//! Notifications delivered to the session's subscriber.

use std::sync::Arc;

use storyweave_protocol::{
    ConversationRef, ErrorEvent, MessageEvent, ProblemEvent, SpeechRecognitionResult, TypingEvent,
};

use crate::connection::ConnectionState;

/// Everything a subscriber can observe, in delivery order.
///
/// One tagged union instead of a callback field per message kind: a single
/// handler receives every notification through the dispatch queue, so
/// relative ordering is part of the contract rather than an accident of
/// registration order.
#[derive(Debug, Clone)]
pub enum PlaythroughEvent {
    /// The connection state machine moved.
    StateChanged(ConnectionState),
    /// The server accepted the session. Fires on every transition into
    /// `Connected`; `reconnected` distinguishes recoveries from the first
    /// connect.
    Ready { reconnected: bool },
    /// Narrator output.
    Message(Box<MessageEvent>),
    /// A conversation entered its processing window.
    TypingStarted(TypingEvent),
    /// A conversation left its processing window without a message.
    TypingStopped(TypingEvent),
    /// Transcription of streamed player audio.
    SpeechRecognition(SpeechRecognitionResult),
    /// Non-fatal server diagnostic.
    Problem(ProblemEvent),
    /// Fatal server diagnostic.
    ServerError(ErrorEvent),
    /// An inbound frame failed to decode and was dropped.
    DecodeFailure { detail: String },
    /// Heartbeat threshold exceeded; a reconnect follows.
    LivenessFailure,
    /// Retry budget exhausted; the session is permanently disconnected.
    TerminalFailure { attempts: u32 },
    /// A message with `endStory` arrived for this conversation.
    StoryEnded { conversation: ConversationRef },
}

/// Subscriber callback, invoked only from the dispatch queue consumer.
pub(crate) type EventHandler = Arc<dyn Fn(PlaythroughEvent) + Send + Sync>;
