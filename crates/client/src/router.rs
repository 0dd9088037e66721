//! Inbound frame routing.
//!
//! Decodes each frame into a [`ServerEvent`] and applies the state coupling:
//! readiness drives the connection state machine, typing events maintain the
//! per-conversation processing windows, pongs feed the heartbeat. Everything
//! else is forwarded untouched. Frames are routed on the single reader task,
//! so relative arrival order survives all the way to the subscriber.

use storyweave_protocol::events::STATUS_READY;
use storyweave_protocol::{MessageType, ServerEvent};

use crate::config::EndStoryPolicy;
use crate::connection::PlayConnection;
use crate::event::PlaythroughEvent;

pub(crate) fn route(conn: &PlayConnection, raw: &str) {
    let event = match ServerEvent::decode(raw) {
        Ok(event) => event,
        Err(err) => {
            // Malformed frames are dropped; the session continues.
            tracing::warn!("dropping frame that failed to decode: {err}");
            conn.emit(PlaythroughEvent::DecodeFailure {
                detail: err.to_string(),
            });
            return;
        }
    };

    match event {
        ServerEvent::Status { status } => {
            if status == STATUS_READY {
                conn.handle_ready();
            } else {
                tracing::debug!(%status, "unhandled status");
            }
        }
        ServerEvent::Message(message) => {
            if message.message_type == MessageType::Character {
                conn.set_processing(message.conversation_uuid.clone(), false);
            }
            let end_story = message.end_story;
            let conversation = message.conversation_uuid.clone();
            conn.emit(PlaythroughEvent::Message(Box::new(message)));
            if end_story {
                conn.emit(PlaythroughEvent::StoryEnded { conversation });
                if conn.end_story_policy() == EndStoryPolicy::DisconnectAndNotify {
                    tracing::info!("story ended, disconnecting");
                    conn.disconnect();
                }
            }
        }
        ServerEvent::StartTyping(typing) => {
            conn.set_processing(typing.conversation_uuid.clone(), true);
            conn.emit(PlaythroughEvent::TypingStarted(typing));
        }
        ServerEvent::StopTyping(typing) => {
            conn.set_processing(typing.conversation_uuid.clone(), false);
            conn.emit(PlaythroughEvent::TypingStopped(typing));
        }
        ServerEvent::SpeechRecognitionResult(result) => {
            conn.emit(PlaythroughEvent::SpeechRecognition(result));
        }
        ServerEvent::Problem(problem) => {
            tracing::warn!(code = ?problem.code, "server problem: {}", problem.error);
            conn.emit(PlaythroughEvent::Problem(problem));
        }
        ServerEvent::Pong => conn.heartbeat.on_pong(),
        ServerEvent::Error(error) => {
            tracing::error!("server error: {}", error.error);
            conn.emit(PlaythroughEvent::ServerError(error));
        }
    }
}
