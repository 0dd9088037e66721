//! Outbound command construction and validation.
//!
//! Commands are synchronous, non-blocking validations followed by a
//! fire-and-forget hand-off to the live link; nothing here waits for a
//! server acknowledgement, and nothing is queued for later delivery.

use std::sync::Arc;

use storyweave_protocol::{
    ClientCommand, ConversationRef, SpeechConfig, SpeechRecognitionConfig, StartParams,
};

use crate::connection::{ConnectionState, PlayConnection};
use crate::error::{PreconditionError, SessionError};

pub(crate) struct CommandEncoder {
    conn: Arc<PlayConnection>,
}

impl CommandEncoder {
    pub fn new(conn: Arc<PlayConnection>) -> Self {
        Self { conn }
    }

    pub fn start(
        &self,
        conversation: &ConversationRef,
        params: StartParams,
    ) -> Result<(), SessionError> {
        self.require_conversation(conversation)?;
        self.require_connected()?;
        let speech_config = self.conn.resolve_speech_config(params.speech_config);
        self.send(ClientCommand::Start {
            conversation_uuid: conversation.clone(),
            scene_index: params.scene_index,
            start_graph_reference_id: params.start_graph_reference_id,
            speech_config,
        })
    }

    pub fn resume(
        &self,
        conversation: &ConversationRef,
        speech_config: Option<SpeechConfig>,
    ) -> Result<(), SessionError> {
        self.require_conversation(conversation)?;
        self.require_connected()?;
        let speech_config = self.conn.resolve_speech_config(speech_config);
        self.send(ClientCommand::Resume {
            conversation_uuid: conversation.clone(),
            speech_config,
        })
    }

    pub fn reply(
        &self,
        conversation: &ConversationRef,
        text: String,
        speech_config: Option<SpeechConfig>,
    ) -> Result<(), SessionError> {
        self.require_conversation(conversation)?;
        self.require_connected()?;
        self.require_idle(conversation)?;
        let speech_config = self.conn.resolve_speech_config(speech_config);
        self.send(ClientCommand::Reply {
            conversation_uuid: conversation.clone(),
            text,
            speech_config,
        })
    }

    pub fn tap(
        &self,
        conversation: &ConversationRef,
        speech_config: Option<SpeechConfig>,
    ) -> Result<(), SessionError> {
        self.require_conversation(conversation)?;
        self.require_connected()?;
        self.require_idle(conversation)?;
        let speech_config = self.conn.resolve_speech_config(speech_config);
        self.send(ClientCommand::Tap {
            conversation_uuid: conversation.clone(),
            speech_config,
        })
    }

    pub fn action(
        &self,
        conversation: &ConversationRef,
        action: String,
        speech_config: Option<SpeechConfig>,
    ) -> Result<(), SessionError> {
        self.require_conversation(conversation)?;
        self.require_connected()?;
        self.require_idle(conversation)?;
        let speech_config = self.conn.resolve_speech_config(speech_config);
        self.send(ClientCommand::Action {
            conversation_uuid: conversation.clone(),
            action,
            speech_config,
        })
    }

    pub fn start_speech_recognition(
        &self,
        config: SpeechRecognitionConfig,
    ) -> Result<(), SessionError> {
        self.require_connected()?;
        self.send(ClientCommand::StartSpeechRecognition(config))
    }

    pub fn stop_speech_recognition(&self) -> Result<(), SessionError> {
        self.require_connected()?;
        self.send(ClientCommand::StopSpeechRecognition)
    }

    fn require_connected(&self) -> Result<(), SessionError> {
        let state = self.conn.state();
        if state != ConnectionState::Connected {
            return Err(PreconditionError::NotConnected { state }.into());
        }
        Ok(())
    }

    /// Turn-taking guard: no player input while the server is composing
    /// output for this conversation.
    fn require_idle(&self, conversation: &ConversationRef) -> Result<(), SessionError> {
        if self.conn.is_processing(conversation) {
            return Err(PreconditionError::Processing(conversation.clone()).into());
        }
        Ok(())
    }

    fn require_conversation(&self, conversation: &ConversationRef) -> Result<(), SessionError> {
        if conversation.is_empty() {
            return Err(PreconditionError::EmptyConversationRef.into());
        }
        Ok(())
    }

    /// Encode and hand to the transport writer before returning.
    fn send(&self, command: ClientCommand) -> Result<(), SessionError> {
        let frame = command.encode()?;
        self.conn.send_frame(frame)?;
        tracing::debug!(?command, "command sent");
        Ok(())
    }
}
