//! Public session facade.

use std::sync::Arc;

use url::Url;

use storyweave_protocol::{ConversationRef, SpeechConfig, SpeechRecognitionConfig, StartParams};

use crate::config::PlaythroughConfig;
use crate::connection::{ConnectionState, PlayConnection};
use crate::dispatch::DispatchQueue;
use crate::encoder::CommandEncoder;
use crate::error::SessionError;
use crate::event::PlaythroughEvent;
use crate::transport::{Transport, WebSocketTransport};

/// Immutable identity of one playthrough session: the access token, the
/// playthrough it addresses, and the negotiated speech options.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    token: String,
    playthrough_uuid: String,
    speech_config: Option<SpeechConfig>,
    speech_recognition_config: Option<SpeechRecognitionConfig>,
}

impl SessionIdentity {
    pub fn new(token: impl Into<String>, playthrough_uuid: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            playthrough_uuid: playthrough_uuid.into(),
            speech_config: None,
            speech_recognition_config: None,
        }
    }

    #[must_use]
    pub fn with_speech_config(mut self, config: SpeechConfig) -> Self {
        self.speech_config = Some(config);
        self
    }

    #[must_use]
    pub fn with_speech_recognition_config(mut self, config: SpeechRecognitionConfig) -> Self {
        self.speech_recognition_config = Some(config);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn playthrough_uuid(&self) -> &str {
        &self.playthrough_uuid
    }

    pub fn speech_config(&self) -> Option<&SpeechConfig> {
        self.speech_config.as_ref()
    }

    pub fn speech_recognition_config(&self) -> Option<&SpeechRecognitionConfig> {
        self.speech_recognition_config.as_ref()
    }
}

/// One authenticated, stateful run of a story against the play server.
///
/// The facade composes the connection manager and the command encoder; UI
/// adapters consume it through the capability pair of observing
/// notifications ([`Self::set_event_handler`]) and issuing commands, never
/// by subclassing anything.
///
/// Dropping the session disconnects it and tears down its dispatch queue.
pub struct Playthrough {
    conn: Arc<PlayConnection>,
    encoder: CommandEncoder,
    identity: SessionIdentity,
}

impl Playthrough {
    /// Create a session speaking to the real play server.
    ///
    /// Must be called from within a tokio runtime; the session spawns its
    /// dispatch consumer immediately.
    pub fn new(identity: SessionIdentity, config: PlaythroughConfig) -> Self {
        Self::with_transport(identity, config, Arc::new(WebSocketTransport))
    }

    /// Swap the network layer, e.g. for tests.
    pub fn with_transport(
        identity: SessionIdentity,
        config: PlaythroughConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_parts(identity, config, transport, DispatchQueue::new())
    }

    /// Fully explicit construction: inject both the transport and the
    /// dispatch queue the session delivers notifications on.
    pub fn with_parts(
        identity: SessionIdentity,
        config: PlaythroughConfig,
        transport: Arc<dyn Transport>,
        dispatch: DispatchQueue,
    ) -> Self {
        let socket_url = socket_url(&config.play_url, &identity);
        let conn = PlayConnection::new(
            config,
            transport,
            socket_url,
            identity.speech_config.clone(),
            dispatch,
        );
        let encoder = CommandEncoder::new(Arc::clone(&conn));
        Self {
            conn,
            encoder,
            identity,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Register the single subscriber callback. It runs on the dispatch
    /// consumer, one event at a time, in delivery order. Register before
    /// calling [`Self::connect`]; events emitted with no handler in place
    /// are dropped.
    pub fn set_event_handler(&self, handler: impl Fn(PlaythroughEvent) + Send + Sync + 'static) {
        self.conn.set_handler(Arc::new(handler));
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// True while the server is composing output for this conversation.
    pub fn is_processing(&self, conversation: &ConversationRef) -> bool {
        self.conn.is_processing(conversation)
    }

    /// Open the connection. `on_ready` fires exactly once, the first time
    /// the session reaches Connected. No-op if the session is already
    /// connecting or connected.
    pub fn connect(&self, on_ready: impl FnOnce() + Send + 'static) {
        Arc::clone(&self.conn).connect(Box::new(on_ready));
    }

    /// Tear the connection down. State is Disconnected when this returns;
    /// any scheduled reconnect is cancelled. Idempotent.
    pub fn disconnect(&self) {
        self.conn.disconnect();
    }

    /// Begin the story in a conversation.
    pub fn start(
        &self,
        conversation: &ConversationRef,
        params: StartParams,
    ) -> Result<(), SessionError> {
        self.encoder.start(conversation, params)
    }

    /// Resume a conversation where a previous session left off.
    pub fn resume(
        &self,
        conversation: &ConversationRef,
        speech_config: Option<SpeechConfig>,
    ) -> Result<(), SessionError> {
        self.encoder.resume(conversation, speech_config)
    }

    /// Send player reply text.
    pub fn reply(
        &self,
        conversation: &ConversationRef,
        text: impl Into<String>,
        speech_config: Option<SpeechConfig>,
    ) -> Result<(), SessionError> {
        self.encoder.reply(conversation, text.into(), speech_config)
    }

    /// Acknowledge a tap-to-continue message.
    pub fn tap(
        &self,
        conversation: &ConversationRef,
        speech_config: Option<SpeechConfig>,
    ) -> Result<(), SessionError> {
        self.encoder.tap(conversation, speech_config)
    }

    /// Send a non-verbal player action.
    pub fn action(
        &self,
        conversation: &ConversationRef,
        action: impl Into<String>,
        speech_config: Option<SpeechConfig>,
    ) -> Result<(), SessionError> {
        self.encoder.action(conversation, action.into(), speech_config)
    }

    /// Begin streaming speech recognition with the session's negotiated
    /// options (or the defaults when none were negotiated).
    pub fn start_speech_recognition(&self) -> Result<(), SessionError> {
        let config = self
            .identity
            .speech_recognition_config
            .clone()
            .unwrap_or_default();
        self.encoder.start_speech_recognition(config)
    }

    /// Stop streaming speech recognition.
    pub fn stop_speech_recognition(&self) -> Result<(), SessionError> {
        self.encoder.stop_speech_recognition()
    }
}

impl Drop for Playthrough {
    fn drop(&mut self) {
        self.conn.disconnect();
        self.conn.close_dispatch();
    }
}

/// Sessions authenticate on the socket URL itself.
fn socket_url(play_url: &Url, identity: &SessionIdentity) -> Url {
    let mut url = play_url.clone();
    url.query_pairs_mut()
        .append_pair("token", &identity.token)
        .append_pair("playthroughId", &identity.playthrough_uuid);
    url
}
