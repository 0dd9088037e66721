//! Client-side session layer for the StoryWeave play server.
//!
//! A playthrough is one authenticated, stateful run of a story. Callers
//! obtain credentials through the one-shot [`PlayApi`], then hold a
//! [`Playthrough`] for the lifetime of the run: it owns the persistent
//! connection, survives transient network failures with a bounded reconnect
//! policy, monitors liveness with heartbeats, and delivers everything
//! observable through a single ordered notification stream.
//!
//! ```rust,ignore
//! let api = PlayApi::default();
//! let grant = api
//!     .create_playthrough_token(&CreateTokenParams::published(1234))
//!     .await?;
//! let conversation = api.create_conversation(&grant.token).await?;
//!
//! let playthrough = Playthrough::new(
//!     SessionIdentity::new(grant.token, grant.playthrough_uuid),
//!     PlaythroughConfig::default(),
//! );
//! playthrough.set_event_handler(|event| {
//!     if let PlaythroughEvent::Message(message) = event {
//!         println!("{}", message.message.text);
//!     }
//! });
//! playthrough.connect(|| tracing::info!("ready to play"));
//! // ...once ready:
//! playthrough.start(&conversation, StartParams::from_scene(1))?;
//! playthrough.reply(&conversation, "Hello!", None)?;
//! ```

pub mod api;
mod backoff;
pub mod config;
mod connection;
mod dispatch;
mod encoder;
pub mod error;
mod event;
mod heartbeat;
mod router;
mod session;
pub mod transport;

pub use api::{CreateTokenParams, PlayApi, PlaythroughInfo, StoryVersion, TokenGrant, DEFAULT_API_URL};
pub use config::{EndStoryPolicy, PlaythroughConfig, ReconnectPolicy, DEFAULT_PLAY_URL};
pub use connection::ConnectionState;
pub use dispatch::DispatchQueue;
pub use error::{ApiError, PreconditionError, SessionError, TransportError};
pub use event::PlaythroughEvent;
pub use session::{Playthrough, SessionIdentity};
pub use transport::{LinkFrame, Transport, TransportLink, WebSocketTransport};

// Re-export the wire protocol; callers need its types for events and
// command parameters.
pub use storyweave_protocol as protocol;
