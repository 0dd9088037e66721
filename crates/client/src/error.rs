//! Error taxonomy for the session layer.
//!
//! Failures that happen asynchronously (lost links, liveness failures,
//! exhausted retries) are not errors in the `Result` sense at all; they reach
//! the subscriber as [`crate::PlaythroughEvent`]s. The types here cover what
//! can go wrong synchronously at a call site.

use std::time::Duration;

use thiserror::Error;

use storyweave_protocol::ConversationRef;

use crate::connection::ConnectionState;

/// Transport-level failures. Recoverable ones feed the reconnect policy.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open transport: {detail}")]
    Connect { detail: String },
    #[error("transport connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("transport link is closed")]
    LinkClosed,
}

/// A command was issued in a state that forbids it. Nothing was sent.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("command requires an active connection, session is {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("conversation {0} is inside a processing window")]
    Processing(ConversationRef),
    #[error("conversation reference is empty")]
    EmptyConversationRef,
}

/// Synchronous failure of a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of a one-shot play API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("an API key is required to play the draft story version")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}
