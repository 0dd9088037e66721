//! Transport seam between the session layer and the network.
//!
//! The session drives a [`TransportLink`]: a pair of channels speaking whole
//! text frames. [`WebSocketTransport`] is the production implementation;
//! tests substitute a channel-backed fake and never touch a socket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::error::TransportError;

/// One frame delivered by a transport link.
#[derive(Debug)]
pub enum LinkFrame {
    /// A complete text frame, in arrival order.
    Text(String),
    /// The link is gone; no further frames will arrive.
    Closed,
}

/// Bidirectional link to the play server.
///
/// `outbound` accepts encoded frames and never blocks; dropping it closes
/// the link. `inbound` yields frames in arrival order and ends with
/// [`LinkFrame::Closed`].
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<LinkFrame>,
}

/// Opens links to the play server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError>;
}

/// Production WebSocket transport backed by tokio-tungstenite.
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError> {
        let (stream, _) = connect_async(url.as_str()).await.map_err(|e| {
            TransportError::Connect {
                detail: e.to_string(),
            }
        })?;
        tracing::debug!(host = ?url.host_str(), "websocket open");

        let (mut write, mut read) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<LinkFrame>();

        // Write pump: drains outbound frames into the socket.
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    tracing::error!("failed to send frame: {e}");
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Read pump: forwards text frames, collapses everything terminal
        // into a single Closed marker.
        tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(LinkFrame::Text(text)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("websocket error: {e}");
                        break;
                    }
                }
            }
            let _ = in_tx.send(LinkFrame::Closed);
        });

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
