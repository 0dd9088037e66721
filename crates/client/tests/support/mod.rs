//! Shared scaffolding for session tests: a channel-backed transport whose
//! server ends the test scripts, plus event capture helpers.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

use storyweave_client::protocol::ConversationRef;
use storyweave_client::{
    ConnectionState, EndStoryPolicy, LinkFrame, Playthrough, PlaythroughConfig, PlaythroughEvent,
    ReconnectPolicy, SessionIdentity, Transport, TransportError, TransportLink,
};

const WAIT: Duration = Duration::from_secs(5);

/// Behavior of the next `connect` call on a [`FakeTransport`].
#[derive(Debug, Clone, Copy)]
pub enum ConnectScript {
    Accept,
    Refuse,
}

/// Transport whose links are plain channel pairs. Every accepted connect
/// hands the test a [`ServerEnd`] to script the server side with.
pub struct FakeTransport {
    script: Mutex<VecDeque<ConnectScript>>,
    servers: mpsc::UnboundedSender<ServerEnd>,
    connects: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (servers, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                servers,
                connects: AtomicUsize::new(0),
            }),
            rx,
        )
    }

    /// Refuse the next `count` connect attempts.
    pub fn refuse_next(&self, count: usize) {
        let mut script = self.script.lock().expect("lock");
        for _ in 0..count {
            script.push_back(ConnectScript::Refuse);
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, _url: &Url) -> Result<TransportLink, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(ConnectScript::Accept);
        match script {
            ConnectScript::Refuse => Err(TransportError::Connect {
                detail: "refused by test".to_string(),
            }),
            ConnectScript::Accept => {
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                let (in_tx, in_rx) = mpsc::unbounded_channel();
                let _ = self.servers.send(ServerEnd {
                    to_client: in_tx,
                    from_client: out_rx,
                });
                Ok(TransportLink {
                    outbound: out_tx,
                    inbound: in_rx,
                })
            }
        }
    }
}

/// The server side of one accepted link. Dropping it closes the link, so
/// tests hold it for as long as the connection should stay up.
pub struct ServerEnd {
    to_client: mpsc::UnboundedSender<LinkFrame>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl ServerEnd {
    pub fn send_raw(&self, raw: &str) {
        let _ = self.to_client.send(LinkFrame::Text(raw.to_string()));
    }

    pub fn send_ready(&self) {
        self.send_raw(r#"{"type":"status","status":"ready"}"#);
    }

    pub fn send_pong(&self) {
        self.send_raw(r#"{"type":"pong"}"#);
    }

    pub fn start_typing(&self, conversation: &ConversationRef) {
        self.send_raw(&format!(
            r#"{{"type":"start-typing","conversationUuid":"{conversation}"}}"#
        ));
    }

    pub fn stop_typing(&self, conversation: &ConversationRef) {
        self.send_raw(&format!(
            r#"{{"type":"stop-typing","conversationUuid":"{conversation}"}}"#
        ));
    }

    pub fn character_message(&self, conversation: &ConversationRef, text: &str) {
        self.send_raw(&character_message_json(conversation, text, false));
    }

    pub fn end_story_message(&self, conversation: &ConversationRef, text: &str) {
        self.send_raw(&character_message_json(conversation, text, true));
    }

    /// Close the link from the server side (an "unintended" close from the
    /// client's point of view).
    pub fn close(&self) {
        let _ = self.to_client.send(LinkFrame::Closed);
    }

    /// Next frame the client sent, parsed.
    pub async fn next_frame(&mut self) -> serde_json::Value {
        let raw = timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client link closed");
        serde_json::from_str(&raw).expect("client frames are valid json")
    }

    /// Next frame that is not a heartbeat ping.
    pub async fn next_non_ping_frame(&mut self) -> serde_json::Value {
        loop {
            let frame = self.next_frame().await;
            if frame["type"] != "ping" {
                return frame;
            }
        }
    }

    /// Assert the client sent nothing (heartbeat pings included).
    pub fn assert_no_frames(&mut self) {
        assert!(
            self.from_client.try_recv().is_err(),
            "expected no client frames"
        );
    }
}

pub fn character_message_json(
    conversation: &ConversationRef,
    text: &str,
    end_story: bool,
) -> String {
    format!(
        r#"{{"type":"message","conversationUuid":"{conversation}","messageType":"character","message":{{"text":"{text}","character":{{"id":1,"name":"Narrator"}}}},"endStory":{end_story}}}"#
    )
}

/// Config with fast reconnects and an effectively disabled heartbeat;
/// heartbeat tests shorten the interval themselves.
pub fn test_config() -> PlaythroughConfig {
    PlaythroughConfig {
        play_url: Url::parse("wss://play.test/play").expect("url"),
        connect_timeout: Duration::from_millis(250),
        heartbeat_interval: Duration::from_secs(3600),
        heartbeat_threshold: 3,
        reconnect: ReconnectPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            multiplier: 2.0,
        },
        end_story: EndStoryPolicy::default(),
    }
}

/// A session wired to a [`FakeTransport`] with its events captured.
pub struct Harness {
    pub playthrough: Playthrough,
    pub transport: Arc<FakeTransport>,
    servers: mpsc::UnboundedReceiver<ServerEnd>,
    events: mpsc::UnboundedReceiver<PlaythroughEvent>,
}

pub fn harness(config: PlaythroughConfig) -> Harness {
    harness_with(config, SessionIdentity::new("tok-test", "play-test"))
}

/// Route session logs into test output; `RUST_LOG=debug cargo test` shows
/// the driver's view of a failing scenario.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn harness_with(config: PlaythroughConfig, identity: SessionIdentity) -> Harness {
    init_tracing();
    let (transport, servers) = FakeTransport::new();
    let playthrough =
        Playthrough::with_transport(identity, config, Arc::clone(&transport) as Arc<dyn Transport>);
    let (tx, events) = mpsc::unbounded_channel();
    playthrough.set_event_handler(move |event| {
        let _ = tx.send(event);
    });
    Harness {
        playthrough,
        transport,
        servers,
        events,
    }
}

impl Harness {
    /// Wait for the transport to accept a connect and hand over its server
    /// end.
    pub async fn server(&mut self) -> ServerEnd {
        timeout(WAIT, self.servers.recv())
            .await
            .expect("timed out waiting for a connect attempt")
            .expect("transport dropped")
    }

    pub async fn next_event(&mut self) -> PlaythroughEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    /// Drain events until `pred` matches, returning everything consumed,
    /// match included.
    pub async fn events_until(
        &mut self,
        pred: impl Fn(&PlaythroughEvent) -> bool,
    ) -> Vec<PlaythroughEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next_event().await;
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    /// Assert nothing further is delivered within `wait`.
    pub async fn assert_no_event(&mut self, wait: Duration) {
        assert!(
            timeout(wait, self.events.recv()).await.is_err(),
            "expected no further events"
        );
    }

    /// Connect, accept the link, report readiness, and consume the
    /// Connecting/Connected/Ready notifications.
    pub async fn connect_and_ready(&mut self) -> ServerEnd {
        self.playthrough.connect(|| {});
        assert!(matches!(
            self.next_event().await,
            PlaythroughEvent::StateChanged(ConnectionState::Connecting)
        ));
        let server = self.server().await;
        server.send_ready();
        assert!(matches!(
            self.next_event().await,
            PlaythroughEvent::StateChanged(ConnectionState::Connected)
        ));
        assert!(matches!(
            self.next_event().await,
            PlaythroughEvent::Ready { reconnected: false }
        ));
        server
    }
}
