//! Connection lifecycle management.
//!
//! One [`PlayConnection`] owns the single logical connection to the play
//! server and every piece of shared session state: the connection state
//! machine, the per-conversation processing flags, the active speech config
//! and the heartbeat counters. A background driver task walks the lifecycle
//! (connect, serve, reconnect) and funnels everything observable through the
//! dispatch queue.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use url::Url;

use storyweave_protocol::{ClientCommand, ConversationRef, SpeechConfig};

use crate::backoff::BackoffState;
use crate::config::{EndStoryPolicy, PlaythroughConfig};
use crate::dispatch::DispatchQueue;
use crate::error::TransportError;
use crate::event::{EventHandler, PlaythroughEvent};
use crate::heartbeat::{Heartbeat, HeartbeatTick};
use crate::router;
use crate::transport::{LinkFrame, Transport, TransportLink};

/// Connection state for the play session.
///
/// Exactly one value is active at a time; transitions are serialized by the
/// owning connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the server
    Disconnected,
    /// Transport opening, or open but not yet reported ready
    Connecting,
    /// Connected and ready to play
    Connected,
    /// Connection lost, attempting to reconnect
    Reconnecting,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
        }
    }

    /// Convert from u8 (atomic storage).
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Callback handed to `connect`, consumed on the first transition into
/// Connected.
pub(crate) type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

/// How a served link ended.
enum LinkEnd {
    /// We asked for it.
    Intentional,
    /// The other side went away, or the heartbeat gave up on it.
    Lost { liveness: bool },
}

/// Outcome of one transport open attempt.
enum OpenOutcome {
    Link(TransportLink),
    Failed(TransportError),
    Cancelled,
}

/// Outcome of a reconnect loop.
enum ReconnectOutcome {
    Link(TransportLink),
    Exhausted,
    Cancelled,
}

pub(crate) struct PlayConnection {
    config: PlaythroughConfig,
    transport: Arc<dyn Transport>,
    dispatch: DispatchQueue,
    socket_url: Url,
    /// Lock-free reads; writes additionally serialize through `transitions`.
    state: AtomicU8,
    transitions: Mutex<()>,
    handler: Mutex<Option<EventHandler>>,
    /// Write half of the live link, present only while a link is served.
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Conversations currently inside a processing window.
    processing: Mutex<HashSet<ConversationRef>>,
    /// Active speech config, last-write-wins across commands.
    speech_config: Mutex<Option<SpeechConfig>>,
    /// Set by `disconnect()`; suppresses any reconnect already scheduled.
    intentional_disconnect: AtomicBool,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    on_ready: Mutex<Option<ReadyCallback>>,
    pub(crate) heartbeat: Heartbeat,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl PlayConnection {
    pub fn new(
        config: PlaythroughConfig,
        transport: Arc<dyn Transport>,
        socket_url: Url,
        initial_speech_config: Option<SpeechConfig>,
        dispatch: DispatchQueue,
    ) -> Arc<Self> {
        let heartbeat = Heartbeat::new(config.heartbeat_threshold);
        Arc::new(Self {
            config,
            transport,
            dispatch,
            socket_url,
            state: AtomicU8::new(ConnectionState::Disconnected.to_u8()),
            transitions: Mutex::new(()),
            handler: Mutex::new(None),
            writer: Mutex::new(None),
            processing: Mutex::new(HashSet::new()),
            speech_config: Mutex::new(initial_speech_config),
            intentional_disconnect: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            on_ready: Mutex::new(None),
            heartbeat,
        })
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_handler(&self, handler: EventHandler) {
        *lock(&self.handler) = Some(handler);
    }

    pub fn end_story_policy(&self) -> EndStoryPolicy {
        self.config.end_story
    }

    pub fn is_processing(&self, conversation: &ConversationRef) -> bool {
        lock(&self.processing).contains(conversation)
    }

    pub(crate) fn set_processing(&self, conversation: ConversationRef, active: bool) {
        let mut processing = lock(&self.processing);
        if active {
            processing.insert(conversation);
        } else {
            processing.remove(&conversation);
        }
    }

    /// Resolve the speech config for an outbound command. An explicit config
    /// becomes the session's active config for subsequent commands.
    pub(crate) fn resolve_speech_config(
        &self,
        explicit: Option<SpeechConfig>,
    ) -> Option<SpeechConfig> {
        let mut active = lock(&self.speech_config);
        match explicit {
            Some(config) => {
                *active = Some(config.clone());
                Some(config)
            }
            None => active.clone(),
        }
    }

    /// Deliver an event to the subscriber through the dispatch queue.
    pub(crate) fn emit(&self, event: PlaythroughEvent) {
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            self.dispatch.enqueue(move || handler(event));
        }
    }

    /// Swap the state and emit a change notification when it actually moved.
    fn set_state(&self, new: ConnectionState) -> ConnectionState {
        let _guard = lock(&self.transitions);
        let prev = ConnectionState::from_u8(self.state.swap(new.to_u8(), Ordering::SeqCst));
        if prev != new {
            tracing::debug!(?prev, ?new, "connection state change");
            self.emit(PlaythroughEvent::StateChanged(new));
        }
        prev
    }

    /// The Disconnected -> Connecting gate for `connect()`.
    fn begin_connect(&self) -> bool {
        let _guard = lock(&self.transitions);
        let began = self
            .state
            .compare_exchange(
                ConnectionState::Disconnected.to_u8(),
                ConnectionState::Connecting.to_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if began {
            self.emit(PlaythroughEvent::StateChanged(ConnectionState::Connecting));
        }
        began
    }

    /// Completes Connecting/Reconnecting -> Connected on a ready frame.
    /// Called by the router; duplicate ready frames are ignored.
    pub(crate) fn handle_ready(&self) {
        let _guard = lock(&self.transitions);
        let prev = ConnectionState::from_u8(self.state.load(Ordering::SeqCst));
        if !matches!(
            prev,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        ) {
            tracing::debug!(state = ?prev, "ignoring ready frame");
            return;
        }

        self.state
            .store(ConnectionState::Connected.to_u8(), Ordering::SeqCst);
        self.heartbeat.reset();
        self.emit(PlaythroughEvent::StateChanged(ConnectionState::Connected));
        if let Some(callback) = lock(&self.on_ready).take() {
            self.dispatch.enqueue(callback);
        }
        let reconnected = prev == ConnectionState::Reconnecting;
        self.emit(PlaythroughEvent::Ready { reconnected });
        tracing::info!(reconnected, "session ready");
    }

    /// Open the transport and start the lifecycle driver. No-op unless the
    /// session is currently Disconnected.
    pub fn connect(self: Arc<Self>, on_ready: ReadyCallback) {
        if !self.begin_connect() {
            tracing::debug!(state = ?self.state(), "connect ignored");
            return;
        }

        self.intentional_disconnect.store(false, Ordering::SeqCst);
        *lock(&self.on_ready) = Some(on_ready);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *lock(&self.shutdown) = Some(shutdown_tx);

        tokio::spawn(async move { self.drive(shutdown_rx).await });
    }

    /// Tear the session down. Observable state flips before this returns;
    /// any scheduled reconnect is cancelled. Idempotent.
    pub fn disconnect(&self) {
        self.intentional_disconnect.store(true, Ordering::SeqCst);
        let prev = self.set_state(ConnectionState::Disconnected);
        if let Some(tx) = lock(&self.shutdown).take() {
            let _ = tx.send(true);
        }
        *lock(&self.writer) = None;
        lock(&self.processing).clear();
        self.heartbeat.reset();
        if prev != ConnectionState::Disconnected {
            tracing::info!("disconnected");
        }
    }

    pub(crate) fn close_dispatch(&self) {
        self.dispatch.close();
    }

    /// Hand a pre-encoded frame to the live link.
    pub(crate) fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        let writer = lock(&self.writer).clone();
        match writer {
            Some(tx) => tx.send(frame).map_err(|_| TransportError::LinkClosed),
            None => Err(TransportError::LinkClosed),
        }
    }

    /// Lifecycle driver: one task per `connect()` call, alive until the
    /// session lands back in Disconnected.
    async fn drive(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut link = match self.open_link(&mut shutdown).await {
            OpenOutcome::Link(link) => link,
            OpenOutcome::Failed(err) => {
                tracing::error!("connect failed: {err}");
                self.set_state(ConnectionState::Disconnected);
                return;
            }
            OpenOutcome::Cancelled => {
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        let mut backoff: Option<BackoffState> = None;
        loop {
            let end = self.serve(link, &mut shutdown).await;
            *lock(&self.writer) = None;

            match end {
                LinkEnd::Intentional => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                LinkEnd::Lost { liveness } => {
                    if self.intentional_disconnect.load(Ordering::SeqCst) {
                        self.set_state(ConnectionState::Disconnected);
                        return;
                    }
                    match self.state() {
                        ConnectionState::Connecting => {
                            // Lost before the first readiness; no retry.
                            tracing::error!("connection lost before readiness");
                            self.set_state(ConnectionState::Disconnected);
                            return;
                        }
                        ConnectionState::Connected => {
                            // Fresh outage, fresh retry budget.
                            backoff = None;
                        }
                        ConnectionState::Reconnecting => {
                            // Re-established link died before readiness;
                            // keep spending the same budget.
                        }
                        ConnectionState::Disconnected => return,
                    }
                    if liveness {
                        self.emit(PlaythroughEvent::LivenessFailure);
                    }
                    self.set_state(ConnectionState::Reconnecting);

                    let budget = backoff
                        .get_or_insert_with(|| BackoffState::new(self.config.reconnect.clone()));
                    match self.reconnect(budget, &mut shutdown).await {
                        ReconnectOutcome::Link(next) => link = next,
                        ReconnectOutcome::Exhausted => {
                            let attempts = budget.attempts();
                            tracing::error!(attempts, "reconnect budget exhausted");
                            self.set_state(ConnectionState::Disconnected);
                            self.emit(PlaythroughEvent::TerminalFailure { attempts });
                            return;
                        }
                        ReconnectOutcome::Cancelled => {
                            self.set_state(ConnectionState::Disconnected);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// One transport open attempt, bounded by the connect timeout and
    /// cancellable by `disconnect()`.
    async fn open_link(&self, shutdown: &mut watch::Receiver<bool>) -> OpenOutcome {
        let connect = self.transport.connect(&self.socket_url);
        tokio::select! {
            result = timeout(self.config.connect_timeout, connect) => match result {
                Ok(Ok(link)) => OpenOutcome::Link(link),
                Ok(Err(err)) => OpenOutcome::Failed(err),
                Err(_) => OpenOutcome::Failed(TransportError::ConnectTimeout(
                    self.config.connect_timeout,
                )),
            },
            _ = shutdown.changed() => OpenOutcome::Cancelled,
        }
    }

    /// Serve one live link: route inbound frames, drive the heartbeat, watch
    /// for shutdown.
    async fn serve(&self, link: TransportLink, shutdown: &mut watch::Receiver<bool>) -> LinkEnd {
        let TransportLink {
            outbound,
            mut inbound,
        } = link;
        *lock(&self.writer) = Some(outbound.clone());

        let mut ticker = interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return LinkEnd::Intentional;
                    }
                }
                frame = inbound.recv() => match frame {
                    Some(LinkFrame::Text(raw)) => router::route(self, &raw),
                    Some(LinkFrame::Closed) | None => {
                        return if self.intentional_disconnect.load(Ordering::SeqCst) {
                            LinkEnd::Intentional
                        } else {
                            tracing::warn!("connection closed unexpectedly");
                            LinkEnd::Lost { liveness: false }
                        };
                    }
                },
                _ = ticker.tick() => {
                    // The monitor only runs while Connected; ticks spent in
                    // Connecting/Reconnecting are ignored.
                    if self.state() == ConnectionState::Connected {
                        match self.heartbeat.on_interval() {
                            HeartbeatTick::SendPing => match ClientCommand::Ping.encode() {
                                Ok(frame) => {
                                    let _ = outbound.send(frame);
                                }
                                Err(err) => tracing::error!("failed to encode ping: {err}"),
                            },
                            HeartbeatTick::Failed => {
                                tracing::warn!(
                                    threshold = self.config.heartbeat_threshold,
                                    "liveness failure, unanswered pings over threshold"
                                );
                                return LinkEnd::Lost { liveness: true };
                            }
                        }
                    }
                }
            }
        }
    }

    /// Bounded retry loop. Sleeps are cancellable by `disconnect()`.
    async fn reconnect(
        &self,
        backoff: &mut BackoffState,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ReconnectOutcome {
        loop {
            let Some(delay) = backoff.next_delay_and_advance() else {
                return ReconnectOutcome::Exhausted;
            };
            tracing::info!(
                attempt = backoff.attempts(),
                max = self.config.reconnect.max_attempts,
                ?delay,
                "reconnecting"
            );
            if !delay.is_zero() {
                tokio::select! {
                    () = sleep(delay) => {}
                    _ = shutdown.changed() => return ReconnectOutcome::Cancelled,
                }
            }
            if self.intentional_disconnect.load(Ordering::SeqCst) {
                return ReconnectOutcome::Cancelled;
            }

            match self.open_link(shutdown).await {
                OpenOutcome::Link(link) => return ReconnectOutcome::Link(link),
                OpenOutcome::Failed(err) => {
                    tracing::warn!(attempt = backoff.attempts(), "reconnect attempt failed: {err}");
                }
                OpenOutcome::Cancelled => return ReconnectOutcome::Cancelled,
            }
        }
    }
}
