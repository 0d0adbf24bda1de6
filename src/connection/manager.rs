//! Connection manager with persistent connections and automatic reconnection
//!
//! The manager is a single logical actor. All state transitions, queue
//! mutations and rate-window updates happen under one mutex (`Core`); the
//! transport itself is owned by a background session task that is spawned by
//! `connect()` and told to stop by `disconnect()`.
//!
//! Every session task carries the generation number it was spawned with. Any
//! state change it reports is dropped if the generation has moved on, so a
//! timer belonging to an abandoned session can never act on a newer one.

use crate::connection::callbacks::{CallbackRegistry, Subscription};
use crate::connection::config::ConnectionConfig;
use crate::error::{ConfigError, LinkError};
use crate::heartbeat::{HeartbeatMonitor, HeartbeatSettings, FAR_FUTURE};
use crate::policy::{RateLimiter, ReconnectDecision, ReconnectPolicy, ReconnectState};
use crate::queue::OutboundQueue;
use crate::transport::{
    CloseFrame, Frame, FrameSink, TransportConnector, TransportStream, WebSocketConnector,
};
use chatlink_shared::{
    codec, defaults, reserved,
    state_machine::{ConnectionStateMachine, LinkEvent},
    AuthResponse, ClientIdentity, ConnectionState, Envelope,
};
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, error, info, trace, warn};

/// Time allowed for the close handshake on a local disconnect
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Result of [`ConnectionManager::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the live link
    Sent,
    /// Held in the outbound queue until the link and rate limiter allow it
    Queued,
    /// The envelope cannot be transmitted at all (e.g. it does not encode)
    Rejected(String),
}

/// Why a link went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called
    Requested,
    /// The peer closed with a normal-closure code, or with no status code
    /// (reported as 1005)
    PeerClosed { code: u16, reason: String },
    /// Transport or liveness failure
    LinkLost(LinkError),
    /// Reconnect attempts ran out
    ReconnectExhausted { attempts: u32 },
}

/// Delivered to on-disconnect callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectEvent {
    /// State the manager moved to
    pub state: ConnectionState,
    pub reason: DisconnectReason,
}

/// Requests from the public API to the session task
enum Outbound {
    Frame(String),
    /// The queue went from empty to non-empty
    Drain,
    Heartbeat(HeartbeatSettings),
    Auth(String),
}

/// How a single open link ended
enum LinkEnd {
    Shutdown,
    PeerClosed { code: u16, reason: String },
    Lost(LinkError),
}

struct Core {
    fsm: ConnectionStateMachine,
    queue: OutboundQueue,
    limiter: RateLimiter,
    reconnect: ReconnectState,
    heartbeat: HeartbeatSettings,
    auth_token: Option<String>,
    authenticated: bool,
    generation: u64,
    /// Present only while Connected
    link: Option<mpsc::UnboundedSender<Outbound>>,
    shutdown: Option<oneshot::Sender<()>>,
}

struct Callbacks {
    message: Arc<CallbackRegistry<Envelope>>,
    connect: Arc<CallbackRegistry<()>>,
    error: Arc<CallbackRegistry<LinkError>>,
    disconnect: Arc<CallbackRegistry<DisconnectEvent>>,
}

struct Inner {
    config: ConnectionConfig,
    policy: ReconnectPolicy,
    identity: ClientIdentity,
    connector: Arc<dyn TransportConnector>,
    runtime: Handle,
    core: Mutex<Core>,
    callbacks: Callbacks,
}

/// Manages a persistent link to the chat backend.
///
/// Cloning yields another handle to the same link. Call
/// [`ConnectionManager::disconnect`] to tear the link down; dropping handles
/// does not.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager that talks WebSocket to `config.url`.
    ///
    /// Must be called from within a tokio runtime; the session task is
    /// spawned onto it on `connect()`.
    pub fn new(config: ConnectionConfig, identity: ClientIdentity) -> Result<Self, ConfigError> {
        Self::with_connector(config, identity, Arc::new(WebSocketConnector::new()))
    }

    /// Create a manager over a caller-supplied transport
    pub fn with_connector(
        config: ConnectionConfig,
        identity: ClientIdentity,
        connector: Arc<dyn TransportConnector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let core = Core {
            fsm: ConnectionStateMachine::new(),
            queue: OutboundQueue::new(config.max_queue_size),
            limiter: RateLimiter::new(config.rate_limit_per_second),
            reconnect: ReconnectState::default(),
            heartbeat: config.heartbeat_settings(),
            auth_token: config.auth_token.clone(),
            authenticated: false,
            generation: 0,
            link: None,
            shutdown: None,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                policy: config.reconnect_policy(),
                config,
                identity,
                connector,
                runtime,
                core: Mutex::new(core),
                callbacks: Callbacks {
                    message: CallbackRegistry::new(),
                    connect: CallbackRegistry::new(),
                    error: CallbackRegistry::new(),
                    disconnect: CallbackRegistry::new(),
                },
            }),
        })
    }

    /// Start connecting. Only acts from Disconnected or Failed, and resets
    /// the reconnect counter.
    pub fn connect(&self) {
        let mut core = self.inner.core();
        if !core.fsm.process_event(LinkEvent::ConnectRequested).is_success() {
            debug!("connect() ignored while {}", core.fsm.state());
            return;
        }
        core.reconnect.reset();
        core.generation += 1;
        let generation = core.generation;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        core.shutdown = Some(shutdown_tx);
        drop(core);

        info!(
            "Connecting to {} via {}",
            self.inner.config.url,
            self.inner.connector.name()
        );
        let inner = self.inner.clone();
        self.inner
            .runtime
            .spawn(run_session(inner, generation, shutdown_rx));
    }

    /// Close the link with a normal-closure code and cancel every pending
    /// timer. Queued envelopes are kept for the next `connect()`.
    pub fn disconnect(&self) {
        let mut core = self.inner.core();
        let from = core.fsm.state();
        core.fsm.process_event(LinkEvent::DisconnectRequested);
        core.generation += 1;
        core.link = None;
        core.authenticated = false;
        let shutdown = core.shutdown.take();
        let queued = core.queue.len();
        drop(core);

        if let Some(tx) = shutdown {
            let _ = tx.send(());
        }

        if from != ConnectionState::Disconnected {
            info!("Disconnected by request ({} envelopes stay queued)", queued);
            self.inner.callbacks.disconnect.emit(&DisconnectEvent {
                state: ConnectionState::Disconnected,
                reason: DisconnectReason::Requested,
            });
        }
    }

    /// Send an envelope, or queue it if the link is down or the rate limit
    /// is reached. Never blocks.
    pub fn send(&self, envelope: Envelope) -> SendOutcome {
        let text = match codec::encode(&envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!("Rejecting '{}' envelope: {}", envelope.kind(), e);
                return SendOutcome::Rejected(e.to_string());
            }
        };

        let mut guard = self.inner.core();
        let core = &mut *guard;

        if core.fsm.state() == ConnectionState::Connected && core.queue.is_empty() {
            if let Some(link) = &core.link {
                let now = Instant::now();
                if core.limiter.next_slot(now).is_some() {
                    debug!("Rate limit reached, queueing '{}' envelope", envelope.kind());
                } else if link.send(Outbound::Frame(text)).is_ok() {
                    core.limiter.admit_at(now);
                    trace!("Sent '{}' envelope", envelope.kind());
                    return SendOutcome::Sent;
                }
            }
        }

        let was_empty = core.queue.is_empty();
        core.queue.enqueue(envelope);
        if was_empty {
            if let Some(link) = &core.link {
                let _ = link.send(Outbound::Drain);
            }
        }
        SendOutcome::Queued
    }

    /// Build an envelope tagged with this client's identity
    pub fn envelope(&self, kind: impl Into<String>, payload: serde_json::Value) -> Envelope {
        Envelope::new(kind, payload, &self.inner.identity)
    }

    /// Called for every inbound envelope that is not a reserved type
    pub fn on_message(
        &self,
        callback: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.callbacks.message.register(Arc::new(callback))
    }

    /// Called each time the link reaches Connected
    pub fn on_connect(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.inner
            .callbacks
            .connect
            .register(Arc::new(move |_: &()| callback()))
    }

    /// Called for every failure, including ones the manager recovers from
    pub fn on_error(
        &self,
        callback: impl Fn(&LinkError) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.callbacks.error.register(Arc::new(callback))
    }

    /// Called when a live link drops, on entering Failed, and on `disconnect()`
    pub fn on_disconnect(
        &self,
        callback: impl Fn(&DisconnectEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.callbacks.disconnect.register(Arc::new(callback))
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.core().fsm.state()
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.core().queue.len()
    }

    /// Envelopes evicted from a full queue since creation
    pub fn dropped_count(&self) -> u64 {
        self.inner.core().queue.dropped_count()
    }

    /// Failed attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.core().reconnect.attempts()
    }

    /// Whether the peer accepted the auth token on the current link
    pub fn is_authenticated(&self) -> bool {
        self.inner.core().authenticated
    }

    pub fn client_id(&self) -> &ClientIdentity {
        &self.inner.identity
    }

    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    /// Change the ping interval; a live link restarts its ping timer
    pub fn set_heartbeat_interval(&self, interval: Duration) {
        if interval.is_zero() {
            warn!("Ignoring zero heartbeat interval");
            return;
        }
        self.update_heartbeat(|settings| settings.interval = interval);
    }

    /// Change the pong allowance; applies from the next ping
    pub fn set_heartbeat_timeout(&self, timeout: Duration) {
        if timeout.is_zero() {
            warn!("Ignoring zero heartbeat timeout");
            return;
        }
        self.update_heartbeat(|settings| settings.timeout = timeout);
    }

    fn update_heartbeat(&self, change: impl FnOnce(&mut HeartbeatSettings)) {
        let mut core = self.inner.core();
        change(&mut core.heartbeat);
        let settings = core.heartbeat;
        if let Some(link) = &core.link {
            let _ = link.send(Outbound::Heartbeat(settings));
        }
    }

    /// Replace the auth token. A live link authenticates immediately; every
    /// later open sends it first.
    pub fn set_auth_token(&self, token: Option<String>) {
        let mut core = self.inner.core();
        core.auth_token = token.clone();
        core.authenticated = false;
        if let (Some(token), Some(link)) = (token, &core.link) {
            let _ = link.send(Outbound::Auth(token));
        }
    }
}

impl Inner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.core().generation == generation
    }

    /// Transport open: move to Connected and install the link channel.
    /// Returns the heartbeat settings and auth token for the new link.
    fn link_opened(
        &self,
        generation: u64,
        link: mpsc::UnboundedSender<Outbound>,
    ) -> Option<(HeartbeatSettings, Option<String>)> {
        let mut core = self.core();
        if core.generation != generation
            || !core.fsm.process_event(LinkEvent::Opened).is_success()
        {
            return None;
        }
        core.reconnect.reset();
        core.authenticated = false;
        core.link = Some(link);
        Some((core.heartbeat, core.auth_token.clone()))
    }

    fn notify_connected(&self, generation: u64) {
        if self.is_current(generation) {
            self.callbacks.connect.emit(&());
        }
    }

    /// Transport failure: consult the reconnect policy and move to
    /// Reconnecting or Failed. Returns the backoff delay if a retry follows.
    fn link_lost(&self, generation: u64, error: LinkError) -> Option<Duration> {
        let mut core = self.core();
        if core.generation != generation {
            return None;
        }
        let from = core.fsm.state();
        core.link = None;
        core.authenticated = false;

        let decision = if self.config.auto_reconnect {
            Some(self.policy.on_failure(&mut core.reconnect))
        } else {
            None
        };
        let retry = match decision {
            Some(ReconnectDecision::Retry { attempt, delay }) => Some((attempt, delay)),
            _ => None,
        };
        core.fsm.process_event(LinkEvent::Lost {
            will_retry: retry.is_some(),
        });
        drop(core);

        warn!("Link failure: {}", error);
        self.callbacks.error.emit(&error);

        match (retry, decision) {
            (Some((attempt, delay)), _) => {
                info!(
                    "Reconnecting in {:?} (failed attempts {}/{})",
                    delay,
                    attempt,
                    self.policy.max_attempts()
                );
                if from == ConnectionState::Connected {
                    self.callbacks.disconnect.emit(&DisconnectEvent {
                        state: ConnectionState::Reconnecting,
                        reason: DisconnectReason::LinkLost(error),
                    });
                }
                Some(delay)
            }
            (None, Some(ReconnectDecision::GiveUp { attempts })) => {
                error!("Giving up after {} failed attempts", attempts);
                self.callbacks
                    .error
                    .emit(&LinkError::ReconnectExhausted(attempts));
                self.callbacks.disconnect.emit(&DisconnectEvent {
                    state: ConnectionState::Failed,
                    reason: DisconnectReason::ReconnectExhausted { attempts },
                });
                None
            }
            _ => {
                error!("Auto-reconnect disabled, link failed");
                self.callbacks.disconnect.emit(&DisconnectEvent {
                    state: ConnectionState::Failed,
                    reason: DisconnectReason::LinkLost(error),
                });
                None
            }
        }
    }

    fn peer_closed(&self, generation: u64, code: u16, reason: String) {
        let mut core = self.core();
        if core.generation != generation {
            return;
        }
        core.link = None;
        core.authenticated = false;
        core.fsm.process_event(LinkEvent::PeerClosed);
        drop(core);

        info!("Peer closed the link (code {}): {}", code, reason);
        self.callbacks.disconnect.emit(&DisconnectEvent {
            state: ConnectionState::Disconnected,
            reason: DisconnectReason::PeerClosed { code, reason },
        });
    }

    /// When the queue should next be drained, if it holds anything
    fn next_drain_at(&self, generation: u64, now: Instant) -> Option<Instant> {
        let core = self.core();
        if core.generation != generation || core.queue.is_empty() {
            return None;
        }
        Some(core.limiter.next_slot(now).unwrap_or(now))
    }

    /// Pop and encode the head of the queue if the rate limiter has a slot.
    /// The slot is only taken for an envelope that encodes.
    fn take_drainable(&self, generation: u64) -> Option<(Envelope, String)> {
        let mut guard = self.core();
        let core = &mut *guard;
        if core.generation != generation {
            return None;
        }
        let now = Instant::now();
        while core.limiter.next_slot(now).is_none() {
            let envelope = core.queue.pop_front()?;
            match codec::encode(&envelope) {
                Ok(text) => {
                    core.limiter.admit_at(now);
                    return Some((envelope, text));
                }
                Err(e) => warn!("Dropping queued '{}' envelope: {}", envelope.kind(), e),
            }
        }
        None
    }

    fn requeue(&self, envelope: Envelope) {
        if let Some(lost) = self.core().queue.requeue_front(envelope) {
            warn!("Queue refilled during drain, dropping '{}' envelope", lost.kind());
        }
    }

    /// Send queued envelopes in order until the queue is empty or the rate
    /// limiter says stop. A failed send puts the envelope back at the head.
    async fn drain(&self, generation: u64, sink: &mut FrameSink) -> Result<(), LinkError> {
        let mut drained = 0usize;
        while let Some((envelope, text)) = self.take_drainable(generation) {
            if let Err(e) = sink.send(Frame::Text(text)).await {
                self.requeue(envelope);
                return Err(transport_error(e));
            }
            drained += 1;
        }

        if drained > 0 {
            let remaining = self.core().queue.len();
            debug!("Drained {} queued envelopes ({} remaining)", drained, remaining);
        }
        Ok(())
    }

    /// Handle one inbound text frame. Returns a frame to send back, if any.
    fn handle_inbound(
        &self,
        generation: u64,
        text: &str,
        monitor: &mut HeartbeatMonitor,
    ) -> Option<String> {
        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Discarding malformed frame: {}", e);
                return None;
            }
        };

        match envelope.kind() {
            reserved::PONG => {
                if monitor.pong_received() {
                    trace!("Heartbeat pong received");
                }
                None
            }
            reserved::PING => {
                let pong = Envelope::pong(
                    &self.identity,
                    envelope.correlation_id().map(str::to_owned),
                );
                codec::encode(&pong).ok()
            }
            reserved::AUTH_RESPONSE => {
                self.auth_response(generation, &envelope);
                None
            }
            reserved::AUTH => {
                debug!("Ignoring auth envelope from peer");
                None
            }
            kind => {
                trace!("Received '{}' envelope", kind);
                if self.is_current(generation) {
                    self.callbacks.message.emit(&envelope);
                }
                None
            }
        }
    }

    fn auth_response(&self, generation: u64, envelope: &Envelope) {
        let Some(response) = AuthResponse::from_envelope(envelope) else {
            warn!("Discarding malformed auth_response");
            return;
        };

        {
            let mut core = self.core();
            if core.generation != generation {
                return;
            }
            core.authenticated = response.success;
        }

        if response.success {
            info!("Authenticated as {}", self.identity);
        } else {
            let reason = response
                .error
                .unwrap_or_else(|| "no reason given".to_owned());
            warn!("Authentication rejected: {}", reason);
            self.callbacks.error.emit(&LinkError::AuthRejected(reason));
        }
    }
}

/// Session loop: connect, drive the link, back off, repeat
async fn run_session(inner: Arc<Inner>, generation: u64, mut shutdown: oneshot::Receiver<()>) {
    let url = inner.config.url.clone();
    let connect_timeout = inner.config.connect_timeout;

    loop {
        let attempt = tokio::select! {
            biased;
            _ = &mut shutdown => return,
            result = timeout(connect_timeout, inner.connector.connect(&url)) => result,
        };

        let failure = match attempt {
            Ok(Ok(transport)) => {
                match drive_link(&inner, generation, transport, &mut shutdown).await {
                    LinkEnd::Shutdown => return,
                    LinkEnd::PeerClosed { code, reason } => {
                        inner.peer_closed(generation, code, reason);
                        return;
                    }
                    LinkEnd::Lost(error) => error,
                }
            }
            Ok(Err(e)) => transport_error(e),
            Err(_) => LinkError::ConnectTimeout(connect_timeout),
        };

        let Some(delay) = inner.link_lost(generation, failure) else {
            return;
        };

        tokio::select! {
            biased;
            _ = &mut shutdown => return,
            _ = sleep(delay) => {}
        }
    }
}

/// Handle an active connection
async fn drive_link(
    inner: &Inner,
    generation: u64,
    transport: TransportStream,
    shutdown: &mut oneshot::Receiver<()>,
) -> LinkEnd {
    let TransportStream {
        mut sink,
        mut stream,
    } = transport;
    let (link_tx, mut link_rx) = mpsc::unbounded_channel();

    let Some((settings, auth_token)) = inner.link_opened(generation, link_tx) else {
        close_link(&mut sink).await;
        return LinkEnd::Shutdown;
    };
    info!("Connected to {}", inner.config.url);

    let mut monitor = HeartbeatMonitor::start(settings, Instant::now());

    if let Some(token) = auth_token {
        if let Err(e) = send_envelope(&mut sink, &Envelope::auth(&inner.identity, &token)).await {
            return LinkEnd::Lost(e);
        }
    }
    if let Err(e) = inner.drain(generation, &mut sink).await {
        return LinkEnd::Lost(e);
    }
    inner.notify_connected(generation);

    loop {
        let now = Instant::now();
        let pong_deadline = monitor.pong_deadline();
        let drain_at = inner.next_drain_at(generation, now);
        let pong_at = pong_deadline.unwrap_or(now + FAR_FUTURE);
        let drain_wake = drain_at.unwrap_or(now + FAR_FUTURE);

        tokio::select! {
            biased;

            _ = &mut *shutdown => {
                close_link(&mut sink).await;
                return LinkEnd::Shutdown;
            }

            _ = sleep_until(pong_at), if pong_deadline.is_some() => {
                let allowance = monitor.settings().timeout;
                warn!("No pong within {:?}, dropping link", allowance);
                monitor.clear();
                return LinkEnd::Lost(LinkError::HeartbeatTimeout(allowance));
            }

            frame = stream.next() => match frame {
                Some(Ok(Frame::Text(text))) => {
                    if let Some(reply) = inner.handle_inbound(generation, &text, &mut monitor) {
                        if let Err(e) = sink.send(Frame::Text(reply)).await {
                            return LinkEnd::Lost(transport_error(e));
                        }
                    }
                }
                Some(Ok(Frame::Close(close))) => return close_outcome(close),
                Some(Err(e)) => return LinkEnd::Lost(transport_error(e)),
                None => return LinkEnd::Lost(LinkError::StreamEnded),
            },

            command = link_rx.recv() => match command {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = sink.send(Frame::Text(text)).await {
                        return LinkEnd::Lost(transport_error(e));
                    }
                }
                // Wakes the loop so the drain timer is re-armed
                Some(Outbound::Drain) => {}
                Some(Outbound::Heartbeat(settings)) => {
                    debug!("Heartbeat reconfigured: {:?}", settings);
                    monitor.reconfigure(settings, Instant::now());
                }
                Some(Outbound::Auth(token)) => {
                    let auth = Envelope::auth(&inner.identity, &token);
                    if let Err(e) = send_envelope(&mut sink, &auth).await {
                        return LinkEnd::Lost(e);
                    }
                }
                // Sender dropped by disconnect()
                None => {
                    close_link(&mut sink).await;
                    return LinkEnd::Shutdown;
                }
            },

            _ = sleep_until(monitor.next_ping()) => {
                if let Err(e) = send_envelope(&mut sink, &Envelope::ping(&inner.identity)).await {
                    return LinkEnd::Lost(e);
                }
                monitor.ping_sent(Instant::now());
                trace!("Heartbeat ping sent");
            }

            _ = sleep_until(drain_wake), if drain_at.is_some() => {
                if let Err(e) = inner.drain(generation, &mut sink).await {
                    return LinkEnd::Lost(e);
                }
            }
        }
    }
}

/// A close without a status code is treated like a normal closure
fn close_outcome(close: Option<CloseFrame>) -> LinkEnd {
    match close {
        Some(CloseFrame { code, reason }) if code == defaults::NORMAL_CLOSURE => {
            LinkEnd::PeerClosed { code, reason }
        }
        Some(CloseFrame { code, reason }) => LinkEnd::Lost(LinkError::Closed { code, reason }),
        None => LinkEnd::PeerClosed {
            code: defaults::NO_STATUS_RECEIVED,
            reason: "no status code".into(),
        },
    }
}

async fn send_envelope(sink: &mut FrameSink, envelope: &Envelope) -> Result<(), LinkError> {
    let text = codec::encode(envelope).map_err(|e| LinkError::Transport(e.to_string()))?;
    sink.send(Frame::Text(text)).await.map_err(transport_error)
}

/// Best-effort close handshake with a normal-closure code
async fn close_link(sink: &mut FrameSink) {
    let handshake = async {
        sink.send(Frame::Close(Some(CloseFrame {
            code: defaults::NORMAL_CLOSURE,
            reason: "client disconnect".into(),
        })))
        .await?;
        sink.close().await
    };
    match timeout(CLOSE_GRACE, handshake).await {
        Ok(Ok(())) => debug!("Close handshake sent"),
        Ok(Err(e)) => debug!("Close handshake failed: {:#}", e),
        Err(_) => debug!("Close handshake timed out"),
    }
}

fn transport_error(e: anyhow::Error) -> LinkError {
    LinkError::Transport(format!("{:#}", e))
}
