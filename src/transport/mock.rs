//! In-memory transport for offline mode and tests
//!
//! [`MockConnector`] is handed to the connection manager like any other
//! connector. The paired [`MockServer`] plays the remote side: it decides how
//! each connection attempt behaves and yields a [`MockPeer`] for every link
//! that opens.

use crate::transport::traits::{CloseFrame, Frame, TransportConnector, TransportStream};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chatlink_shared::{codec, reserved, AuthResponse, ClientIdentity, Envelope};
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// How a connection attempt against the mock behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Open a link and hand a peer to the server
    Accept,
    /// Fail immediately, like a refused TCP connect
    Refuse,
    /// Never complete, so only the connect timeout ends the attempt
    Hang,
}

struct MockShared {
    script: VecDeque<MockBehavior>,
    fallback: MockBehavior,
    attempts: usize,
}

impl MockShared {
    fn next_behavior(&mut self) -> MockBehavior {
        self.attempts += 1;
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

/// Connector side of the in-memory transport
pub struct MockConnector {
    shared: Arc<Mutex<MockShared>>,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    /// Create a connector and the server handle that observes it
    pub fn new() -> (Self, MockServer) {
        let shared = Arc::new(Mutex::new(MockShared {
            script: VecDeque::new(),
            fallback: MockBehavior::Accept,
            attempts: 0,
        }));
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();

        let connector = Self {
            shared: shared.clone(),
            peers_tx,
        };
        let server = MockServer { shared, peers_rx };
        (connector, server)
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, url: &str) -> Result<TransportStream> {
        let behavior = self
            .shared
            .lock()
            .map_err(|_| anyhow!("mock transport state poisoned"))?
            .next_behavior();

        match behavior {
            MockBehavior::Refuse => Err(anyhow!("connection to {} refused", url)),
            MockBehavior::Hang => futures::future::pending().await,
            MockBehavior::Accept => {
                let (client_tx, from_client) = fmpsc::unbounded::<Frame>();
                let (to_client, client_rx) = fmpsc::unbounded::<Result<Frame>>();

                let peer = MockPeer {
                    from_client,
                    to_client: Some(to_client),
                };
                self.peers_tx
                    .send(peer)
                    .map_err(|_| anyhow!("mock server for {} is gone", url))?;

                Ok(TransportStream {
                    sink: Box::pin(client_tx.sink_map_err(anyhow::Error::new)),
                    stream: client_rx.boxed(),
                })
            }
        }
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}

/// Remote side of the in-memory transport
pub struct MockServer {
    shared: Arc<Mutex<MockShared>>,
    peers_rx: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockServer {
    /// Wait for the next link to open
    pub async fn accept(&mut self) -> Option<MockPeer> {
        self.peers_rx.recv().await
    }

    /// Script the behavior of upcoming attempts, in order
    pub fn script(&self, behaviors: impl IntoIterator<Item = MockBehavior>) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.script.extend(behaviors);
        }
    }

    /// Behavior for attempts once the script is exhausted
    pub fn set_fallback(&self, behavior: MockBehavior) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.fallback = behavior;
        }
    }

    /// Number of connection attempts seen so far
    pub fn attempts(&self) -> usize {
        self.shared.lock().map(|s| s.attempts).unwrap_or_default()
    }

    /// Run an echo peer in the background: answers pings and auth requests
    /// and sends every other envelope straight back.
    pub fn spawn_echo(mut self) -> JoinHandle<()> {
        let identity = ClientIdentity::new("mock-server");
        tokio::spawn(async move {
            while let Some(mut peer) = self.accept().await {
                let identity = identity.clone();
                tokio::spawn(async move {
                    while let Some(envelope) = peer.recv_envelope().await {
                        let kind = envelope.kind().to_owned();
                        let reply = match kind.as_str() {
                            reserved::PING => Envelope::pong(
                                &identity,
                                envelope.correlation_id().map(str::to_owned),
                            ),
                            reserved::AUTH => Envelope::new(
                                reserved::AUTH_RESPONSE,
                                serde_json::json!({ "success": true }),
                                &identity,
                            ),
                            _ => envelope,
                        };
                        if !peer.send_envelope(&reply) {
                            break;
                        }
                    }
                    debug!("Mock echo peer finished");
                });
            }
        })
    }
}

/// One open link as seen from the remote side
pub struct MockPeer {
    from_client: fmpsc::UnboundedReceiver<Frame>,
    to_client: Option<fmpsc::UnboundedSender<Result<Frame>>>,
}

impl MockPeer {
    /// Next frame written by the client; `None` once the client dropped the link
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_client.next().await
    }

    /// Next decodable envelope written by the client, skipping close frames
    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        loop {
            match self.recv().await? {
                Frame::Text(text) => match codec::decode(&text) {
                    Ok(envelope) => return Some(envelope),
                    Err(e) => debug!("Mock peer ignoring bad frame: {}", e),
                },
                Frame::Close(_) => return None,
            }
        }
    }

    /// Next envelope that is not a heartbeat ping
    pub async fn recv_non_ping(&mut self) -> Option<Envelope> {
        loop {
            let envelope = self.recv_envelope().await?;
            if envelope.kind() != reserved::PING {
                return Some(envelope);
            }
        }
    }

    /// Deliver a frame to the client
    pub fn send(&self, frame: Frame) -> bool {
        match &self.to_client {
            Some(tx) => tx.unbounded_send(Ok(frame)).is_ok(),
            None => false,
        }
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(Frame::Text(text.into()))
    }

    pub fn send_envelope(&self, envelope: &Envelope) -> bool {
        match codec::encode(envelope) {
            Ok(text) => self.send_text(text),
            Err(_) => false,
        }
    }

    /// Answer the client's auth request
    pub fn send_auth_response(&self, response: &AuthResponse) -> bool {
        let payload = serde_json::json!({ "success": response.success, "error": response.error });
        self.send_envelope(&Envelope::new(
            reserved::AUTH_RESPONSE,
            payload,
            &ClientIdentity::new("mock-server"),
        ))
    }

    /// Close the link with a close frame
    pub fn close(mut self, code: u16, reason: &str) {
        self.send(Frame::Close(Some(CloseFrame {
            code,
            reason: reason.to_owned(),
        })));
        self.to_client = None;
    }

    /// Surface a transport error to the client, then drop the link
    pub fn fail(mut self, error: &str) {
        if let Some(tx) = self.to_client.take() {
            let _ = tx.unbounded_send(Err(anyhow!(error.to_owned())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_attempts() {
        let (connector, server) = MockConnector::new();
        server.script([MockBehavior::Refuse, MockBehavior::Accept]);

        assert!(connector.connect("mock://a").await.is_err());
        assert!(connector.connect("mock://a").await.is_ok());
        assert_eq!(server.attempts(), 2);
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut server) = MockConnector::new();
        let mut link = connector.connect("mock://a").await.expect("connect failed");
        let mut peer = server.accept().await.expect("no peer");

        link.sink.send(Frame::Text("up".into())).await.expect("send failed");
        assert_eq!(peer.recv().await, Some(Frame::Text("up".into())));

        assert!(peer.send_text("down"));
        let frame = link.stream.next().await.expect("ended").expect("error");
        assert_eq!(frame, Frame::Text("down".into()));

        peer.close(1000, "done");
        let frame = link.stream.next().await.expect("ended").expect("error");
        assert!(matches!(frame, Frame::Close(Some(CloseFrame { code: 1000, .. }))));
        assert!(link.stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_echo_peer_answers_ping() {
        let (connector, server) = MockConnector::new();
        let _echo = server.spawn_echo();

        let mut link = connector.connect("mock://echo").await.expect("connect failed");
        let ping = Envelope::ping(&ClientIdentity::new("c")).with_correlation_id("p-1");
        link.sink
            .send(Frame::Text(codec::encode(&ping).unwrap()))
            .await
            .expect("send failed");

        let Some(Ok(Frame::Text(text))) = link.stream.next().await else {
            panic!("expected a text frame");
        };
        let pong = codec::decode(&text).expect("bad pong");
        assert_eq!(pong.kind(), reserved::PONG);
        assert_eq!(pong.correlation_id(), Some("p-1"));
    }
}
