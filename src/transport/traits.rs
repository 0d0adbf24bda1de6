//! Transport trait abstraction for pluggable link backends

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::Sink;
use std::pin::Pin;

/// A single frame on the duplex
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 JSON text
    Text(String),
    /// Close handshake, with the peer's code and reason if it sent one
    Close(Option<CloseFrame>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

/// Writing half of an open link
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = anyhow::Error> + Send>>;

/// Reading half of an open link; ends when the transport goes away
pub type FrameStream = BoxStream<'static, Result<Frame>>;

/// An open transport handle, split into halves so reads and writes can be
/// driven from the same task. Never reused after it closes.
pub struct TransportStream {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Factory for creating transport connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Attempt to connect, returning an open handle on success
    async fn connect(&self, url: &str) -> Result<TransportStream>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
