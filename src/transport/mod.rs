//! Transport layer for the chat link
//!
//! Supports:
//! - WebSocket (primary, `ws://` and `wss://`)
//! - In-memory mock (offline mode and tests)

pub mod mock;
pub mod traits;
pub mod websocket;

pub use mock::{MockBehavior, MockConnector, MockPeer, MockServer};
pub use traits::{CloseFrame, Frame, FrameSink, FrameStream, TransportConnector, TransportStream};
pub use websocket::WebSocketConnector;
