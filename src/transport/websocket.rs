//! WebSocket transport implementation

use crate::transport::traits::{CloseFrame, Frame, TransportConnector, TransportStream};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

/// Connector that opens a fresh WebSocket for every attempt
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<TransportStream> {
        let (ws, response) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("WebSocket handshake with {} failed", url))?;
        debug!("WebSocket handshake complete: status={}", response.status());

        let (sink, stream) = ws.split();
        let sink = sink
            .sink_map_err(anyhow::Error::new)
            .with(|frame: Frame| future::ready(Ok::<_, anyhow::Error>(to_message(frame))));
        let stream = stream.filter_map(|msg| future::ready(from_message(msg)));

        Ok(TransportStream {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }

    fn name(&self) -> &'static str {
        "WebSocket"
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Close(close) => Message::Close(close.map(|c| WsCloseFrame {
            code: CloseCode::from(c.code),
            reason: c.reason.into(),
        })),
    }
}

/// Map a raw WebSocket message to a link frame; control frames are handled
/// by tungstenite itself and binary frames are not part of the protocol.
fn from_message(msg: Result<Message, tungstenite::Error>) -> Option<Result<Frame>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(Message::Close(close)) => Some(Ok(Frame::Close(close.map(|c| CloseFrame {
            code: u16::from(c.code),
            reason: c.reason.as_str().to_owned(),
        })))),
        Ok(Message::Binary(data)) => {
            warn!("Discarding binary frame ({} bytes)", data.len());
            None
        }
        Ok(_) => None,
        Err(e) => Some(Err(anyhow::Error::new(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_websocket_connector_name() {
        assert_eq!(WebSocketConnector::new().name(), "WebSocket");
    }

    #[test]
    fn test_close_frame_mapping() {
        let msg = to_message(Frame::Close(Some(CloseFrame {
            code: 1000,
            reason: "bye".into(),
        })));
        let frame = from_message(Ok(msg)).expect("close should map").expect("not an error");
        assert_eq!(
            frame,
            Frame::Close(Some(CloseFrame {
                code: 1000,
                reason: "bye".into()
            }))
        );
    }

    #[test]
    fn test_control_frames_are_skipped() {
        assert!(from_message(Ok(Message::Ping(Vec::new().into()))).is_none());
        assert!(from_message(Ok(Message::Binary(vec![1, 2, 3].into()))).is_none());
    }

    #[tokio::test]
    async fn test_text_roundtrip_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        let addr = listener.local_addr().expect("no local addr");

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept failed");
            let mut ws = tokio_tungstenite::accept_async(socket)
                .await
                .expect("server handshake failed");
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_text() {
                    ws.send(msg).await.expect("echo failed");
                }
            }
        });

        let mut link = WebSocketConnector::new()
            .connect(&format!("ws://{}", addr))
            .await
            .expect("connect failed");

        link.sink
            .send(Frame::Text(r#"{"type":"chat"}"#.into()))
            .await
            .expect("send failed");

        let echoed = link.stream.next().await.expect("stream ended").expect("read error");
        assert_eq!(echoed, Frame::Text(r#"{"type":"chat"}"#.into()));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
            listener.local_addr().expect("no local addr")
        };
        let result = WebSocketConnector::new().connect(&format!("ws://{}", addr)).await;
        assert!(result.is_err());
    }
}
