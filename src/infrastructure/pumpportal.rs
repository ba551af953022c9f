//! # PumpPortal Feed
//!
//! WebSocket implementation of `FeedConnector` for the PumpPortal data stream.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::domain::error::SubscriberError;
use crate::domain::traits::{FeedConnector, FeedTransport};
use crate::strings::logs;

pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn FeedTransport>, SubscriberError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| SubscriberError::Connect(e.to_string()))?;
        Ok(Box::new(WsTransport { stream }))
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), SubscriberError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| SubscriberError::Transport(e.to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, SubscriberError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(e) => {
                        tracing::warn!("{}", logs::feed_malformed(&e.to_string()));
                        continue;
                    }
                },
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(SubscriberError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("Feed close handshake failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Serves one connection: reads the client's first frame, then plays `frames` and closes.
    async fn serve(frames: Vec<Message>) -> (String, tokio::task::JoinHandle<Option<Message>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let first = ws.next().await.and_then(Result::ok);
            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            let _ = ws.close(None).await;
            first
        });
        (url, server)
    }

    #[tokio::test]
    async fn test_transport_decodes_frames_and_skips_invalid_binary() {
        let (url, server) = serve(vec![
            Message::text(r#"{"type":"newToken","data":{"symbol":"A"}}"#),
            Message::binary(vec![0xff, 0xfe, 0xfd]),
            Message::binary(br#"{"type":"newToken","data":{"symbol":"B"}}"#.to_vec()),
        ])
        .await;

        let mut transport = WsConnector::new(url).connect().await.unwrap();
        transport
            .send_text(r#"{"method":"subscribeNewToken"}"#.to_string())
            .await
            .unwrap();

        let first = transport.next_text().await.unwrap().unwrap();
        assert!(first.contains(r#""symbol":"A""#));
        // The undecodable frame is dropped; the connection stays up for the next one.
        let second = transport.next_text().await.unwrap().unwrap();
        assert!(second.contains(r#""symbol":"B""#));
        assert!(transport.next_text().await.is_none());

        let handshake = server.await.unwrap();
        assert!(matches!(
            handshake,
            Some(Message::Text(text)) if text.contains("subscribeNewToken")
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let result = WsConnector::new(url).connect().await;
        assert!(matches!(result, Err(SubscriberError::Connect(_))));
    }
}
