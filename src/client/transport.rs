//! Transport seam between the match client and the network

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::ClientError;

/// One ordered, reliable text stream to the match server
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame
    async fn send(&mut self, message: String) -> Result<(), ClientError>;

    /// Next text frame; `None` once the stream closed cleanly.
    ///
    /// Must be cancel safe, it is polled inside `tokio::select!`.
    async fn recv(&mut self) -> Option<Result<String, ClientError>>;

    /// Close the stream
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// [`Transport`] over a tungstenite websocket
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Open a websocket to `url`, e.g. `ws://127.0.0.1:6789/ws`
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        debug!(url, "Websocket connected");
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        self.stream
            .send(Message::Text(message))
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(ClientError::TransportReceive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ClientError::TransportSend(e.to_string()))
    }
}
