//! Socket abstraction the connection manager dials through.
//!
//! [`TungsteniteConnector`] is the production transport. Tests substitute their own
//! [`Connector`] to script opens, frames and closes deterministically.

use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::error::WsError;
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Intentional shutdown. The only close code that does not trigger a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close frame received without a status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Connection dropped without a close frame: transport errors, failed dials, EOF.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Something that happened on an open socket.
#[non_exhaustive]
#[derive(Debug)]
pub enum SocketEvent {
    /// Inbound text frame
    Text(String),
    /// The peer closed the socket. `None` when the close frame carried no code.
    Closed(Option<u16>),
    /// Transport failure. The socket is unusable afterwards.
    Error(WsError),
}

/// An open WebSocket.
///
/// [`Socket::next_event`] must be cancel safe: the connection loop races it against
/// outgoing frames and shutdown.
#[async_trait]
pub trait Socket: Send {
    /// Send a text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Wait for the next event. `None` means the underlying stream ended.
    async fn next_event(&mut self) -> Option<SocketEvent>;

    /// Close the socket with the given code.
    async fn close(&mut self, code: u16) -> Result<()>;
}

/// Opens sockets.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Dial `endpoint`. Returning `Ok` is the open event.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Socket>>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Socket>> {
        let (stream, _) = connect_async(endpoint).await.map_err(WsError::Connection)?;
        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

struct TungsteniteSocket {
    stream: WsStream,
}

#[async_trait]
impl Socket for TungsteniteSocket {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<SocketEvent> {
        loop {
            let event = match self.stream.next().await? {
                Ok(Message::Text(text)) => SocketEvent::Text(text.as_str().to_owned()),
                Ok(Message::Close(frame)) => {
                    SocketEvent::Closed(frame.map(|frame| u16::from(frame.code)))
                }
                Ok(_) => {
                    // Binary frames and ping/pong are not part of the protocol
                    continue;
                }
                Err(e) => SocketEvent::Error(WsError::Connection(e)),
            };
            return Some(event);
        }
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: String::new().into(),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}
