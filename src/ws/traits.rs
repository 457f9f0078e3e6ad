//! Core traits for generic WebSocket infrastructure.

use serde::de::DeserializeOwned;

/// Message parser trait for converting raw bytes to messages.
///
/// # Example
///
/// ```ignore
/// pub struct SimpleParser;
///
/// impl MessageParser<MyMessage> for SimpleParser {
///     fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<MyMessage>> {
///         let msg: MyMessage = serde_json::from_slice(bytes)?;
///         Ok(vec![msg])
///     }
/// }
/// ```
pub trait MessageParser<M: DeserializeOwned>: Send + Sync + 'static {
    /// Parse incoming bytes into messages.
    ///
    /// May return an empty vec when a frame carries nothing worth routing.
    fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<M>>;
}

/// Callbacks run on the connection task.
///
/// Both run inline with socket I/O, so they must return quickly.
pub trait ConnectionHooks<M>: Send + Sync + 'static {
    /// Frames to send as soon as a socket opens, including after every reconnect.
    fn on_open(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called with every parsed message, in receive order, before it is broadcast.
    fn on_message(&self, _message: &M) {}
}

/// Hooks that do nothing.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<M> ConnectionHooks<M> for NoHooks {}
