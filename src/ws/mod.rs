//! Core WebSocket infrastructure.
//!
//! **Feature flag:** `ws`
//!
//! This module provides generic connection management that is specialized by
//! [`crate::payments`] for the payment notification feed.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: owns one socket, reconnects with exponential backoff, fans
//!   messages out to subscribers
//! - [`ReconnectPolicy`]: close code and attempt counter in, next delay out
//! - [`Connector`] / [`Socket`]: the transport seam; [`TungsteniteConnector`] in production,
//!   scripted transports in tests
//! - [`MessageParser`] / [`ConnectionHooks`]: what a specific feed plugs in
//!
//! # Example
//!
//! ```ignore
//! let connection = ConnectionManager::new(endpoint, config, SimpleParser, Arc::new(NoHooks))?;
//! connection.connect();
//! let mut messages = Box::pin(connection.stream());
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod policy;
pub mod traits;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState};
pub use error::WsError;
pub use policy::ReconnectPolicy;
pub use traits::*;
pub use transport::{
    ABNORMAL_CLOSURE, Connector, NO_STATUS_RECEIVED, NORMAL_CLOSURE, Socket, SocketEvent,
    TungsteniteConnector,
};
