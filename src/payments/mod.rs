//! Real-time payment notifications.
//!
//! **Feature flag:** `ws`
//!
//! A [`Client`] subscribes to the rooms derived from its [`Rooms`] on every open
//! (`{"type":"subscribe","room":"bill_42"}`) and routes each inbound frame by its `type`:
//!
//! - `payment_received` → [`Handlers::on_payment_received`] and [`Client::payments`]
//! - `bill_update` → [`Handlers::on_bill_update`] and [`Client::bill_updates`]
//! - anything else → kept as [`Client::last_message`], no callback
//!
//! Malformed frames are logged and dropped; they never affect the connection.

pub mod client;
pub mod router;
pub mod types;

pub use client::Client;
pub use router::{Handlers, PaymentParser, Router};
pub use types::request::{RoomKind, Rooms, SubscribeRequest, SubscriptionTarget};
pub use types::response::{PaymentNotification, WsMessage, parse_message};
