use std::fmt;
use std::sync::{PoisonError, RwLock};

use super::types::request::{Rooms, SubscribeRequest, SubscriptionTarget};
use super::types::response::{PaymentNotification, WsMessage, parse_message};
use crate::Result;
use crate::ws::{ConnectionHooks, MessageParser};

type Handler = Box<dyn Fn(&PaymentNotification) + Send + Sync>;

/// Parses text frames into [`WsMessage`]s.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default)]
pub struct PaymentParser;

impl MessageParser<WsMessage> for PaymentParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<WsMessage>> {
        parse_message(bytes).map(|message| vec![message])
    }
}

/// Optional callbacks invoked for each notification, in receive order.
///
/// ```
/// use payverge_client::payments::Handlers;
///
/// let handlers = Handlers::default()
///     .on_payment_received(|payment| println!("bill {} paid", payment.bill_id));
/// ```
#[derive(Default)]
pub struct Handlers {
    on_payment_received: Option<Handler>,
    on_bill_update: Option<Handler>,
}

impl Handlers {
    #[must_use]
    pub fn on_payment_received<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PaymentNotification) + Send + Sync + 'static,
    {
        self.on_payment_received = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_bill_update<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PaymentNotification) + Send + Sync + 'static,
    {
        self.on_bill_update = Some(Box::new(handler));
        self
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_payment_received", &self.on_payment_received.is_some())
            .field("on_bill_update", &self.on_bill_update.is_some())
            .finish()
    }
}

/// Subscribes to the configured rooms on every open and dispatches messages by type.
#[derive(Debug)]
pub struct Router {
    targets: Vec<SubscriptionTarget>,
    handlers: Handlers,
    last_message: RwLock<Option<WsMessage>>,
}

impl Router {
    #[must_use]
    pub fn new(rooms: &Rooms, handlers: Handlers) -> Self {
        Self {
            targets: rooms.targets(),
            handlers,
            last_message: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn targets(&self) -> &[SubscriptionTarget] {
        &self.targets
    }

    /// The most recently routed message, whatever its type.
    #[must_use]
    pub fn last_message(&self) -> Option<WsMessage> {
        // A plain value slot cannot be left half-written, so recover from poisoning
        self.last_message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConnectionHooks<WsMessage> for Router {
    fn on_open(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter_map(|target| {
                let request = SubscribeRequest::subscribe(target);
                #[cfg(feature = "tracing")]
                tracing::debug!(room = %request.room, "Subscribing to room");
                serde_json::to_string(&request)
                    .inspect_err(|e| {
                        #[cfg(feature = "tracing")]
                        tracing::error!(error = %e, "Unable to serialize subscribe request");
                        #[cfg(not(feature = "tracing"))]
                        let _: &serde_json::Error = e;
                    })
                    .ok()
            })
            .collect()
    }

    fn on_message(&self, message: &WsMessage) {
        match message {
            WsMessage::PaymentReceived(payment) => {
                if let Some(handler) = &self.handlers.on_payment_received {
                    handler(payment);
                }
            }
            WsMessage::BillUpdate(update) => {
                if let Some(handler) = &self.handlers.on_bill_update {
                    handler(update);
                }
            }
            WsMessage::Unknown { msg_type, .. } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%msg_type, "Ignoring unknown message type");
                #[cfg(not(feature = "tracing"))]
                let _ = msg_type;
            }
        }

        *self
            .last_message
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(message.clone());
    }
}
