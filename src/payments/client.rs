use std::fmt;
use std::sync::Arc;

use futures::Stream;
use futures::StreamExt as _;
use tokio::sync::watch;

use super::router::{Handlers, PaymentParser, Router};
use super::types::request::{Rooms, SubscriptionTarget};
use super::types::response::{PaymentNotification, WsMessage};
use crate::Result;
use crate::ws::config::Config;
use crate::ws::{ConnectionManager, ConnectionState, Connector};

/// Real-time payment notification client.
///
/// Watches the rooms it was created for and dispatches `payment_received` and
/// `bill_update` pushes to [`Handlers`] and to any number of streams. Reconnects on
/// abnormal closure with exponential backoff (1s, 2s, 4s, 8s, 16s, then gives up).
/// Dropping the last clone disconnects.
///
/// # Examples
///
/// ```rust, no_run
/// use payverge_client::payments::{Client, Handlers, Rooms};
/// use payverge_client::ws::config::Config;
/// use futures::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let rooms = Rooms::builder().bill_id(42).build();
///     let handlers = Handlers::default()
///         .on_payment_received(|payment| println!("paid: {:?}", payment.amount));
///
///     let client = Client::new("ws://localhost:8080/api/v1/ws", Config::default(), &rooms, handlers)?;
///     client.connect();
///
///     let mut updates = Box::pin(client.bill_updates());
///     while let Some(update) = updates.next().await {
///         println!("remaining: {:?}", update?.remaining);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    connection: ConnectionManager<WsMessage, PaymentParser>,
    router: Arc<Router>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.connection.endpoint())
            .field("state", &self.inner.connection.state())
            .field("targets", &self.targets())
            .finish_non_exhaustive()
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}

impl Client {
    /// Create a client for `endpoint`. Nothing is dialed until [`Client::connect`].
    pub fn new(endpoint: &str, config: Config, rooms: &Rooms, handlers: Handlers) -> Result<Self> {
        let router = Arc::new(Router::new(rooms, handlers));
        let connection = ConnectionManager::new(
            endpoint.to_owned(),
            config,
            PaymentParser,
            Arc::clone(&router) as _,
        )?;

        Ok(Self::from_parts(connection, router))
    }

    /// Create a client for the endpoint named by [`crate::WS_URL_VAR`], falling back to
    /// [`crate::DEFAULT_WS_ENDPOINT`].
    pub fn from_env(config: Config, rooms: &Rooms, handlers: Handlers) -> Result<Self> {
        Self::new(&crate::ws_endpoint(), config, rooms, handlers)
    }

    /// Create a client that dials through a custom [`Connector`].
    pub fn with_connector(
        endpoint: &str,
        config: Config,
        rooms: &Rooms,
        handlers: Handlers,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let router = Arc::new(Router::new(rooms, handlers));
        let connection = ConnectionManager::with_connector(
            endpoint.to_owned(),
            config,
            PaymentParser,
            Arc::clone(&router) as _,
            connector,
        )?;

        Ok(Self::from_parts(connection, router))
    }

    fn from_parts(connection: ConnectionManager<WsMessage, PaymentParser>, router: Arc<Router>) -> Self {
        Self {
            inner: Arc::new(ClientInner { connection, router }),
        }
    }

    /// Open the connection. No-op while already connecting, connected or reconnecting.
    pub fn connect(&self) {
        self.inner.connection.connect();
    }

    /// Close the connection with a normal closure and cancel any pending reconnect.
    pub fn disconnect(&self) {
        self.inner.connection.disconnect();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Subscribe to connection state changes, e.g. to render a reconnect button.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_receiver()
    }

    /// Reconnects scheduled since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.connection.reconnect_attempts()
    }

    /// Rooms subscribed on every open.
    #[must_use]
    pub fn targets(&self) -> &[SubscriptionTarget] {
        self.inner.router.targets()
    }

    /// The most recently received message, including unknown types.
    #[must_use]
    pub fn last_message(&self) -> Option<WsMessage> {
        self.inner.router.last_message()
    }

    /// Every message received from now on.
    pub fn messages(&self) -> impl Stream<Item = Result<WsMessage>> + use<> {
        self.inner.connection.stream()
    }

    /// `payment_received` notifications received from now on.
    pub fn payments(&self) -> impl Stream<Item = Result<PaymentNotification>> + use<> {
        self.messages().filter_map(|msg_result| async move {
            match msg_result {
                Ok(WsMessage::PaymentReceived(payment)) => Some(Ok(payment)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }

    /// `bill_update` notifications received from now on.
    pub fn bill_updates(&self) -> impl Stream<Item = Result<PaymentNotification>> + use<> {
        self.messages().filter_map(|msg_result| async move {
            match msg_result {
                Ok(WsMessage::BillUpdate(update)) => Some(Ok(update)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }
}
