use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_stream::try_stream;
use futures::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::Config;
use super::error::WsError;
use super::policy::ReconnectPolicy;
use super::traits::{ConnectionHooks, MessageParser};
use super::transport::{
    ABNORMAL_CLOSURE, Connector, NO_STATUS_RECEIVED, NORMAL_CLOSURE, Socket, SocketEvent,
    TungsteniteConnector,
};
use crate::Result;
use crate::error::Error;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, including while waiting out a reconnect delay
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// How a socket stopped being used.
enum Outcome {
    /// The socket closed with this code
    Closed(u16),
    /// [`ConnectionManager::disconnect`] was called
    Cancelled,
}

/// A running connection task.
struct Run {
    cancel: CancellationToken,
    sender_tx: mpsc::UnboundedSender<String>,
}

struct Control {
    /// Bumped on every connect/disconnect. A task only publishes state while its
    /// generation is current, so a task winding down after `disconnect()` can never
    /// overwrite the state of its successor.
    generation: u64,
    run: Option<Run>,
}

struct Shared<M, P> {
    endpoint: String,
    config: Config,
    parser: P,
    hooks: Arc<dyn ConnectionHooks<M>>,
    connector: Arc<dyn Connector>,
    control: Mutex<Control>,
    state_tx: watch::Sender<ConnectionState>,
    broadcast_tx: broadcast::Sender<M>,
    attempts: AtomicU32,
}

/// Manages a single WebSocket connection: dialing, reconnection and message fan-out.
///
/// - [`ConnectionManager::connect`] spawns the connection task; it is a no-op while one is
///   already running.
/// - On open, frames from [`ConnectionHooks::on_open`] are sent (fire-and-forget).
/// - Inbound text frames are parsed by `P`, handed to [`ConnectionHooks::on_message`] and
///   broadcast to every [`ConnectionManager::subscribe`] receiver.
/// - Any close other than a normal closure (1000) schedules a reconnect according to the
///   configured [`ReconnectPolicy`].
/// - [`ConnectionManager::disconnect`] cancels a pending reconnect and closes the socket
///   with code 1000.
///
/// # Type Parameters
///
/// - `M`: Message type that implements [`DeserializeOwned`] among other "helper" types
/// - `P`: Parser type that implements [`MessageParser<M>`]
///
/// # Example
///
/// ```ignore
/// let connection = ConnectionManager::new(
///     "ws://localhost:8080/api/v1/ws".to_owned(),
///     Config::default(),
///     SimpleParser,
///     Arc::new(NoHooks),
/// )?;
/// connection.connect();
///
/// let mut rx = connection.subscribe();
/// while let Ok(msg) = rx.recv().await {
///     println!("Received: {:?}", msg);
/// }
/// ```
pub struct ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + Sync + 'static,
    P: MessageParser<M>,
{
    shared: Arc<Shared<M, P>>,
}

impl<M, P> Clone for ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + Sync + 'static,
    P: MessageParser<M>,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M, P> ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + Sync + 'static,
    P: MessageParser<M>,
{
    /// Create a connection manager that dials through `tokio-tungstenite`.
    ///
    /// Nothing is dialed until [`ConnectionManager::connect`] is called.
    pub fn new(
        endpoint: String,
        config: Config,
        parser: P,
        hooks: Arc<dyn ConnectionHooks<M>>,
    ) -> Result<Self> {
        Self::with_connector(
            endpoint,
            config,
            parser,
            hooks,
            Arc::new(TungsteniteConnector),
        )
    }

    /// Create a connection manager that dials through `connector`.
    pub fn with_connector(
        endpoint: String,
        config: Config,
        parser: P,
        hooks: Arc<dyn ConnectionHooks<M>>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let url = Url::parse(&endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "WebSocket endpoint must use ws:// or wss://, got {endpoint}"
            )));
        }
        if config.broadcast_capacity == 0 {
            return Err(Error::validation("broadcast capacity must be non-zero"));
        }

        let (broadcast_tx, _) = broadcast::channel(config.broadcast_capacity);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            shared: Arc::new(Shared {
                endpoint,
                config,
                parser,
                hooks,
                connector,
                control: Mutex::new(Control {
                    generation: 0,
                    run: None,
                }),
                state_tx,
                broadcast_tx,
                attempts: AtomicU32::new(0),
            }),
        })
    }

    /// Start the connection task.
    ///
    /// No-op while a task is already running, whether it is connecting, connected or
    /// waiting to reconnect. After the retry budget is exhausted (or after a normal
    /// closure from the server) the task has ended and this starts a fresh one with a
    /// full budget.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut control = self.shared.lock_control();
        if control.run.is_some() {
            #[cfg(feature = "tracing")]
            tracing::trace!(endpoint = %self.shared.endpoint, "Connection task already running");
            return;
        }

        control.generation = control.generation.wrapping_add(1);
        let generation = control.generation;
        let cancel = CancellationToken::new();
        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        control.run = Some(Run {
            cancel: cancel.clone(),
            sender_tx,
        });

        self.shared.attempts.store(0, Ordering::SeqCst);
        self.shared
            .state_tx
            .send_replace(ConnectionState::Connecting);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.connection_loop(generation, cancel, sender_rx).await;
        });
    }

    /// Stop the connection task.
    ///
    /// Cancels a pending reconnect and closes an open socket with code 1000. The state is
    /// [`ConnectionState::Disconnected`] when this returns. Safe to call repeatedly and
    /// immediately after [`ConnectionManager::connect`].
    pub fn disconnect(&self) {
        let mut control = self.shared.lock_control();
        control.generation = control.generation.wrapping_add(1);
        if let Some(run) = control.run.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!(endpoint = %self.shared.endpoint, "Disconnecting");
            run.cancel.cancel();
        }
        self.shared
            .state_tx
            .send_replace(ConnectionState::Disconnected);
    }

    /// Send a request to the WebSocket server.
    ///
    /// Fails with [`WsError::NotConnected`] when no socket is open; the frame is not queued.
    pub fn send<R: Serialize>(&self, request: &R) -> Result<()> {
        let json = serde_json::to_string(request)?;

        let control = self.shared.lock_control();
        let Some(run) = control.run.as_ref() else {
            return Err(WsError::NotConnected.into());
        };
        if !self.state().is_connected() {
            return Err(WsError::NotConnected.into());
        }

        run.sender_tx
            .send(json)
            .map_err(|_e| WsError::NotConnected)?;
        Ok(())
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Whether a socket is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Reconnects scheduled since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// The endpoint this manager dials.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Subscribe to incoming messages.
    ///
    /// Each call returns a new independent receiver. Multiple subscribers can
    /// receive messages concurrently without blocking each other.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<M> {
        self.shared.broadcast_tx.subscribe()
    }

    /// Stream of incoming messages.
    ///
    /// Yields [`WsError::Lagged`] when the consumer falls too far behind, then continues.
    pub fn stream(&self) -> impl Stream<Item = Result<M>> + use<M, P> {
        let mut rx = self.subscribe();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(message) => yield message,
                    Err(RecvError::Lagged(count)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Message stream lagged, missed {count} messages");
                        Err(WsError::Lagged { count })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }
}

impl<M, P> Shared<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + Sync + 'static,
    P: MessageParser<M>,
{
    // A poisoned lock is recovered.
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, generation: u64, state: ConnectionState) {
        let control = self.lock_control();
        if control.generation == generation {
            self.state_tx.send_replace(state);
        }
    }

    /// Ends a task that stopped on its own (retries exhausted or normal closure).
    fn finish(&self, generation: u64) {
        let mut control = self.lock_control();
        if control.generation == generation {
            control.run = None;
            self.state_tx.send_replace(ConnectionState::Disconnected);
        }
    }

    /// Dial, serve and redial until cancelled or out of retries.
    async fn connection_loop(
        &self,
        generation: u64,
        cancel: CancellationToken,
        mut sender_rx: mpsc::UnboundedReceiver<String>,
    ) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            self.publish(generation, ConnectionState::Connecting);

            let dialed = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                dialed = self.connector.connect(&self.endpoint) => dialed,
            };

            let code = match dialed {
                Ok(mut socket) => {
                    policy.reset();
                    self.attempts.store(0, Ordering::SeqCst);
                    self.publish(
                        generation,
                        ConnectionState::Connected {
                            since: Instant::now(),
                        },
                    );

                    // Frames queued while no socket was open are stale
                    while sender_rx.try_recv().is_ok() {}

                    match self
                        .handle_socket(socket.as_mut(), &cancel, &mut sender_rx)
                        .await
                    {
                        Outcome::Closed(code) => code,
                        Outcome::Cancelled => return,
                    }
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(endpoint = %self.endpoint, error = %e, "Unable to connect");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;
                    ABNORMAL_CLOSURE
                }
            };

            self.publish(generation, ConnectionState::Disconnected);

            let Some(delay) = policy.next_delay(code) else {
                #[cfg(feature = "tracing")]
                log_stopped(&self.endpoint, code, policy.attempt());
                break;
            };
            self.attempts.store(policy.attempt(), Ordering::SeqCst);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                code,
                attempt = policy.attempt(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Scheduling reconnect"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = sleep(delay) => {}
            }
        }

        self.finish(generation);
    }

    /// Serve one open socket until it closes or the task is cancelled.
    async fn handle_socket(
        &self,
        socket: &mut dyn Socket,
        cancel: &CancellationToken,
        sender_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> Outcome {
        for frame in self.hooks.on_open() {
            if let Err(e) = socket.send(frame).await {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "Failed to send frame on open, dropping it");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
        }

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    if let Err(e) = socket.close(NORMAL_CLOSURE).await {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(error = %e, "Error closing socket");
                        #[cfg(not(feature = "tracing"))]
                        let _ = &e;
                    }
                    return Outcome::Cancelled;
                }

                event = socket.next_event() => {
                    match event {
                        Some(SocketEvent::Text(text)) => self.route(&text),
                        Some(SocketEvent::Closed(code)) => {
                            return Outcome::Closed(code.unwrap_or(NO_STATUS_RECEIVED));
                        }
                        Some(SocketEvent::Error(e)) => {
                            // Errors only log. The socket is dead, so report the close the
                            // transport owes us and let the policy decide.
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %e, "WebSocket error");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &e;
                            return Outcome::Closed(ABNORMAL_CLOSURE);
                        }
                        None => return Outcome::Closed(ABNORMAL_CLOSURE),
                    }
                }

                Some(text) = sender_rx.recv() => {
                    if let Err(e) = socket.send(text).await {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %e, "Failed to send frame, dropping it");
                        #[cfg(not(feature = "tracing"))]
                        let _ = &e;
                    }
                }
            }
        }
    }

    fn route(&self, text: &str) {
        #[cfg(feature = "tracing")]
        tracing::trace!(%text, "Received WebSocket text message");

        match self.parser.parse(text.as_bytes()) {
            Ok(messages) => {
                for message in messages {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(?message, "Parsed WebSocket message");
                    self.hooks.on_message(&message);
                    _ = self.broadcast_tx.send(message);
                }
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%text, error = %e, "Failed to parse WebSocket message");
                #[cfg(not(feature = "tracing"))]
                let _ = (&text, &e);
            }
        }
    }
}

#[cfg(feature = "tracing")]
fn log_stopped(endpoint: &str, code: u16, attempts: u32) {
    if code == NORMAL_CLOSURE {
        tracing::debug!(%endpoint, "Connection closed normally");
    } else {
        tracing::warn!(
            %endpoint,
            attempts,
            "Reconnect attempts exhausted, staying disconnected"
        );
    }
}
