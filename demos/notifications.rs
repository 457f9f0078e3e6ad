//! Live payment notifications for one bill.
//!
//! Connects to the endpoint in `PAYVERGE_WS_URL` (default `ws://localhost:8080/api/v1/ws`),
//! subscribes to the bill given as the first argument and logs every payment and bill update
//! until the feed has been quiet for a minute. Connection state changes are logged as they happen, including retries.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info,payverge_client=debug cargo run --example notifications --features tracing -- 42
//! ```

use std::time::Duration;

use futures::StreamExt as _;
use payverge_client::payments::{Client, Handlers, Rooms};
use payverge_client::ws::config::Config;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bill_id: u64 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(42);

    let rooms = Rooms::builder().bill_id(bill_id).build();
    let handlers = Handlers::default()
        .on_payment_received(|payment| {
            info!(
                bill_id = payment.bill_id,
                amount = ?payment.amount,
                tip = ?payment.tip_amount,
                payer = ?payment.payer_address,
                tx = ?payment.transaction_hash,
                "Payment received"
            );
        })
        .on_bill_update(|update| {
            info!(
                bill_id = update.bill_id,
                status = ?update.status,
                paid = ?update.paid_amount,
                remaining = ?update.remaining,
                "Bill updated"
            );
        });

    let client = Client::from_env(Config::default(), &rooms, handlers)?;

    let mut states = client.state_receiver();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!(?state, "Connection state changed");
        }
    });

    client.connect();

    // Stop after a minute without traffic
    let mut messages = Box::pin(client.messages());
    while let Ok(Some(message)) = timeout(Duration::from_secs(60), messages.next()).await {
        match message {
            Ok(message) => info!(msg_type = message.msg_type(), "Message routed"),
            Err(e) => warn!(error = %e, "Stream error"),
        }
    }

    client.disconnect();
    info!(attempts = client.reconnect_attempts(), "Disconnected");

    Ok(())
}
