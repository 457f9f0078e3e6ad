//! Sign in with a wallet and reuse the session through the session gate.
//!
//! Signs a Sign-In-With-Ethereum challenge with the key in `PAYVERGE_PRIVATE_KEY`, stores the
//! issued token in the session cookies and resolves the user's profile from them, the way a
//! page reload would.
//!
//! Run with tracing enabled:
//! ```sh
//! PAYVERGE_PRIVATE_KEY=0x... RUST_LOG=info cargo run --example sign_in --features tracing -- http://localhost:8080
//! ```

use std::str::FromStr as _;

use payverge_client::PRIVATE_KEY_VAR;
use payverge_client::api::{Client, Config};
use payverge_client::auth::{LocalSigner, Signer as _};
use payverge_client::session::{AuthState, MemoryCookieStore, SessionGate, SessionRecord, decode_jwt};
use secrecy::ExposeSecret as _;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080".to_owned());
    let private_key = std::env::var(PRIVATE_KEY_VAR).expect("Need a private key");
    let signer = LocalSigner::from_str(&private_key)?.with_chain_id(Some(8453));

    let client = Client::new(&host, Config::default())?
        .sign_in(&signer)
        .await?;
    let claims = decode_jwt(client.token().expose_secret());
    info!(address = %client.address(), exp = ?claims.exp, role = ?claims.role, "Signed in");

    let gate = SessionGate::new(
        SessionRecord::new(MemoryCookieStore::new()),
        Client::new(&host, Config::default())?,
    );
    gate.store(client.token());

    match gate.resolve(signer.address()).await {
        AuthState::Resolved { profile, .. } => {
            info!(id = profile.id, username = ?profile.username, "Session resolved");
        }
        state => info!(?state, "Session not usable"),
    }

    let client = client.sign_out().await?;
    gate.logout();
    info!(host = %client.host(), "Signed out");

    Ok(())
}
