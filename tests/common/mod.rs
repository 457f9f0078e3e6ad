#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Each test crate only uses some of these helpers"
)]

use std::future::Future;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use payverge_client::types::{Address, address};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};

// publicly known private key
pub const PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
/// Address of [`PRIVATE_KEY`]
pub const WALLET: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const OTHER_WALLET: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

pub const CHAIN_ID: u64 = 8453;
pub const NOW: i64 = 1_700_000_000;

/// Compact token with the given claims. The signature segment is not checked client side.
#[must_use]
pub fn token_with(claims: &Value) -> String {
    format!(
        "{}.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

#[must_use]
pub fn session_token(address: Address, exp: i64) -> SecretString {
    SecretString::from(token_with(&json!({
        "address": address.to_string().to_lowercase(),
        "exp": exp,
        "role": "customer",
        "chainId": CHAIN_ID,
    })))
}

/// Poll `condition` every few milliseconds for up to two seconds.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Await `future` for up to two seconds.
pub async fn within<T, F: Future<Output = T>>(future: F) -> T {
    timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out")
}
