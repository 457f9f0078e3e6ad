//! Session gate: decides whether a stored session token may be reused for the
//! connected wallet.
//!
//! - [`token`]: best-effort decoding of token claims and expiry checks
//! - [`record`]: the `token`, `session_token` and `persist-web3-login` cookies
//! - [`gate`]: [`SessionGate`], which clears the record on expiry or wallet mismatch

pub mod gate;
pub mod record;
pub mod token;

pub use gate::{AuthState, ProfileFetcher, SessionGate};
pub use record::{CookieStore, MemoryCookieStore, SessionRecord, StoredSession};
pub use token::{Claims, decode_jwt, is_token_valid, is_token_valid_at};
