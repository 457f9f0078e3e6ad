use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::Value;
use serde_with::{DefaultOnError, serde_as};

use crate::Result;
use crate::error::SessionError;
use crate::types::{Address, ChainId, Utc};

/// Claims carried in a session token payload.
///
/// Every field is optional and decoded independently: a claim with an unexpected shape
/// reads as `None` instead of failing the whole token.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Wallet the session was issued to
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub address: Option<Address>,
    /// Expiry in unix seconds
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub role: Option<String>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default, rename = "chainId", alias = "chain_id")]
    pub chain_id: Option<ChainId>,
}

impl Claims {
    /// `exp` exists and is strictly after `now_secs`.
    #[must_use]
    pub fn is_valid_at(&self, now_secs: i64) -> bool {
        self.exp.is_some_and(|exp| exp > now_secs)
    }

    /// Whether the token was issued to `wallet`. Address comparison ignores checksum case.
    #[must_use]
    pub fn is_bound_to(&self, wallet: Address) -> bool {
        self.address == Some(wallet)
    }
}

/// Decode the payload segment of a compact token.
///
/// No signature check happens here; the backend verifies tokens on every request.
pub fn try_decode(token: &str) -> Result<Claims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(SessionError::Malformed.into());
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    // Claims are named; a positional array payload carries none
    let payload: Value = serde_json::from_slice(&bytes)?;
    if !payload.is_object() {
        return Err(SessionError::Malformed.into());
    }
    Ok(serde_json::from_value(payload)?)
}

/// Best-effort decode: malformed tokens yield empty [`Claims`].
#[must_use]
pub fn decode_jwt(token: &str) -> Claims {
    try_decode(token).unwrap_or_default()
}

/// True iff the token carries an `exp` claim later than `now_secs`.
#[must_use]
pub fn is_token_valid_at(token: &str, now_secs: i64) -> bool {
    decode_jwt(token).is_valid_at(now_secs)
}

/// True iff the token carries an `exp` claim later than the current time.
#[must_use]
pub fn is_token_valid(token: &str) -> bool {
    is_token_valid_at(token, Utc::now().timestamp())
}
