use bon::Builder;
use secrecy::SecretString;
use serde::Deserialize;
use serde_with::{DefaultOnError, serde_as};

use crate::types::{Address, DateTime, Utc};

/// Single use nonce to embed in the sign-in message.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChallengeResponse {
    pub nonce: String,
}

/// Issued session token, optionally with the signed in user.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize)]
pub struct SignInResponse {
    pub token: SecretString,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// A Payverge user as returned by `GET /api/v1/users/address/{address}`.
#[serde_as]
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Builder)]
pub struct UserProfile {
    pub id: u64,
    #[serde(alias = "wallet_address")]
    pub address: Address,
    #[builder(into)]
    pub username: Option<String>,
    #[builder(into)]
    pub email: Option<String>,
    #[builder(into)]
    pub role: Option<String>,
    /// Businesses owned by this user
    #[serde(default)]
    #[builder(default)]
    pub business_ids: Vec<u64>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
