use bon::Builder;
use serde::Serialize;

use crate::types::Address;

/// Query for `GET /api/v1/auth/challenge`.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize, Builder)]
pub struct ChallengeRequest {
    pub address: Address,
}

/// Body of `POST /api/v1/auth/signin`.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize, Builder)]
pub struct SignInRequest {
    /// The exact Sign-In-With-Ethereum text that was signed
    #[builder(into)]
    pub message: String,
    /// `0x` prefixed 65 byte signature
    #[builder(into)]
    pub signature: String,
    pub address: Address,
}
