//! Sign-In-With-Ethereum ([EIP-4361](https://eips.ethereum.org/EIPS/eip-4361)) messages and
//! the authentication states of [`crate::api::Client`].

use std::fmt;

/// The [`Signer`] trait from alloy for signing operations.
pub use alloy::signers::Signer;
/// Local wallet signer for signing with a private key.
pub use alloy::signers::local::LocalSigner;
use bon::Builder;
use chrono::SecondsFormat;
/// Secret string types that redact values in debug output for security.
pub use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::Result;
use crate::types::{Address, ChainId, DateTime, Signature, Utc};

pub const SIWE_VERSION: &str = "1";

/// A Sign-In-With-Ethereum message.
///
/// Its [`Display`](fmt::Display) output is the exact text the wallet signs.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Builder)]
pub struct SiweMessage {
    /// Host requesting the signature, e.g. `pay.example.com`
    #[builder(into)]
    pub domain: String,
    pub address: Address,
    /// Human readable assertion shown to the user
    #[builder(into)]
    pub statement: Option<String>,
    pub uri: Url,
    pub chain_id: ChainId,
    /// Server issued challenge, single use
    #[builder(into)]
    pub nonce: String,
    #[builder(default = Utc::now())]
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
}

impl SiweMessage {
    /// Sign this message with `signer` using `personal_sign` semantics.
    pub async fn sign<S: Signer + Sync>(&self, signer: &S) -> Result<Signature> {
        let message = self.to_string();
        Ok(signer.sign_message(message.as_bytes()).await?)
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} wants you to sign in with your Ethereum account:",
            self.domain
        )?;
        writeln!(f, "{}", self.address.to_checksum(None))?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
        }
        writeln!(f)?;
        writeln!(f, "URI: {}", self.uri)?;
        writeln!(f, "Version: {SIWE_VERSION}")?;
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        write!(
            f,
            "Issued At: {}",
            self.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )?;
        if let Some(expiration_time) = &self.expiration_time {
            write!(
                f,
                "\nExpiration Time: {}",
                expiration_time.to_rfc3339_opts(SecondsFormat::Millis, true)
            )?;
        }

        Ok(())
    }
}

/// Each client can exist in one state at a time, i.e. [`state::Unauthenticated`] or
/// [`state::Authenticated`].
pub mod state {
    use secrecy::SecretString;

    use crate::types::Address;

    /// The initial state of the client
    #[non_exhaustive]
    #[derive(Clone, Debug)]
    pub struct Unauthenticated;

    /// The state after a successful sign-in. Requests carry the session token as a bearer.
    #[non_exhaustive]
    #[derive(Clone, Debug)]
    pub struct Authenticated {
        /// The wallet that signed in
        pub(crate) address: Address,
        pub(crate) token: SecretString,
    }

    impl Authenticated {
        #[must_use]
        pub fn address(&self) -> Address {
            self.address
        }

        #[must_use]
        pub fn token(&self) -> &SecretString {
            &self.token
        }
    }

    /// The client state can only be [`Unauthenticated`] or [`Authenticated`].
    pub trait State: sealed::Sealed {
        /// Bearer token sent with requests made in this state
        fn bearer(&self) -> Option<&SecretString>;
    }

    impl State for Unauthenticated {
        fn bearer(&self) -> Option<&SecretString> {
            None
        }
    }
    impl sealed::Sealed for Unauthenticated {}

    impl State for Authenticated {
        fn bearer(&self) -> Option<&SecretString> {
            Some(&self.token)
        }
    }
    impl sealed::Sealed for Authenticated {}

    mod sealed {
        pub trait Sealed {}
    }
}
