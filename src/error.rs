use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use alloy::primitives::Address;
/// HTTP method type, re-exported for use with error inspection.
pub use reqwest::Method;
/// HTTP status code type, re-exported for use with error inspection.
pub use reqwest::StatusCode;
use reqwest::header;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Error related to non-successful HTTP call
    Status,
    /// Error related to invalid input or state within payverge-client
    Validation,
    /// Internal error from dependencies
    Internal,
    /// Error related to WebSocket connections
    WebSocket,
    /// Error related to an expired, malformed or foreign session token
    Session,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    pub fn status<S: Into<String>>(
        status_code: StatusCode,
        method: Method,
        path: String,
        message: S,
    ) -> Self {
        Status {
            status_code,
            method,
            path,
            message: message.into(),
        }
        .into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Status {
    pub status_code: StatusCode,
    pub method: Method,
    pub path: String,
    pub message: String,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error({}) making {} call to {} with {}",
            self.status_code, self.method, self.path, self.message
        )
    }
}

impl StdError for Status {}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

/// Reasons a stored session token cannot be used.
///
/// All of these are authentication failures: the session is cleared and the user
/// falls back to anonymous, nothing here is fatal.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session token is stored
    Missing,
    /// The token payload could not be decoded or carries no `exp` claim
    Malformed,
    /// The token's `exp` claim is not in the future
    Expired {
        /// `exp` claim in unix seconds
        exp: i64,
    },
    /// The token was issued for a different wallet than the one connected
    AddressMismatch {
        /// Address bound into the token, if any
        token: Option<Address>,
        /// Currently connected wallet
        wallet: Address,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no session token stored"),
            Self::Malformed => write!(f, "session token is malformed"),
            Self::Expired { exp } => write!(f, "session token expired at {exp}"),
            Self::AddressMismatch {
                token: Some(token),
                wallet,
            } => write!(f, "session token issued for {token}, wallet is {wallet}"),
            Self::AddressMismatch {
                token: None,
                wallet,
            } => write!(f, "session token carries no address, wallet is {wallet}"),
        }
    }
}

impl StdError for SessionError {}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Error::with_source(Kind::Session, err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<header::InvalidHeaderValue> for Error {
    fn from(e: header::InvalidHeaderValue) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<alloy::signers::Error> for Error {
    fn from(e: alloy::signers::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<Status> for Error {
    fn from(err: Status) -> Self {
        Error::with_source(Kind::Status, err)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[test]
    fn session_error_into_error_should_succeed() {
        let error: Error = SessionError::Expired { exp: 1_700_000_000 }.into();

        assert_eq!(error.kind(), Kind::Session);
        assert_eq!(error.to_string(), "Session: session token expired at 1700000000");
        assert_eq!(
            error.downcast_ref::<SessionError>(),
            Some(&SessionError::Expired { exp: 1_700_000_000 })
        );
    }

    #[test]
    fn address_mismatch_display_names_both_addresses() {
        let err = SessionError::AddressMismatch {
            token: Some(address!("0x0000000000000000000000000000000000000001")),
            wallet: address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
        };

        let message = err.to_string();
        assert!(message.contains("0x0000000000000000000000000000000000000001"));
        assert!(message.contains("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
    }

    #[test]
    fn status_display_should_succeed() {
        let error = Error::status(
            StatusCode::UNAUTHORIZED,
            Method::GET,
            "/api/v1/users/address/0x01".to_owned(),
            "unauthorized",
        );

        assert_eq!(error.kind(), Kind::Status);
        assert_eq!(
            error.to_string(),
            "Status: error(401 Unauthorized) making GET call to /api/v1/users/address/0x01 with unauthorized"
        );
    }
}
