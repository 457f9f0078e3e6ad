use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretString};

use super::record::{CookieStore, SessionRecord};
use super::token::{Claims, try_decode};
use crate::Result;
use crate::error::SessionError;
use crate::types::{Address, Utc};

/// Loads the profile for a wallet whose session has been validated.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    type Profile: Clone + Send + Sync;

    async fn fetch_profile(&self, address: Address, token: &SecretString)
    -> Result<Self::Profile>;
}

/// Who the current user is, as far as the session gate knows.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState<P> {
    Anonymous,
    Resolved {
        address: Address,
        claims: Claims,
        profile: P,
    },
}

impl<P> AuthState<P> {
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    #[must_use]
    pub const fn profile(&self) -> Option<&P> {
        match self {
            Self::Resolved { profile, .. } => Some(profile),
            Self::Anonymous => None,
        }
    }
}

/// Decides on wallet connection whether the stored session may be reused.
///
/// A session is reused only while its token is unexpired and bound to the connected
/// wallet. Anything else clears all session cookies and leaves the user anonymous.
pub struct SessionGate<C, F: ProfileFetcher> {
    record: SessionRecord<C>,
    fetcher: F,
    state: RwLock<AuthState<F::Profile>>,
}

impl<C: CookieStore, F: ProfileFetcher> SessionGate<C, F> {
    pub fn new(record: SessionRecord<C>, fetcher: F) -> Self {
        Self {
            record,
            fetcher,
            state: RwLock::new(AuthState::Anonymous),
        }
    }

    pub fn record(&self) -> &SessionRecord<C> {
        &self.record
    }

    pub fn state(&self) -> AuthState<F::Profile> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persist a freshly issued token, e.g. after sign-in.
    pub fn store(&self, token: &SecretString) {
        self.record.set(token);
    }

    /// Check the stored session against `wallet` at the current time.
    pub fn validate_session(&self, wallet: Address) -> Result<Claims> {
        self.validate_session_at(wallet, Utc::now().timestamp())
    }

    /// Check the stored session against `wallet` at `now_secs`.
    ///
    /// On any failure other than [`SessionError::Missing`] the cookies are cleared
    /// before the error is returned.
    pub fn validate_session_at(&self, wallet: Address, now_secs: i64) -> Result<Claims> {
        let Some(session) = self.record.get() else {
            return Err(SessionError::Missing.into());
        };

        match check(session.token.expose_secret(), wallet, now_secs) {
            Ok(claims) => Ok(claims),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::info!(%wallet, reason = %e, "Invalidating stored session");
                self.invalidate();
                Err(e.into())
            }
        }
    }

    /// Resolve the user for a newly connected `wallet`.
    ///
    /// The profile is only fetched for a valid session. A failed fetch leaves the user
    /// anonymous but keeps the cookies, so the next attempt can succeed.
    pub async fn resolve(&self, wallet: Address) -> AuthState<F::Profile> {
        self.resolve_at(wallet, Utc::now().timestamp()).await
    }

    pub async fn resolve_at(&self, wallet: Address, now_secs: i64) -> AuthState<F::Profile> {
        let claims = match self.validate_session_at(wallet, now_secs) {
            Ok(claims) => claims,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%wallet, error = %e, "No usable session");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                return self.set_state(AuthState::Anonymous);
            }
        };

        let Some(session) = self.record.get() else {
            return self.set_state(AuthState::Anonymous);
        };

        match self.fetcher.fetch_profile(wallet, &session.token).await {
            Ok(profile) => self.set_state(AuthState::Resolved {
                address: wallet,
                claims,
                profile,
            }),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%wallet, error = %e, "Unable to fetch user profile");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                self.set_state(AuthState::Anonymous)
            }
        }
    }

    /// Forget the user and clear the session cookies.
    pub fn logout(&self) {
        self.invalidate();
    }

    fn invalidate(&self) {
        self.record.clear();
        self.set_state(AuthState::Anonymous);
    }

    fn set_state(&self, state: AuthState<F::Profile>) -> AuthState<F::Profile> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = state.clone();
        state
    }
}

fn check(token: &str, wallet: Address, now_secs: i64) -> std::result::Result<Claims, SessionError> {
    let claims = try_decode(token).map_err(|_e| SessionError::Malformed)?;

    let Some(exp) = claims.exp else {
        return Err(SessionError::Malformed);
    };
    if exp <= now_secs {
        return Err(SessionError::Expired { exp });
    }
    if !claims.is_bound_to(wallet) {
        return Err(SessionError::AddressMismatch {
            token: claims.address,
            wallet,
        });
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    use super::*;
    use crate::error::Kind;
    use crate::session::record::MemoryCookieStore;
    use crate::types::address;

    const NOW: i64 = 1_700_000_000;
    const WALLET: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const OTHER: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

    #[derive(Default)]
    struct StubFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ProfileFetcher for StubFetcher {
        type Profile = String;

        async fn fetch_profile(&self, address: Address, _token: &SecretString) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(crate::error::Error::validation("backend down"))
            } else {
                Ok(format!("profile of {address}"))
            }
        }
    }

    fn token(address: Address, exp: i64) -> SecretString {
        let payload = json!({ "address": address.to_string().to_lowercase(), "exp": exp });
        SecretString::from(format!(
            "e30.{}.c2ln",
            URL_SAFE_NO_PAD.encode(payload.to_string())
        ))
    }

    fn gate(fetcher: StubFetcher) -> (SessionGate<MemoryCookieStore, StubFetcher>, MemoryCookieStore) {
        let store = MemoryCookieStore::new();
        (
            SessionGate::new(SessionRecord::new(store.clone()), fetcher),
            store,
        )
    }

    #[tokio::test]
    async fn valid_session_resolves_profile() {
        let (gate, store) = gate(StubFetcher::default());
        gate.store(&token(WALLET, NOW + 3600));

        let state = gate.resolve_at(WALLET, NOW).await;

        assert_eq!(state.profile(), Some(&format!("profile of {WALLET}")));
        assert_eq!(gate.state(), state);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn expired_session_is_cleared_without_fetching() {
        let (gate, store) = gate(StubFetcher::default());
        gate.store(&token(WALLET, NOW - 1));

        let state = gate.resolve_at(WALLET, NOW).await;

        assert_eq!(state, AuthState::Anonymous);
        assert!(store.is_empty());
        assert_eq!(gate.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn foreign_session_is_cleared_without_fetching() {
        let (gate, store) = gate(StubFetcher::default());
        gate.store(&token(OTHER, NOW + 3600));

        let state = gate.resolve_at(WALLET, NOW).await;

        assert_eq!(state, AuthState::Anonymous);
        assert!(store.is_empty());
        assert_eq!(gate.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_cookies() {
        let (gate, store) = gate(StubFetcher {
            fail: true,
            ..StubFetcher::default()
        });
        gate.store(&token(WALLET, NOW + 3600));

        let state = gate.resolve_at(WALLET, NOW).await;

        assert_eq!(state, AuthState::Anonymous);
        assert_eq!(store.len(), 3);
        assert_eq!(gate.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn validate_reports_reason() {
        let (gate, _store) = gate(StubFetcher::default());

        let err = gate.validate_session_at(WALLET, NOW).unwrap_err();
        assert_eq!(err.downcast_ref::<SessionError>(), Some(&SessionError::Missing));

        gate.store(&token(WALLET, NOW));
        let err = gate.validate_session_at(WALLET, NOW).unwrap_err();
        assert_eq!(err.kind(), Kind::Session);
        assert_eq!(
            err.downcast_ref::<SessionError>(),
            Some(&SessionError::Expired { exp: NOW })
        );

        gate.store(&token(OTHER, NOW + 1));
        let err = gate.validate_session_at(WALLET, NOW).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SessionError>(),
            Some(&SessionError::AddressMismatch {
                token: Some(OTHER),
                wallet: WALLET
            })
        );

        gate.store(&SecretString::from("garbage"));
        let err = gate.validate_session_at(WALLET, NOW).unwrap_err();
        assert_eq!(err.downcast_ref::<SessionError>(), Some(&SessionError::Malformed));
        assert!(gate.record().get().is_none());
    }

    #[test]
    fn logout_clears_everything() {
        let (gate, store) = gate(StubFetcher::default());
        gate.store(&token(WALLET, NOW + 3600));

        gate.logout();

        assert!(store.is_empty());
        assert_eq!(gate.state(), AuthState::Anonymous);
    }
}
