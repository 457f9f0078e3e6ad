use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use secrecy::{ExposeSecret as _, SecretString};

/// Cookie holding the bearer token sent with API requests.
pub const TOKEN_COOKIE: &str = "token";
/// Cookie holding the token the session gate validates.
pub const SESSION_TOKEN_COOKIE: &str = "session_token";
/// Flag cookie telling the wallet layer to restore the connection on reload.
pub const PERSIST_LOGIN_COOKIE: &str = "persist-web3-login";

/// Value written to [`PERSIST_LOGIN_COOKIE`] while a session exists.
pub const PERSIST_LOGIN_VALUE: &str = "true";

/// Key/value storage for session cookies.
///
/// Implementations only need single-key atomicity; [`SessionRecord`] serializes the
/// multi-key updates itself.
pub trait CookieStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;

    fn set(&self, name: &str, value: &str);

    fn remove(&self, name: &str);
}

impl<T: CookieStore + ?Sized> CookieStore for Arc<T> {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }

    fn set(&self, name: &str, value: &str) {
        (**self).set(name, value);
    }

    fn remove(&self, name: &str) {
        (**self).remove(name);
    }
}

/// In-process [`CookieStore`]. Clones share the same cookies.
#[derive(Clone, Debug, Default)]
pub struct MemoryCookieStore {
    cookies: Arc<DashMap<String, String>>,
}

impl MemoryCookieStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|value| value.clone())
    }

    fn set(&self, name: &str, value: &str) {
        self.cookies.insert(name.to_owned(), value.to_owned());
    }

    fn remove(&self, name: &str) {
        self.cookies.remove(name);
    }
}

/// A session read back from the cookie store.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct StoredSession {
    pub token: SecretString,
    pub persist: bool,
}

/// The three session cookies, written and cleared as a unit.
///
/// Readers never observe a half-written or half-cleared session through this type.
#[derive(Debug)]
pub struct SessionRecord<C> {
    store: C,
    lock: Mutex<()>,
}

impl<C: CookieStore> SessionRecord<C> {
    pub fn new(store: C) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    /// The stored session, if any. `session_token` is authoritative, `token` is the fallback.
    pub fn get(&self) -> Option<StoredSession> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let present = |name: &str| self.store.get(name).filter(|token| !token.is_empty());
        let token = present(SESSION_TOKEN_COOKIE).or_else(|| present(TOKEN_COOKIE))?;
        let persist = self.store.get(PERSIST_LOGIN_COOKIE).as_deref() == Some(PERSIST_LOGIN_VALUE);

        Some(StoredSession {
            token: SecretString::from(token),
            persist,
        })
    }

    /// Store `token` under both token cookies and set the persist flag.
    pub fn set(&self, token: &SecretString) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.store.set(TOKEN_COOKIE, token.expose_secret());
        self.store.set(SESSION_TOKEN_COOKIE, token.expose_secret());
        self.store.set(PERSIST_LOGIN_COOKIE, PERSIST_LOGIN_VALUE);
    }

    /// Remove all three cookies.
    pub fn clear(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.store.remove(TOKEN_COOKIE);
        self.store.remove(SESSION_TOKEN_COOKIE);
        self.store.remove(PERSIST_LOGIN_COOKIE);
    }
}
