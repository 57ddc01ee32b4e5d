//! Session credential storage.
//!
//! The transport asks the store for a bearer token before every request. Tokens
//! are held as `SecretString` so they never end up in `Debug` output or logs.

use secrecy::SecretString;
use std::{
    fmt,
    sync::{PoisonError, RwLock},
    time::{Duration, Instant},
};
use tracing::debug;

/// Persists and retrieves session tokens.
pub trait CredentialStore: Send + Sync {
    /// Current access token, `None` when missing or expired.
    fn access_token(&self) -> Option<SecretString>;

    fn is_valid(&self) -> bool {
        self.access_token().is_some()
    }

    /// Replace the stored token. `ttl` of `None` means it never expires locally.
    fn store(&self, token: SecretString, ttl: Option<Duration>);

    fn clear(&self);
}

struct StoredToken {
    token: SecretString,
    expires_at: Option<Instant>,
}

impl StoredToken {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// In-process token store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<StoredToken>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: SecretString, ttl: Option<Duration>) -> Self {
        let store = Self::new();
        store.store(token, ttl);
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<SecretString> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(stored) if !stored.is_expired(Instant::now()) => Some(stored.token.clone()),
            Some(_) => {
                debug!("access token expired");
                None
            }
            None => None,
        }
    }

    fn store(&self, token: SecretString, ttl: Option<Duration>) {
        // A lifetime past what `Instant` can represent never expires locally.
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) =
            Some(StoredToken { token, expires_at });
    }

    fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MemoryCredentialStore")
            .field("token", &guard.as_ref().map(|_| "***"))
            .field(
                "expires_at",
                &guard.as_ref().and_then(|stored| stored.expires_at),
            )
            .finish()
    }
}
