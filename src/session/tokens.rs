//! Owner of the in-memory token and its persisted mirror.
//!
//! `TokenManager` is the only component that writes the auth keys. Every write
//! updates the token and the user snapshot in one storage batch while holding
//! the cache lock, so readers never observe one without the other.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, warn};

use super::types::User;
use crate::error::{Error, Result};
use crate::storage::{
    AUTH_TOKEN_KEY, CURRENT_CHARACTER_KEY, KeyValueStore, StorageWrite, USER_DATA_KEY,
};
use crate::token::{TokenValidator, Validity};

/// Outcome of reading the persisted copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hydration {
    /// Nothing was stored.
    Empty,
    /// A token and a user snapshot were loaded.
    Loaded,
    /// The stored data was unusable and has been cleared.
    Discarded(Error),
}

#[derive(Debug, Default)]
struct Cached {
    token: Option<String>,
    user: Option<User>,
}

pub struct TokenManager {
    store: Arc<dyn KeyValueStore>,
    validator: TokenValidator,
    cached: RwLock<Cached>,
}

impl TokenManager {
    /// Build a manager and hydrate it from `store` once.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, validator: TokenValidator) -> Self {
        let manager = Self {
            store,
            validator,
            cached: RwLock::new(Cached::default()),
        };
        manager.hydrate();
        manager
    }

    /// Re-read the persisted copy, failing closed on anything unexpected.
    pub fn hydrate(&self) -> Hydration {
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);

        let token = self.store.get(AUTH_TOKEN_KEY);
        let user = self.store.get(USER_DATA_KEY);

        let outcome = match (token, user) {
            (Ok(None), Ok(None)) => Ok(None),
            (Ok(Some(token)), Ok(Some(user))) => match serde_json::from_str::<User>(&user) {
                Ok(user) => Ok(Some((token, user))),
                Err(err) => Err(Error::CorruptedStorage(format!("user snapshot: {err}"))),
            },
            (Ok(_), Ok(_)) => Err(Error::CorruptedStorage(
                "token and user snapshot out of sync".to_string(),
            )),
            (Err(err), _) | (_, Err(err)) => Err(Error::CorruptedStorage(err.to_string())),
        };

        match outcome {
            Ok(Some((token, user))) => {
                debug!(user_id = %user.id, "hydrated session from storage");
                cached.token = Some(token);
                cached.user = Some(user);
                Hydration::Loaded
            }
            Ok(None) => {
                *cached = Cached::default();
                Hydration::Empty
            }
            Err(err) => {
                warn!("Discarding persisted session: {err}");
                *cached = Cached::default();
                if let Err(clear_err) = self.store.write_batch(&clear_batch()) {
                    error!("Failed to clear corrupted session storage: {clear_err}");
                }
                Hydration::Discarded(err)
            }
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.read().token.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    /// Store a new token and user snapshot together.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the batch cannot be persisted; the cache is
    /// left unchanged in that case.
    pub fn set(&self, token: &str, user: &User) -> Result<()> {
        let snapshot = encode_user(user)?;
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        self.store.write_batch(&[
            StorageWrite::put(AUTH_TOKEN_KEY, token),
            StorageWrite::put(USER_DATA_KEY, snapshot),
        ])?;
        cached.token = Some(token.to_string());
        cached.user = Some(user.clone());
        Ok(())
    }

    /// Replace the user snapshot of the current token.
    ///
    /// # Errors
    /// Returns `Error::Storage` on write failure, `Error::Unauthorized` when no
    /// token is held.
    pub fn update_user(&self, user: &User) -> Result<()> {
        let snapshot = encode_user(user)?;
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        let Some(token) = cached.token.clone() else {
            return Err(Error::Unauthorized);
        };
        self.store.write_batch(&[
            StorageWrite::put(AUTH_TOKEN_KEY, token),
            StorageWrite::put(USER_DATA_KEY, snapshot),
        ])?;
        cached.user = Some(user.clone());
        Ok(())
    }

    /// Drop the token and every auth key. Safe to call repeatedly.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the persisted copy could not be cleared; the
    /// in-memory copy is cleared regardless.
    pub fn clear(&self) -> Result<()> {
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        *cached = Cached::default();
        self.store.write_batch(&clear_batch())
    }

    #[must_use]
    pub fn validity(&self) -> Validity {
        let token = self.get();
        self.validator.validate_optional(token.as_deref())
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validity().is_valid()
    }

    #[must_use]
    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Cached> {
        self.cached.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.read();
        f.debug_struct("TokenManager")
            .field("has_token", &cached.token.is_some())
            .field("user", &cached.user)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

fn clear_batch() -> [StorageWrite; 3] {
    [
        StorageWrite::delete(AUTH_TOKEN_KEY),
        StorageWrite::delete(USER_DATA_KEY),
        StorageWrite::delete(CURRENT_CHARACTER_KEY),
    ]
}

fn encode_user(user: &User) -> Result<String> {
    serde_json::to_string(user)
        .map_err(|err| Error::Storage(format!("failed to encode user snapshot: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::token::{DEFAULT_SKEW_BUFFER, FixedClock, encode_unsigned};
    use serde_json::json;

    const NOW_SECS: u64 = 1_700_000_000;

    fn user() -> User {
        User {
            id: "7".to_string(),
            username: "aria".to_string(),
            email: "aria@example.com".to_string(),
            name: "Aria".to_string(),
            created_at: None,
        }
    }

    fn validator() -> TokenValidator {
        TokenValidator::new(Arc::new(FixedClock::at_secs(NOW_SECS)), DEFAULT_SKEW_BUFFER)
    }

    fn valid_token() -> String {
        encode_unsigned(&json!({ "sub": "7", "exp": NOW_SECS + 3600 }))
    }

    #[test]
    fn set_writes_token_and_user_in_one_batch() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let manager = TokenManager::new(store.clone(), validator());
        manager.set(&valid_token(), &user())?;

        assert_eq!(store.batches_written(), 1);
        assert_eq!(store.get(AUTH_TOKEN_KEY)?, Some(valid_token()));
        assert!(store.get(USER_DATA_KEY)?.is_some());
        assert!(manager.is_valid());
        Ok(())
    }

    #[test]
    fn new_manager_hydrates_from_storage() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        TokenManager::new(store.clone(), validator()).set(&valid_token(), &user())?;

        let reloaded = TokenManager::new(store, validator());
        assert_eq!(reloaded.get(), Some(valid_token()));
        assert_eq!(reloaded.user(), Some(user()));
        Ok(())
    }

    #[test]
    fn corrupted_snapshot_fails_closed() {
        let store = Arc::new(MemoryStore::new());
        store.seed(AUTH_TOKEN_KEY, &valid_token());
        store.seed(USER_DATA_KEY, "{not json");

        let manager = TokenManager::new(store.clone(), validator());
        assert_eq!(manager.get(), None);
        assert!(!store.contains(AUTH_TOKEN_KEY));
        assert!(!store.contains(USER_DATA_KEY));
    }

    #[test]
    fn half_written_storage_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store.seed(AUTH_TOKEN_KEY, &valid_token());

        let manager = TokenManager::new(store.clone(), validator());
        assert!(matches!(manager.hydrate(), Hydration::Empty));
        assert!(!store.contains(AUTH_TOKEN_KEY));
    }

    #[test]
    fn clear_is_idempotent() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let manager = TokenManager::new(store.clone(), validator());
        manager.set(&valid_token(), &user())?;
        store.seed(CURRENT_CHARACTER_KEY, "3");

        manager.clear()?;
        manager.clear()?;
        assert_eq!(manager.get(), None);
        assert!(!manager.is_valid());
        assert!(!store.contains(CURRENT_CHARACTER_KEY));
        Ok(())
    }

    #[test]
    fn update_user_requires_a_token() {
        let manager = TokenManager::new(Arc::new(MemoryStore::new()), validator());
        assert_eq!(manager.update_user(&user()), Err(Error::Unauthorized));
    }

    #[test]
    fn expired_token_is_not_valid() -> anyhow::Result<()> {
        let manager = TokenManager::new(Arc::new(MemoryStore::new()), validator());
        let stale = encode_unsigned(&json!({ "sub": "7", "exp": NOW_SECS + 60 }));
        manager.set(&stale, &user())?;
        assert_eq!(manager.get(), Some(stale));
        assert!(!manager.is_valid());
        Ok(())
    }
}
