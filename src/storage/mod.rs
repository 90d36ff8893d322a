//! Persisted key-value storage for auth data.
//!
//! Writes go through `write_batch` so the token and the user snapshot are
//! always written or cleared together; observers never see one key updated
//! without the other. The token manager is the only writer of the auth keys.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;

/// Key holding the raw bearer token.
pub const AUTH_TOKEN_KEY: &str = "rpg_auth_token";
/// Key holding the serialized user snapshot.
pub const USER_DATA_KEY: &str = "rpg_user_data";
/// Key holding the character the user last opened; cleared on logout.
pub const CURRENT_CHARACTER_KEY: &str = "rpg_current_character";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageWrite {
    Put { key: String, value: String },
    Delete { key: String },
}

impl StorageWrite {
    #[must_use]
    pub fn put(key: &str, value: impl Into<String>) -> Self {
        Self::Put {
            key: key.to_string(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn delete(key: &str) -> Self {
        Self::Delete {
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    /// Read a single key.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Apply every write or none of them.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the batch could not be persisted.
    fn write_batch(&self, batch: &[StorageWrite]) -> Result<()>;
}
