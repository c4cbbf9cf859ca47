use std::cell::RefCell;
use std::collections::HashMap;

use crate::config::{
    DEFAULT_STORAGE_PREFIX, STORAGE_KEY_DELEGATION, STORAGE_KEY_IDENTITY, STORAGE_KEY_WALLET,
};
use crate::errors::{AuthClientError, AuthResult};

/// Persistence adapter for the three credential slots.
///
/// Keys arrive unprefixed; implementations apply their own namespace prefix.
/// Writes are not transactional across slots, which is why the client
/// re-validates everything it loads at startup.
pub trait AuthClientStorage {
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> AuthResult<()>;
    async fn remove(&self, key: &str) -> AuthResult<()>;
}

/// Remove all three credential slots: session key, delegation chain and the
/// auxiliary wallet token.
pub async fn delete_storage(storage: &impl AuthClientStorage) -> AuthResult<()> {
    storage.remove(STORAGE_KEY_IDENTITY).await?;
    storage.remove(STORAGE_KEY_DELEGATION).await?;
    storage.remove(STORAGE_KEY_WALLET).await?;
    Ok(())
}

/// Browser `localStorage`-backed adapter.
pub struct BrowserStorage {
    prefix: String,
}

impl BrowserStorage {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn backing(&self) -> AuthResult<web_sys::Storage> {
        let window = web_sys::window()
            .ok_or_else(|| AuthClientError::storage("no window object available"))?;
        window
            .local_storage()
            .map_err(|_| AuthClientError::storage("local storage is not accessible"))?
            .ok_or_else(|| AuthClientError::storage("could not find local storage"))
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl Default for BrowserStorage {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_PREFIX)
    }
}

impl AuthClientStorage for BrowserStorage {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        self.backing()?
            .get_item(&self.prefixed(key))
            .map_err(|_| AuthClientError::storage("failed to read storage item"))
    }

    async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.backing()?
            .set_item(&self.prefixed(key), value)
            .map_err(|_| AuthClientError::storage("failed to write storage item"))
    }

    async fn remove(&self, key: &str) -> AuthResult<()> {
        self.backing()?
            .remove_item(&self.prefixed(key))
            .map_err(|_| AuthClientError::storage("failed to remove storage item"))
    }
}

/// In-memory adapter for native callers and tests.
#[derive(Default)]
pub struct MemoryStorage {
    prefix: String,
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            items: RefCell::new(HashMap::new()),
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Number of stored items, across all namespaces.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl AuthClientStorage for MemoryStorage {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.items.borrow().get(&self.prefixed(key)).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.items
            .borrow_mut()
            .insert(self.prefixed(key), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AuthResult<()> {
        self.items.borrow_mut().remove(&self.prefixed(key));
        Ok(())
    }
}
