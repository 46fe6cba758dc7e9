use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::types::TokenPair;

const KEYRING_SERVICE: &str = "com.vitalog.client";
const SLOT_ACCESS_TOKEN: &str = "access_token";
const SLOT_REFRESH_TOKEN: &str = "refresh_token";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("secure storage unavailable")]
    Unavailable,
}

/// Durable holder for the access/refresh token pair. A partial pair (one
/// slot written, the other missing) loads as absent.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError>;
    async fn load(&self) -> Result<Option<TokenPair>, StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

pub struct KeyringTokenStore {
    service: &'static str,
    cached: Mutex<Option<TokenPair>>,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: &'static str) -> Self {
        Self {
            service,
            cached: Mutex::new(None),
        }
    }

    fn entry(&self, slot: &str) -> Result<keyring::Entry, StoreError> {
        keyring::Entry::new(self.service, slot).map_err(|_| StoreError::Unavailable)
    }

    pub fn is_available(&self) -> bool {
        let Ok(entry) = self.entry(SLOT_ACCESS_TOKEN) else {
            return false;
        };

        match entry.get_password() {
            Ok(_) => true,
            Err(keyring::Error::NoEntry) => true,
            Err(keyring::Error::BadEncoding(_)) => true,
            Err(keyring::Error::Ambiguous(_)) => true,
            Err(keyring::Error::NoStorageAccess(_)) => false,
            Err(keyring::Error::PlatformFailure(_)) => false,
            Err(_) => false,
        }
    }

    fn read_slot(&self, slot: &str) -> Result<Option<String>, StoreError> {
        match self.entry(slot)?.get_password() {
            Ok(value) => {
                let trimmed = value.trim().to_string();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed))
                }
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::NoStorageAccess(_)) => Err(StoreError::Unavailable),
            Err(keyring::Error::PlatformFailure(_)) => Err(StoreError::Unavailable),
            Err(_) => Ok(None),
        }
    }

    fn write_slot(&self, slot: &str, value: &str) -> Result<(), StoreError> {
        self.entry(slot)?
            .set_password(value)
            .map_err(|_| StoreError::Unavailable)
    }

    fn delete_slot(&self, slot: &str) -> Result<(), StoreError> {
        match self.entry(slot)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(keyring::Error::NoStorageAccess(_)) => Err(StoreError::Unavailable),
            Err(keyring::Error::PlatformFailure(_)) => Err(StoreError::Unavailable),
            Err(_) => Ok(()),
        }
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    // The cache lock is held across both slot writes so a concurrent load
    // never observes one token updated and the other stale.
    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let mut cached = self.cached.lock().await;
        self.write_slot(SLOT_ACCESS_TOKEN, &pair.access_token)?;
        self.write_slot(SLOT_REFRESH_TOKEN, &pair.refresh_token)?;
        *cached = Some(pair.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(pair) = cached.as_ref() {
            return Ok(Some(pair.clone()));
        }

        let access = self.read_slot(SLOT_ACCESS_TOKEN)?;
        let refresh = self.read_slot(SLOT_REFRESH_TOKEN)?;
        match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => {
                let pair = TokenPair {
                    access_token,
                    refresh_token,
                };
                *cached = Some(pair.clone());
                Ok(Some(pair))
            }
            _ => Ok(None),
        }
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut cached = self.cached.lock().await;
        *cached = None;
        self.delete_slot(SLOT_ACCESS_TOKEN)?;
        self.delete_slot(SLOT_REFRESH_TOKEN)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    inner: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seeded(pair: TokenPair) -> Self {
        let store = Self::new();
        *store.inner.lock().await = Some(pair);
        store
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        *self.inner.lock().await = Some(pair.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemoryTokenStore::new();
        let pair = TokenPair::new("a1", "r1");

        store.save(&pair).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(pair));
    }

    #[tokio::test]
    async fn save_overwrites_previous_pair() {
        let store = MemoryTokenStore::seeded(TokenPair::new("a1", "r1")).await;

        store.save(&TokenPair::new("a2", "r2")).await.unwrap();
        assert_eq!(
            store.load().await.unwrap(),
            Some(TokenPair::new("a2", "r2"))
        );
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = MemoryTokenStore::seeded(TokenPair::new("a1", "r1")).await;

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn load_before_any_save_is_absent() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
