//! Pluggable storage for OAuth state.
//!
//! Five independent maps, all keyed by the canonical server URL. The default
//! [`MemoryStorage`] keeps everything in-process; embedders that want tokens
//! to survive restarts implement [`OAuthStorage`] over their own backing
//! store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::AuthResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Token,
    ClientInfo,
    ServerMetadata,
    Pkce,
    State,
}

#[async_trait]
pub trait OAuthStorage: Send + Sync {
    async fn get(&self, kind: StorageKind, server_url: &str) -> AuthResult<Option<Value>>;
    async fn set(&self, kind: StorageKind, server_url: &str, value: Value) -> AuthResult<()>;
    async fn delete(&self, kind: StorageKind, server_url: &str) -> AuthResult<()>;
}

/// In-memory storage, the default for short-lived clients.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<(StorageKind, String), Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OAuthStorage for MemoryStorage {
    async fn get(&self, kind: StorageKind, server_url: &str) -> AuthResult<Option<Value>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&(kind, server_url.to_string())).cloned())
    }

    async fn set(&self, kind: StorageKind, server_url: &str, value: Value) -> AuthResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert((kind, server_url.to_string()), value);
        Ok(())
    }

    async fn delete(&self, kind: StorageKind, server_url: &str) -> AuthResult<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(&(kind, server_url.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn maps_are_independent_per_kind_and_server() {
        let storage = MemoryStorage::new();
        let server_a = "https://a.example.com";
        let server_b = "https://b.example.com";

        storage
            .set(StorageKind::Token, server_a, json!({"access_token": "a"}))
            .await
            .unwrap();
        storage
            .set(StorageKind::State, server_a, json!("state-a"))
            .await
            .unwrap();

        assert!(storage
            .get(StorageKind::Token, server_a)
            .await
            .unwrap()
            .is_some());
        assert!(storage
            .get(StorageKind::Token, server_b)
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .get(StorageKind::ClientInfo, server_a)
            .await
            .unwrap()
            .is_none());

        storage.delete(StorageKind::Token, server_a).await.unwrap();
        assert!(storage
            .get(StorageKind::Token, server_a)
            .await
            .unwrap()
            .is_none());
        // Deleting one kind leaves the others alone.
        assert!(storage
            .get(StorageKind::State, server_a)
            .await
            .unwrap()
            .is_some());
    }
}
