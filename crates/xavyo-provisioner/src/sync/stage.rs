//! Persistence of synchronization cursors.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use xavyo_connector::sync::SyncToken;

use crate::error::ResourceResult;

/// Stage key of a per-object-class sync, e.g. `SYSTEMXMLACCOUNT`.
#[must_use]
pub fn stage_key(system: &str, object_class: Option<&str>) -> String {
    format!("system{system}{}", object_class.unwrap_or_default()).to_uppercase()
}

/// Storage for the cursor of each sync stage.
#[async_trait]
pub trait StageStore: Send + Sync {
    /// Stored cursor, or `None` when the stage has never run.
    async fn load_token(&self, key: &str) -> ResourceResult<Option<SyncToken>>;

    /// Persist the cursor for a stage.
    async fn save_token(&self, key: &str, token: SyncToken) -> ResourceResult<()>;
}

/// Process-local stage store.
#[derive(Debug, Default)]
pub struct InMemoryStageStore {
    stages: RwLock<HashMap<String, SyncToken>>,
}

impl InMemoryStageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one stage already positioned.
    pub async fn seeded(key: impl Into<String>, token: SyncToken) -> Self {
        let store = Self::new();
        store.stages.write().await.insert(key.into(), token);
        store
    }
}

#[async_trait]
impl StageStore for InMemoryStageStore {
    async fn load_token(&self, key: &str) -> ResourceResult<Option<SyncToken>> {
        Ok(self.stages.read().await.get(key).copied())
    }

    async fn save_token(&self, key: &str, token: SyncToken) -> ResourceResult<()> {
        self.stages.write().await.insert(key.to_string(), token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_key() {
        assert_eq!(stage_key("xml", Some("account")), "SYSTEMXMLACCOUNT");
        assert_eq!(stage_key("Xml", None), "SYSTEMXML");
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStageStore::new();
        assert_eq!(store.load_token("SYSTEMXML").await.unwrap(), None);

        store
            .save_token("SYSTEMXML", SyncToken::new(3))
            .await
            .unwrap();
        assert_eq!(
            store.load_token("SYSTEMXML").await.unwrap(),
            Some(SyncToken::new(3))
        );
    }

    #[tokio::test]
    async fn test_seeded_store() {
        let store = InMemoryStageStore::seeded("SYSTEMXMLACCOUNT", SyncToken::new(0)).await;
        assert_eq!(
            store.load_token("SYSTEMXMLACCOUNT").await.unwrap(),
            Some(SyncToken::new(0))
        );
    }
}
