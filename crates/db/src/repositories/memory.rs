use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use super::{RepositoryError, SettingsRepository};

/// Clones share the same map.
#[derive(Clone, Default)]
pub struct InMemorySettingsRepository {
    values: Arc<RwLock<HashMap<String, String>>>,
}

#[async_trait::async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let mut values = self.values.write().await;
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        let mut values = self.values.write().await;
        values.remove(key);
        Ok(())
    }
}
