use async_trait::async_trait;
use thiserror::Error;

use k9_core::domain::knowledge::KnowledgeBaseId;

pub mod memory;
pub mod settings;

pub use memory::InMemorySettingsRepository;
pub use settings::SqlSettingsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Opaque key-value store for the bot's few persisted settings.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError>;
    async fn remove(&self, key: &str) -> Result<(), RepositoryError>;
}

pub const CURRENT_KNOWLEDGE_BASE_KEY: &str = "current_kb_id";

/// Reads and writes the active knowledge base id through a settings repository.
pub struct KnowledgeBaseStore<R> {
    settings: R,
}

impl<R> KnowledgeBaseStore<R>
where
    R: SettingsRepository,
{
    pub fn new(settings: R) -> Self {
        Self { settings }
    }

    pub async fn current(&self) -> Result<Option<KnowledgeBaseId>, RepositoryError> {
        let value = self.settings.get(CURRENT_KNOWLEDGE_BASE_KEY).await?;
        Ok(value.filter(|id| !id.trim().is_empty()).map(KnowledgeBaseId))
    }

    pub async fn save(&self, id: &KnowledgeBaseId) -> Result<(), RepositoryError> {
        self.settings.set(CURRENT_KNOWLEDGE_BASE_KEY, &id.0).await
    }

    pub async fn clear(&self) -> Result<(), RepositoryError> {
        self.settings.remove(CURRENT_KNOWLEDGE_BASE_KEY).await
    }
}
