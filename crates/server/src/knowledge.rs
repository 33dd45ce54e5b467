use std::sync::Arc;

use k9_core::{ApplicationError, KnowledgeBaseId, QnaPair};
use k9_db::{KnowledgeBaseStore, SettingsRepository};
use k9_qna::{KnowledgeBaseGateway, SpreadsheetReader};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// The knowledge base the responder answers from. Empty until boot resolves it.
#[derive(Clone)]
pub struct ActiveKnowledgeBase {
    current: Arc<watch::Sender<Option<KnowledgeBaseId>>>,
}

impl Default for ActiveKnowledgeBase {
    fn default() -> Self {
        let (current, _) = watch::channel(None);
        Self { current: Arc::new(current) }
    }
}

impl ActiveKnowledgeBase {
    pub fn current(&self) -> Option<KnowledgeBaseId> {
        self.current.borrow().clone()
    }

    pub fn set(&self, id: KnowledgeBaseId) {
        self.current.send_replace(Some(id));
    }
}

pub struct KnowledgeBoot<R> {
    pub gateway: Arc<dyn KnowledgeBaseGateway>,
    pub spreadsheet: Arc<dyn SpreadsheetReader>,
    pub store: KnowledgeBaseStore<R>,
    pub name: String,
    pub rebuild: bool,
}

impl<R> KnowledgeBoot<R>
where
    R: SettingsRepository,
{
    /// Reuses the stored knowledge base, or builds one from the spreadsheet and stores its id.
    pub async fn resolve(&self) -> Result<KnowledgeBaseId, ApplicationError> {
        let stored = self.store.current().await.map_err(ApplicationError::persistence)?;

        match stored {
            Some(id) if !self.rebuild => {
                info!(
                    event_name = "knowledge.boot.reused",
                    knowledge_base_id = %id,
                    "using stored knowledge base"
                );
                return Ok(id);
            }
            Some(id) => {
                if let Err(error) = self.gateway.delete_knowledge_base(&id).await {
                    warn!(
                        event_name = "knowledge.boot.delete_failed",
                        knowledge_base_id = %id,
                        error = %error,
                        "could not delete previous knowledge base; rebuilding anyway"
                    );
                }
                self.store.clear().await.map_err(ApplicationError::persistence)?;
            }
            None => {}
        }

        self.build().await
    }

    async fn build(&self) -> Result<KnowledgeBaseId, ApplicationError> {
        let rows = self.spreadsheet.read().await.map_err(ApplicationError::spreadsheet)?;
        let row_count = rows.len();
        let pairs: Vec<QnaPair> = rows.iter().filter_map(|row| QnaPair::from_row(row)).collect();

        let id = self
            .gateway
            .create_knowledge_base(&self.name, &pairs)
            .await
            .map_err(ApplicationError::gateway)?;
        self.store.save(&id).await.map_err(ApplicationError::persistence)?;

        info!(
            event_name = "knowledge.boot.created",
            knowledge_base_id = %id,
            rows = row_count,
            pairs = pairs.len(),
            "created knowledge base from spreadsheet"
        );
        Ok(id)
    }
}

/// Resolves the knowledge base off the startup path; chat is ignored until it lands.
pub fn spawn_resolution<R>(boot: KnowledgeBoot<R>, active: ActiveKnowledgeBase)
where
    R: SettingsRepository + 'static,
{
    tokio::spawn(async move {
        match boot.resolve().await {
            Ok(id) => active.set(id),
            Err(error) => error!(
                event_name = "knowledge.boot.failed",
                error_class = error.class(),
                error = %error,
                "knowledge base unavailable; chat messages will be ignored"
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use k9_core::{Answer, ApplicationError, KnowledgeBaseId, QnaPair};
    use k9_db::{InMemorySettingsRepository, KnowledgeBaseStore};
    use k9_qna::{GatewayError, KnowledgeBaseGateway, SheetsError, SpreadsheetReader};

    use super::{ActiveKnowledgeBase, KnowledgeBoot};

    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<String>>,
        created_pairs: Mutex<Vec<QnaPair>>,
    }

    impl RecordingGateway {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl KnowledgeBaseGateway for RecordingGateway {
        async fn create_knowledge_base(
            &self,
            name: &str,
            pairs: &[QnaPair],
        ) -> Result<KnowledgeBaseId, GatewayError> {
            self.calls.lock().expect("calls lock").push(format!("create:{name}"));
            self.created_pairs.lock().expect("pairs lock").extend_from_slice(pairs);
            Ok(KnowledgeBaseId("kb-new".to_owned()))
        }

        async fn delete_knowledge_base(&self, id: &KnowledgeBaseId) -> Result<(), GatewayError> {
            self.calls.lock().expect("calls lock").push(format!("delete:{id}"));
            Ok(())
        }

        async fn get_answer(
            &self,
            _id: &KnowledgeBaseId,
            _question: &str,
        ) -> Result<Answer, GatewayError> {
            Ok(Answer::no_match())
        }

        async fn add_answer(
            &self,
            _id: &KnowledgeBaseId,
            _pair: &QnaPair,
        ) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn publish(&self, _id: &KnowledgeBaseId) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct FixedSheet(Result<Vec<Vec<String>>, SheetsError>);

    #[async_trait]
    impl SpreadsheetReader for FixedSheet {
        async fn read(&self) -> Result<Vec<Vec<String>>, SheetsError> {
            self.0.clone()
        }
    }

    fn rows() -> Vec<Vec<String>> {
        vec![
            vec!["who?".to_owned(), "a dog".to_owned()],
            vec!["orphan question".to_owned()],
            vec!["  ".to_owned(), "orphan answer".to_owned()],
            vec!["where?".to_owned(), "outside".to_owned()],
        ]
    }

    fn boot(
        gateway: Arc<RecordingGateway>,
        sheet: FixedSheet,
        settings: InMemorySettingsRepository,
        rebuild: bool,
    ) -> KnowledgeBoot<InMemorySettingsRepository> {
        KnowledgeBoot {
            gateway,
            spreadsheet: Arc::new(sheet),
            store: KnowledgeBaseStore::new(settings),
            name: "k9".to_owned(),
            rebuild,
        }
    }

    #[tokio::test]
    async fn absent_id_builds_from_spreadsheet_and_persists() {
        let gateway = Arc::new(RecordingGateway::default());
        let settings = InMemorySettingsRepository::default();
        let boot = boot(gateway.clone(), FixedSheet(Ok(rows())), settings.clone(), false);

        let id = boot.resolve().await.expect("resolved");

        assert_eq!(id, KnowledgeBaseId("kb-new".to_owned()));
        assert_eq!(gateway.calls(), vec!["create:k9".to_owned()]);
        assert_eq!(
            *gateway.created_pairs.lock().expect("pairs lock"),
            vec![QnaPair::new("who?", "a dog"), QnaPair::new("where?", "outside")]
        );
        let stored = KnowledgeBaseStore::new(settings).current().await.expect("read back");
        assert_eq!(stored, Some(id));
    }

    #[tokio::test]
    async fn stored_id_is_reused_without_touching_the_gateway() {
        let gateway = Arc::new(RecordingGateway::default());
        let settings = InMemorySettingsRepository::default();
        KnowledgeBaseStore::new(settings.clone())
            .save(&KnowledgeBaseId("kb-old".to_owned()))
            .await
            .expect("seed");

        let id = boot(gateway.clone(), FixedSheet(Ok(rows())), settings, false)
            .resolve()
            .await
            .expect("resolved");

        assert_eq!(id, KnowledgeBaseId("kb-old".to_owned()));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn rebuild_deletes_previous_knowledge_base_first() {
        let gateway = Arc::new(RecordingGateway::default());
        let settings = InMemorySettingsRepository::default();
        KnowledgeBaseStore::new(settings.clone())
            .save(&KnowledgeBaseId("kb-old".to_owned()))
            .await
            .expect("seed");

        let id = boot(gateway.clone(), FixedSheet(Ok(rows())), settings, true)
            .resolve()
            .await
            .expect("resolved");

        assert_eq!(id, KnowledgeBaseId("kb-new".to_owned()));
        assert_eq!(gateway.calls(), vec!["delete:kb-old".to_owned(), "create:k9".to_owned()]);
    }

    #[tokio::test]
    async fn spreadsheet_failure_is_reported_and_nothing_is_stored() {
        let gateway = Arc::new(RecordingGateway::default());
        let settings = InMemorySettingsRepository::default();
        let sheet = FixedSheet(Err(SheetsError::Status { status: 403 }));

        let error = boot(gateway.clone(), sheet, settings.clone(), false)
            .resolve()
            .await
            .expect_err("fails");

        assert!(matches!(error, ApplicationError::Spreadsheet(_)));
        assert!(gateway.calls().is_empty());
        assert_eq!(KnowledgeBaseStore::new(settings).current().await.expect("read"), None);
    }

    #[test]
    fn active_knowledge_base_starts_empty() {
        let active = ActiveKnowledgeBase::default();
        assert_eq!(active.current(), None);
        active.set(KnowledgeBaseId("kb-1".to_owned()));
        assert_eq!(active.clone().current(), Some(KnowledgeBaseId("kb-1".to_owned())));
    }
}
