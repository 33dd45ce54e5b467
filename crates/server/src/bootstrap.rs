use std::sync::Arc;

use k9_core::config::{AppConfig, ConfigError};
use k9_db::{connect, migrations, DbPool};
use k9_qna::{GoogleSheetsReader, KnowledgeBaseGateway, QnaMakerClient, SpreadsheetReader};
use k9_slack::RtmClient;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub rtm: Arc<RtmClient>,
    pub gateway: Arc<dyn KnowledgeBaseGateway>,
    pub spreadsheet: Arc<dyn SpreadsheetReader>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

#[cfg(test)]
pub async fn bootstrap(
    options: k9_core::config::LoadOptions,
) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Connects storage and builds the outbound clients. Nothing here talks to Slack yet.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let rtm = RtmClient::from_config(&config.slack).map_err(BootstrapError::HttpClient)?;
    let gateway = QnaMakerClient::from_config(&config.qna).map_err(BootstrapError::HttpClient)?;
    let spreadsheet =
        GoogleSheetsReader::from_config(&config.sheets).map_err(BootstrapError::HttpClient)?;

    Ok(Application {
        config,
        db_pool,
        rtm: Arc::new(rtm),
        gateway: Arc::new(gateway),
        spreadsheet: Arc::new(spreadsheet),
    })
}
