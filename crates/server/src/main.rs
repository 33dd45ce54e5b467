mod bootstrap;
mod health;
mod knowledge;
mod responder;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use k9_core::config::{AppConfig, LoadOptions};
use k9_db::{KnowledgeBaseStore, SqlSettingsRepository};
use k9_slack::SessionEventKind;
use tracing_subscriber::EnvFilter;

use crate::{
    knowledge::{ActiveKnowledgeBase, KnowledgeBoot},
    responder::{Responder, ResponderHandler},
};

fn init_logging(config: &AppConfig) {
    use k9_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        app.rtm.subscribe(),
    )
    .await?;

    if let Err(error) = app.rtm.connect().await {
        tracing::error!(
            event_name = "system.server.connect_failed",
            error = %error,
            "could not establish slack session"
        );
        app.db_pool.close().await;
        return Err(error.into());
    }

    let active = ActiveKnowledgeBase::default();
    let responder = Responder::new(app.gateway.clone(), app.rtm.clone(), active.clone());
    app.rtm
        .on(SessionEventKind::ChatMessage, Arc::new(ResponderHandler::new(Arc::new(responder))));

    knowledge::spawn_resolution(
        KnowledgeBoot {
            gateway: app.gateway.clone(),
            spreadsheet: app.spreadsheet.clone(),
            store: KnowledgeBaseStore::new(SqlSettingsRepository::new(app.db_pool.clone())),
            name: app.config.qna.knowledge_base_name.clone(),
            rebuild: app.config.qna.rebuild_on_boot,
        },
        active,
    );

    tracing::info!(event_name = "system.server.started", "k9-server started");
    wait_for_shutdown().await?;
    tracing::info!(event_name = "system.server.stopping", "k9-server stopping");

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.rtm.stop()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.stop_timeout",
            grace_secs = grace.as_secs(),
            "slack session did not stop in time"
        );
    }
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
