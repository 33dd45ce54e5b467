use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use k9_db::DbPool;
use k9_slack::{SessionPhase, SessionSnapshot};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    session: watch::Receiver<SessionSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub session: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, session: watch::Receiver<SessionSnapshot>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, session })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    db_pool: DbPool,
    session: watch::Receiver<SessionSnapshot>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(event_name = "system.health.start", bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool, session)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let session = session_check(&state.session.borrow());
    let ready = database.status == "ready" && session.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        session,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn session_check(snapshot: &SessionSnapshot) -> HealthCheck {
    let status = if snapshot.phase == SessionPhase::Connected { "ready" } else { "degraded" };
    HealthCheck {
        status,
        detail: format!(
            "slack session {} (generation {})",
            snapshot.phase.as_str(),
            snapshot.generation
        ),
    }
}
