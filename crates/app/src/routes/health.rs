//! Health check handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{FormRepository, SessionRepository};
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadinessQuery {
    /// Only the literal `true` asks for row counts; anything else is ignored.
    #[serde(default)]
    pub detailed: Option<String>,
}

impl ReadinessQuery {
    fn wants_details(&self) -> bool {
        self.detailed.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ReadinessDetails>,
}

#[derive(Debug, Serialize)]
pub struct ReadinessDetails {
    pub database: TableCounts,
}

#[derive(Debug, Serialize)]
pub struct TableCounts {
    pub sessions: i64,
    pub forms: i64,
}

impl IntoResponse for Readiness {
    fn into_response(self) -> Response {
        let status = if self.database == "connected" {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity. Returns 503 with `"database": "error"`
/// when the database is not reachable.
pub async fn readiness(
    State(state): State<AppState>,
    Query(query): Query<ReadinessQuery>,
) -> Readiness {
    let timestamp = Utc::now();

    if let Err(e) = sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        tracing::warn!(error = %e, "readiness check failed");
        return Readiness {
            status: "degraded",
            timestamp,
            database: "error",
            details: None,
        };
    }

    let details = if query.wants_details() {
        match table_counts(&state).await {
            Ok(counts) => Some(ReadinessDetails { database: counts }),
            Err(e) => {
                tracing::warn!(error = %e, "readiness row counts failed");
                None
            }
        }
    } else {
        None
    };

    Readiness {
        status: "ok",
        timestamp,
        database: "connected",
        details,
    }
}

async fn table_counts(state: &AppState) -> Result<TableCounts, crate::db::RepositoryError> {
    Ok(TableCounts {
        sessions: SessionRepository::new(state.pool()).count().await?,
        forms: FormRepository::new(state.pool()).count().await?,
    })
}
