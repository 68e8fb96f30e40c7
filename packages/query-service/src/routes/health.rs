//! `/health` (spec §4.12, §6): adapted from the teacher's
//! `health_handler` (`examples/fourthplaces-mntogether/packages/server/src/server/routes/health.rs`),
//! swapping the teacher's single Postgres pool probe for the two stores
//! this service reads from.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    document_store: &'static str,
    vector_store: &'static str,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let document_ok = state.document_store.ping().await;
    let vector_ok = state.vector_store.health_check().await;
    let healthy = document_ok && vector_ok;

    let status_code = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            document_store: if document_ok { "ok" } else { "error" },
            vector_store: if vector_ok { "ok" } else { "error" },
        }),
    )
}
