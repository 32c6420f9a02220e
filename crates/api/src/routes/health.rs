//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use broker::MessageBroker;
use catalog::ProductCatalog;
use serde::Serialize;

use super::products::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health: reports whether the authoritative store answers.
pub async fn check<C, B>(State(state): State<Arc<AppState<C, B>>>) -> (StatusCode, Json<HealthResponse>)
where
    C: ProductCatalog + 'static,
    B: MessageBroker + 'static,
{
    match state.catalog.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}
