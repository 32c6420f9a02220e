//! Product HTTP API.
//!
//! Writes products to the authoritative store and publishes one mutation
//! event per successful insert or update, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use broker::MessageBroker;
use catalog::ProductCatalog;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::products::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<C, B>(state: Arc<AppState<C, B>>, metrics_handle: PrometheusHandle) -> Router
where
    C: ProductCatalog + 'static,
    B: MessageBroker + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<C, B>))
        .route("/product/insert", post(routes::products::insert::<C, B>))
        .route("/product/select", get(routes::products::select::<C, B>))
        .route("/product/update", put(routes::products::update::<C, B>))
        .route("/product/delete", delete(routes::products::delete::<C, B>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
