//! Product endpoints.
//!
//! Inserts and updates go to the authoritative store first; the mutation
//! event is published only after the write succeeded. Deletes touch the
//! authoritative store alone.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use broker::{MessageBroker, MessageBrokerExt};
use catalog::ProductCatalog;
use common::{ItemCode, MutationKind, Product};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<C, B> {
    pub catalog: C,
    pub broker: B,
}

impl<C, B> AppState<C, B> {
    pub fn new(catalog: C, broker: B) -> Self {
        Self { catalog, broker }
    }
}

/// Query string naming a product by item code.
#[derive(Deserialize)]
pub struct ItemCodeQuery {
    pub name: Option<String>,
}

impl ItemCodeQuery {
    fn item_code(self) -> Result<ItemCode, ApiError> {
        let name = self
            .name
            .ok_or_else(|| ApiError::BadRequest("missing query parameter: name".to_string()))?;
        ItemCode::new(name).map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub result: &'static str,
}

fn decode(body: &[u8]) -> Result<Product, ApiError> {
    Product::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid product: {e}")))
}

/// POST /product/insert
#[tracing::instrument(skip(state, body))]
pub async fn insert<C, B>(
    State(state): State<Arc<AppState<C, B>>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Product>), ApiError>
where
    C: ProductCatalog + 'static,
    B: MessageBroker + 'static,
{
    let product = decode(&body)?;
    state.catalog.insert(&product).await?;
    state
        .broker
        .publish_mutation(MutationKind::Insert, &product)
        .await?;

    metrics::counter!("api_product_writes_total", "kind" => "insert").increment(1);
    tracing::info!(item_code = %product.item_code, "product inserted");
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /product/select?name={itemcode}
#[tracing::instrument(skip(state, query))]
pub async fn select<C, B>(
    State(state): State<Arc<AppState<C, B>>>,
    Query(query): Query<ItemCodeQuery>,
) -> Result<Json<Product>, ApiError>
where
    C: ProductCatalog + 'static,
    B: MessageBroker + 'static,
{
    let item_code = query.item_code()?;
    match state.catalog.find(&item_code).await? {
        Some(product) => Ok(Json(product)),
        None => Err(ApiError::NotFound(format!("Product not found: {item_code}"))),
    }
}

/// PUT /product/update
#[tracing::instrument(skip(state, body))]
pub async fn update<C, B>(
    State(state): State<Arc<AppState<C, B>>>,
    body: Bytes,
) -> Result<Json<Product>, ApiError>
where
    C: ProductCatalog + 'static,
    B: MessageBroker + 'static,
{
    let product = decode(&body)?;
    state.catalog.update(&product).await?;
    state
        .broker
        .publish_mutation(MutationKind::Update, &product)
        .await?;

    metrics::counter!("api_product_writes_total", "kind" => "update").increment(1);
    tracing::info!(item_code = %product.item_code, "product updated");
    Ok(Json(product))
}

/// DELETE /product/delete?name={itemcode}
#[tracing::instrument(skip(state, query))]
pub async fn delete<C, B>(
    State(state): State<Arc<AppState<C, B>>>,
    Query(query): Query<ItemCodeQuery>,
) -> Result<Json<DeleteResponse>, ApiError>
where
    C: ProductCatalog + 'static,
    B: MessageBroker + 'static,
{
    let item_code = query.item_code()?;
    let deleted = state.catalog.delete(&item_code).await?;
    tracing::info!(%item_code, deleted, "product deleted");
    Ok(Json(DeleteResponse { result: "success" }))
}
