//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::routes::products::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use broker::topology::{INSERT_ROUTING_KEY, UPDATE_ROUTING_KEY};
use broker::InMemoryBroker;
use catalog::{InMemoryCatalog, ProductCatalog};
use common::{ItemCode, Product};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const WIDGET: &str =
    r#"{"itemcode":"SKU1","name":"Widget","price":9.99,"category":"tools","jenis":"hardware"}"#;

async fn setup() -> (axum::Router, InMemoryCatalog, InMemoryBroker) {
    let catalog = InMemoryCatalog::new();
    let broker = InMemoryBroker::with_standard_topology().await.unwrap();
    let state = Arc::new(AppState::new(catalog.clone(), broker.clone()));
    let app = api::create_app(state, get_metrics_handle());
    (app, catalog, broker)
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn sku1() -> ItemCode {
    ItemCode::new("SKU1").unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup().await;

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_health_check_reports_unavailable_store() {
    let (app, catalog, _) = setup().await;
    catalog.set_unavailable(true).await;

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_insert_stores_and_publishes() {
    let (app, catalog, broker) = setup().await;

    let response = app
        .oneshot(json_request("POST", "/product/insert", WIDGET))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["itemcode"], "SKU1");
    assert_eq!(json["jenis"], "hardware");

    assert!(catalog.contains(&sku1()).await);
    let events = broker.published_with_key(INSERT_ROUTING_KEY).await;
    assert_eq!(events.len(), 1);
    assert_eq!(
        Product::from_slice(&events[0].body).unwrap(),
        Product::from_slice(WIDGET.as_bytes()).unwrap()
    );
}

#[tokio::test]
async fn test_duplicate_insert_conflicts_without_event() {
    let (app, _, broker) = setup().await;

    let first = app
        .clone()
        .oneshot(json_request("POST", "/product/insert", WIDGET))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(json_request("POST", "/product/insert", WIDGET))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert!(body_json(second).await["error"].is_string());
    assert_eq!(broker.published_with_key(INSERT_ROUTING_KEY).await.len(), 1);
}

#[tokio::test]
async fn test_insert_rejects_invalid_payloads() {
    let (app, catalog, broker) = setup().await;

    for body in ["not json", r#"{"name":"Widget"}"#, r#"{"itemcode":""}"#] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/product/insert", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
    }

    assert_eq!(catalog.product_count().await, 0);
    assert!(broker.published().await.is_empty());
}

#[tokio::test]
async fn test_select_by_item_code() {
    let (app, catalog, _) = setup().await;
    catalog
        .insert(&Product::from_slice(WIDGET.as_bytes()).unwrap())
        .await
        .unwrap();

    let found = app
        .clone()
        .oneshot(empty_request("GET", "/product/select?name=SKU1"))
        .await
        .unwrap();
    assert_eq!(found.status(), StatusCode::OK);
    assert_eq!(body_json(found).await["name"], "Widget");

    let missing = app
        .clone()
        .oneshot(empty_request("GET", "/product/select?name=SKU404"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let no_param = app
        .oneshot(empty_request("GET", "/product/select"))
        .await
        .unwrap();
    assert_eq!(no_param.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_publishes_event() {
    let (app, catalog, broker) = setup().await;
    catalog
        .insert(&Product::from_slice(WIDGET.as_bytes()).unwrap())
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/product/update",
            r#"{"itemcode":"SKU1","name":"Widget Pro","price":12.5,"category":"tools","jenis":"hardware"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = catalog.find(&sku1()).await.unwrap().unwrap();
    assert_eq!(stored.name, "Widget Pro");
    assert_eq!(broker.published_with_key(UPDATE_ROUTING_KEY).await.len(), 1);
}

#[tokio::test]
async fn test_update_of_missing_product_is_not_found() {
    let (app, _, broker) = setup().await;

    let response = app
        .oneshot(json_request("PUT", "/product/update", WIDGET))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(broker.published().await.is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent_and_silent() {
    let (app, catalog, broker) = setup().await;
    catalog
        .insert(&Product::from_slice(WIDGET.as_bytes()).unwrap())
        .await
        .unwrap();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/product/delete?name=SKU1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"], "success");
    }

    assert!(!catalog.contains(&sku1()).await);
    assert!(broker.published().await.is_empty());
}

#[tokio::test]
async fn test_publish_failure_after_write_is_server_error() {
    let (app, catalog, broker) = setup().await;
    broker.set_fail_on_publish(true).await;

    let response = app
        .oneshot(json_request("POST", "/product/insert", WIDGET))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // The authoritative write is kept.
    assert!(catalog.contains(&sku1()).await);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, _) = setup().await;

    let response = app.oneshot(empty_request("GET", "/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
