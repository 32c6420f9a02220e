//! API server entry point.

use std::process::ExitCode;
use std::sync::Arc;

use api::config::Config;
use api::routes::products::AppState;
use broker::{AmqpBroker, MessageBrokerExt, Topology};
use catalog::MongoCatalog;
use common::telemetry;
use metrics_exporter_prometheus::PrometheusBuilder;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

async fn run() -> Result<(), BoxError> {
    // 1. Configuration and metrics recorder
    let config = Config::from_env()?;
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    // 2. Authoritative store
    let client = catalog::connect(&config.mongo_uri).await?;
    let catalog = MongoCatalog::new(&client, &config.db_name, &config.product_collection);
    catalog.ensure_indexes().await?;

    // 3. Broker
    let broker = AmqpBroker::connect(&config.amqp_uri, "api").await?;
    broker.declare_topology(&Topology::standard()).await?;

    // 4. Serve
    let state = Arc::new(AppState::new(catalog, broker.clone()));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    telemetry::run_then_release(
        async {
            axum::serve(listener, app)
                .with_graceful_shutdown(telemetry::shutdown_signal())
                .await
                .map_err(BoxError::from)
        },
        move || async move { broker.close().await },
    )
    .await
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();

    match run().await {
        Ok(()) => {
            tracing::info!("server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "API server failed");
            ExitCode::FAILURE
        }
    }
}
