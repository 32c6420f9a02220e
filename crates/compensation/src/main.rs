//! Compensator entry point.

use std::process::ExitCode;

use broker::{AmqpBroker, MessageBrokerExt, Topology};
use catalog::MongoCatalog;
use common::telemetry;
use compensation::handler::SOURCE;
use compensation::{CompensationHandler, Config};

async fn run() -> compensation::Result<()> {
    let config = Config::from_env()?;
    telemetry::install_metrics_listener(config.metrics_port)?;

    let client = catalog::connect(&config.mongo_uri).await?;
    let catalog = MongoCatalog::new(&client, &config.db_name, &config.product_collection);

    let broker = AmqpBroker::connect(&config.amqp_uri, SOURCE).await?;
    broker.declare_topology(&Topology::standard()).await?;

    let handler = CompensationHandler::new(catalog, broker.clone())
        .with_ack_mode(config.ack_mode)
        .with_delete_timeout(config.delete_timeout);

    // The worker owns its store handle, so it is gone before the client shuts down.
    telemetry::run_then_release(
        async move {
            tokio::select! {
                result = handler.run() => result,
                () = telemetry::shutdown_signal() => Ok(()),
            }
        },
        move || async move {
            let closed = broker.close().await;
            client.shutdown().await;
            closed
        },
    )
    .await
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();

    match run().await {
        Ok(()) => {
            tracing::info!("compensator shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "compensator failed");
            ExitCode::FAILURE
        }
    }
}
