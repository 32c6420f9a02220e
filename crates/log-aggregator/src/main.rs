//! Log aggregator entry point.

use std::process::ExitCode;

use broker::{AmqpBroker, MessageBrokerExt, Topology};
use common::telemetry;
use log_aggregator::aggregator::SOURCE;
use log_aggregator::{Config, LogAggregator, MongoLogArchive};

async fn run() -> log_aggregator::Result<()> {
    let config = Config::from_env()?;
    telemetry::install_metrics_listener(config.metrics_port)?;

    let client = catalog::connect(&config.mongo_uri).await?;
    let archive = MongoLogArchive::new(&client, &config.db_name, &config.log_collection);

    let broker = AmqpBroker::connect(&config.amqp_uri, SOURCE).await?;
    broker.declare_topology(&Topology::standard()).await?;

    let aggregator = LogAggregator::new(archive, broker.clone()).with_ack_mode(config.ack_mode);

    // The worker owns its store handle, so it is gone before the client shuts down.
    telemetry::run_then_release(
        async move {
            tokio::select! {
                result = aggregator.run() => result,
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
            tracing::info!("log aggregator shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "log aggregator failed");
            ExitCode::FAILURE
        }
    }
}
