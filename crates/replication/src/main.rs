//! Replicator entry point.

use std::process::ExitCode;

use broker::{AmqpBroker, MessageBrokerExt, Topology};
use common::telemetry;
use replication::consumer::SOURCE;
use replication::{Config, PostgresReplicaStore, ReplicationConsumer};
use sqlx::postgres::PgPoolOptions;

async fn run() -> replication::Result<()> {
    let config = Config::from_env()?;
    telemetry::install_metrics_listener(config.metrics_port)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = PostgresReplicaStore::new(pool, &config.replica_table);
    store.ensure_schema().await?;

    let broker = AmqpBroker::connect(&config.amqp_uri, SOURCE).await?;
    broker.declare_topology(&Topology::standard()).await?;

    let consumer = ReplicationConsumer::new(store, broker.clone())
        .with_ack_mode(config.ack_mode)
        .with_store_timeout(config.store_timeout);

    let pool = consumer.store().pool().clone();

    telemetry::run_then_release(
        async {
            tokio::select! {
                result = consumer.run() => result,
                () = telemetry::shutdown_signal() => Ok(()),
            }
        },
        move || async move {
            let closed = broker.close().await;
            pool.close().await;
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
            tracing::info!("replicator shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "replicator failed");
            ExitCode::FAILURE
        }
    }
}
