//! Tracing, metrics and shutdown plumbing for the service binaries.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Failure to install the Prometheus exporter.
#[derive(Debug, thiserror::Error)]
#[error("failed to install metrics exporter: {0}")]
pub struct MetricsError(#[from] BuildError);

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). Setting `LOG_FORMAT=json`
/// switches to the JSON formatter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Serves Prometheus metrics on `0.0.0.0:<port>` for a worker process.
///
/// Does nothing when `port` is `None`; metrics are then recorded nowhere.
/// Must be called from within the tokio runtime.
pub fn install_metrics_listener(port: Option<u16>) -> Result<(), MetricsError> {
    let Some(port) = port else {
        return Ok(());
    };
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "metrics listener started");
    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Runs `work`, then `release` whatever `work` returned.
///
/// The error from `work` wins over an error from `release`.
pub async fn run_then_release<W, R, RF, E, RE>(work: W, release: R) -> Result<(), E>
where
    W: Future<Output = Result<(), E>>,
    R: FnOnce() -> RF,
    RF: Future<Output = Result<(), RE>>,
    E: From<RE>,
{
    let worked = work.await;
    let released = release().await;
    worked?;
    released?;
    Ok(())
}
