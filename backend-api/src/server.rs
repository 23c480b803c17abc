use std::future::Future;

use eyre::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};

use backend_common::config::Config;
use backend_common::metrics::setup_metrics_recorder;
use backend_common::supervisor::{ShutdownReport, Supervisor};

use crate::router;

/// Start the backing services, serve requests until `shutdown` resolves, then
/// stop the services.
///
/// Nothing is served if a backing service fails to connect. The returned
/// report lists teardown failures, which are not errors.
pub async fn serve<F>(
    config: Config,
    listener: TcpListener,
    shutdown: F,
) -> Result<ShutdownReport>
where
    F: Future<Output = ()> + Send + 'static,
{
    let recorder_handle = match config.export_prometheus {
        true => Some(setup_metrics_recorder()?),
        false => None,
    };

    let mut supervisor = Supervisor::new(&config);
    let context = supervisor.start().await?;
    info!("kafka producers ready: {:?}", context.kafka.producer_names());

    let app = router::router(context, config.probe_timeout.0, recorder_handle);

    info!("listening on {:?}", listener.local_addr()?);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    let report = supervisor.stop().await?;
    for failure in report.failures() {
        warn!("teardown failure: {}", failure);
    }

    served?;
    Ok(report)
}
