use std::future::ready;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use backend_common::context::AppContext;
use backend_common::metrics::track_metrics;

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub context: AppContext,
    pub probe_timeout: Duration,
}

pub fn router(
    context: AppContext,
    probe_timeout: Duration,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let state = AppState {
        context,
        probe_timeout,
    };

    let api = Router::new().route("/health", post(handlers::health::check));

    let router = Router::new()
        .route("/", get(handlers::index))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Installing a global recorder does not work well when serving from tests,
    // so the caller decides.
    match metrics {
        Some(recorder_handle) => {
            router.route("/metrics", get(move || ready(recorder_handle.render())))
        }
        None => router,
    }
}
