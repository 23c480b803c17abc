use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use backend_common::probe::probe;

use crate::router::AppState;

#[derive(Debug, Deserialize)]
pub struct HealthRequest {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Health {
    #[serde(rename = "okay")]
    Okay,
    #[serde(rename = "Not Okay")]
    NotOkay,
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthResponse {
    pub health: Health,
}

/// Report whether `host:port` accepts TCP connections. Unreachable targets are
/// a normal `Not Okay` answer, not an error.
pub async fn check(
    State(state): State<AppState>,
    Json(request): Json<HealthRequest>,
) -> Json<HealthResponse> {
    let health = match probe(&request.host, request.port, state.probe_timeout).await {
        true => Health::Okay,
        false => Health::NotOkay,
    };

    Json(HealthResponse { health })
}
