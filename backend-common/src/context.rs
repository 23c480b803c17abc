use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use sqlx::PgPool;

use crate::services::kafka::KafkaRegistry;

/// Handles created at startup, shared with every request handler.
///
/// A `None` slot means the service is disabled. Handlers may use the handles
/// but never close them, the supervisor owns their lifecycle.
#[derive(Clone)]
pub struct AppContext<P = PgPool, M = mongodb::Client, R = MultiplexedConnection> {
    pub postgres: Option<P>,
    pub mongo: Option<M>,
    pub redis: Option<R>,
    pub kafka: Arc<KafkaRegistry>,
}
