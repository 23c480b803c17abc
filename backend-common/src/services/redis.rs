use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::config::RedisConfig;
use crate::error::ServiceKind;
use crate::manager::Connector;

pub struct RedisConnector {
    url: String,
}

impl RedisConnector {
    pub fn new(config: &RedisConfig) -> Self {
        Self {
            url: config.redis_url.to_owned(),
        }
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Handle = MultiplexedConnection;

    fn kind(&self) -> ServiceKind {
        ServiceKind::Redis
    }

    async fn open(&self) -> anyhow::Result<MultiplexedConnection> {
        let client = redis::Client::open(self.url.as_str())?;
        let conn = client.get_multiplexed_tokio_connection().await?;

        Ok(conn)
    }

    async fn ping(&self, conn: &MultiplexedConnection) -> anyhow::Result<()> {
        let mut conn = conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            anyhow::bail!("unexpected PING reply: {}", pong);
        }

        Ok(())
    }

    async fn close(&self, conn: MultiplexedConnection) -> anyhow::Result<()> {
        // The driver task stops once the last clone is dropped
        drop(conn);

        Ok(())
    }
}
