use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::PostgresConfig;
use crate::error::ServiceKind;
use crate::manager::Connector;

pub struct PostgresConnector {
    url: String,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PostgresConnector {
    pub fn new(config: &PostgresConfig) -> Self {
        Self {
            url: config.postgres_url.to_owned(),
            max_connections: config.postgres_max_connections,
            acquire_timeout: config.postgres_acquire_timeout.0,
        }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    type Handle = PgPool;

    fn kind(&self) -> ServiceKind {
        ServiceKind::Postgres
    }

    async fn open(&self) -> anyhow::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await?;

        Ok(pool)
    }

    async fn ping(&self, pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(pool).await?;

        Ok(())
    }

    async fn close(&self, pool: PgPool) -> anyhow::Result<()> {
        pool.close().await;

        Ok(())
    }
}
