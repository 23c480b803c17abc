use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;

use crate::config::MongoConfig;
use crate::error::ServiceKind;
use crate::manager::Connector;

pub struct MongoConnector {
    url: String,
    server_selection_timeout: Duration,
}

impl MongoConnector {
    pub fn new(config: &MongoConfig) -> Self {
        Self {
            url: config.mongo_url.to_owned(),
            server_selection_timeout: config.mongo_server_selection_timeout.0,
        }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Handle = Client;

    fn kind(&self) -> ServiceKind {
        ServiceKind::Mongo
    }

    async fn open(&self) -> anyhow::Result<Client> {
        let mut options = ClientOptions::parse(&self.url).await?;
        options.server_selection_timeout = Some(self.server_selection_timeout);

        Ok(Client::with_options(options)?)
    }

    /// The client connects lazily, this is where the server is actually reached.
    async fn ping(&self, client: &Client) -> anyhow::Result<()> {
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;

        Ok(())
    }

    async fn close(&self, client: Client) -> anyhow::Result<()> {
        client.shutdown().await;

        Ok(())
    }
}
