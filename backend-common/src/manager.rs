use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::error::{ServiceError, ServiceKind};

/// The client side of one backing service.
///
/// A connector knows how to open a client, check that it is alive and close
/// it again. It holds no state: the handle lives in the [`ServiceManager`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// A live client. Clones share the underlying connection(s) and can be
    /// used concurrently by request handlers.
    type Handle: Clone + Send + Sync + 'static;

    fn kind(&self) -> ServiceKind;

    async fn open(&self) -> anyhow::Result<Self::Handle>;

    /// Liveness check run against a freshly opened handle.
    async fn ping(&self, handle: &Self::Handle) -> anyhow::Result<()>;

    async fn close(&self, handle: Self::Handle) -> anyhow::Result<()>;
}

/// Outcome of [`ServiceManager::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connected<H> {
    Ready(H),
    /// Turned off by configuration, no I/O was attempted.
    Disabled,
}

impl<H> Connected<H> {
    pub fn ready(self) -> Option<H> {
        match self {
            Connected::Ready(handle) => Some(handle),
            Connected::Disabled => None,
        }
    }
}

/// Owns the enable flag and the single client handle of one backing service.
///
/// `connect` is idempotent and `disconnect` always leaves the slot empty.
/// Both take `&mut self`: they are only called by the supervisor during
/// startup and shutdown, request handlers get clones of the handle.
pub struct ServiceManager<C: Connector> {
    connector: C,
    enabled: bool,
    handle: Option<C::Handle>,
}

impl<C: Connector> ServiceManager<C> {
    pub fn new(connector: C, enabled: bool) -> Self {
        info!("{} manager initialized (enabled={})", connector.kind(), enabled);

        Self {
            connector,
            enabled,
            handle: None,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.connector.kind()
    }

    #[cfg(test)]
    pub(crate) fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn connect(&mut self) -> Result<Connected<C::Handle>, ServiceError> {
        let service = self.kind();

        if !self.enabled {
            warn!("{} usage is disabled, skipping connection", service);
            record_connection(service, "disabled");
            return Ok(Connected::Disabled);
        }

        if let Some(handle) = &self.handle {
            debug!("reusing existing {} client", service);
            record_connection(service, "reused");
            return Ok(Connected::Ready(handle.clone()));
        }

        let handle = match self.connector.open().await {
            Ok(handle) => handle,
            Err(error) => {
                error!("failed to connect to {}: {:#}", service, error);
                record_connection(service, "failed");
                return Err(ServiceError::Connection { service, error });
            }
        };

        if let Err(error) = self.connector.ping(&handle).await {
            error!("{} did not answer the liveness check: {:#}", service, error);
            if let Err(close_error) = self.connector.close(handle).await {
                warn!(
                    "failed to release partially initialized {} client: {:#}",
                    service, close_error
                );
            }
            record_connection(service, "failed");
            return Err(ServiceError::Connection { service, error });
        }

        info!("successfully connected to {}", service);
        record_connection(service, "connected");
        self.handle = Some(handle.clone());

        Ok(Connected::Ready(handle))
    }

    /// Close the handle if there is one. The slot is emptied before closing,
    /// so it stays empty even when the close fails.
    pub async fn disconnect(&mut self) -> Result<(), ServiceError> {
        let service = self.kind();

        let Some(handle) = self.handle.take() else {
            debug!("{} disconnect called but client was not connected", service);
            return Ok(());
        };

        match self.connector.close(handle).await {
            Ok(()) => {
                info!("{} connection closed", service);
                Ok(())
            }
            Err(error) => {
                error!("error while closing {} connection: {:#}", service, error);
                Err(ServiceError::Teardown { service, error })
            }
        }
    }
}

pub(crate) fn record_connection(service: ServiceKind, outcome: &'static str) {
    counter!(
        "backend_connections_total",
        "service" => service.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}
