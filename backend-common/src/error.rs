use std::fmt;

use thiserror::Error;

use crate::supervisor::Phase;

/// The backing services managed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Postgres,
    Mongo,
    Redis,
    Kafka,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Postgres => "postgres",
            ServiceKind::Mongo => "mongo",
            ServiceKind::Redis => "redis",
            ServiceKind::Kafka => "kafka",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumeration of errors raised by the service managers.
/// Underlying client errors are wrapped to keep the service they came from.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service is turned off by configuration. Expected, callers treat it as "feature off".
    #[error("{0} usage is disabled")]
    Disabled(ServiceKind),
    #[error("failed to connect to {service}: {error}")]
    Connection {
        service: ServiceKind,
        error: anyhow::Error,
    },
    #[error("error while closing {service}: {error}")]
    Teardown {
        service: ServiceKind,
        error: anyhow::Error,
    },
    /// The service was shut down and accepts no new work.
    #[error("{0} has been shut down")]
    Closed(ServiceKind),
    /// A named resource was requested before being provisioned.
    #[error("{service} {resource} not initialized")]
    NotInitialized {
        service: ServiceKind,
        resource: String,
    },
}

impl ServiceError {
    pub fn service(&self) -> ServiceKind {
        match self {
            ServiceError::Disabled(service) | ServiceError::Closed(service) => *service,
            ServiceError::Connection { service, .. }
            | ServiceError::Teardown { service, .. }
            | ServiceError::NotInitialized { service, .. } => *service,
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("cannot {action} while {phase:?}")]
    InvalidTransition { action: &'static str, phase: Phase },
    #[error(transparent)]
    Service(#[from] ServiceError),
}
