//! Connection lifecycle for the backing services of the API server.
//!
//! Each backing service (Postgres, MongoDB, Redis) is owned by a
//! [`manager::ServiceManager`], Kafka producers and consumers by the
//! [`services::kafka::KafkaRegistry`]. The [`supervisor::Supervisor`] connects
//! them in a fixed order at startup and tears them all down at shutdown,
//! handing request handlers an [`context::AppContext`] in between.
pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod probe;
pub mod services;
pub mod supervisor;
