//! Connectors for each backing service, and the Kafka registry.
pub mod kafka;
pub mod mongo;
pub mod postgres;
pub mod redis;
