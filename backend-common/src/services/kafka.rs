use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use metrics::gauge;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, Producer};
use rdkafka::ClientConfig;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::{ServiceError, ServiceKind};
use crate::manager::record_connection;

/// A producer that can be flushed on shutdown.
pub trait BrokerProducer: Send + Sync {
    fn flush_within(&self, timeout: Duration) -> anyhow::Result<()>;
}

/// A consumer that can be closed on shutdown.
pub trait BrokerConsumer: Send + Sync {
    fn close(&self) -> anyhow::Result<()>;
}

/// Builds the producers and consumers held by a [`KafkaRegistry`].
pub trait BrokerFactory: Send + Sync {
    type Producer: BrokerProducer + 'static;
    type Consumer: BrokerConsumer + 'static;

    fn create_producer(&self, client_id: &str) -> anyhow::Result<Self::Producer>;

    /// The returned consumer is already subscribed to `topics`.
    fn create_consumer(&self, group_id: &str, topics: &[&str]) -> anyhow::Result<Self::Consumer>;
}

pub struct KafkaContext {
    client_id: String,
}

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, stats: rdkafka::Statistics) {
        gauge!("kafka_producer_queue_depth", "client_id" => self.client_id.clone())
            .set(stats.msg_cnt as f64);
        gauge!("kafka_producer_queue_bytes", "client_id" => self.client_id.clone())
            .set(stats.msg_size as f64);
    }
}

impl BrokerProducer for FutureProducer<KafkaContext> {
    fn flush_within(&self, timeout: Duration) -> anyhow::Result<()> {
        Producer::flush(self, timeout)?;

        Ok(())
    }
}

impl BrokerConsumer for StreamConsumer {
    fn close(&self) -> anyhow::Result<()> {
        // Offsets are committed by the caller, nothing is left to commit here.
        // The consumer leaves its group when the last reference is dropped.
        self.unsubscribe();

        Ok(())
    }
}

/// Creates rdkafka clients against a fixed set of brokers.
pub struct RdKafkaFactory {
    hosts: String,
    tls: bool,
}

impl RdKafkaFactory {
    pub fn new(config: &KafkaConfig) -> Self {
        Self {
            hosts: config.kafka_hosts.to_owned(),
            tls: config.kafka_tls,
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config.set("bootstrap.servers", &self.hosts);

        if self.tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        client_config
    }
}

impl BrokerFactory for RdKafkaFactory {
    type Producer = FutureProducer<KafkaContext>;
    type Consumer = StreamConsumer;

    fn create_producer(&self, client_id: &str) -> anyhow::Result<Self::Producer> {
        let mut client_config = self.client_config();
        client_config
            .set("client.id", client_id)
            .set("statistics.interval.ms", "10000");

        debug!("rdkafka producer configuration: {:?}", client_config);
        let producer = client_config.create_with_context(KafkaContext {
            client_id: client_id.to_owned(),
        })?;

        Ok(producer)
    }

    fn create_consumer(&self, group_id: &str, topics: &[&str]) -> anyhow::Result<Self::Consumer> {
        let mut client_config = self.client_config();
        client_config
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false");

        debug!("rdkafka consumer configuration: {:?}", client_config);
        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(topics)?;

        Ok(consumer)
    }
}

/// Named producers and anonymous consumers sharing one broker connection config.
///
/// Unlike the other services, a disabled registry still connects (to nothing)
/// and still shuts down, so callers never have to special-case it. Lookups on
/// a disabled registry fail with [`ServiceError::Disabled`].
///
/// Producers and consumers can be provisioned while requests are being served,
/// hence the interior locking. Handlers get shared handles and must not close them.
///
/// Once [`KafkaRegistry::shutdown`] has run the registry is closed for good:
/// provisioning calls fail with [`ServiceError::Closed`].
pub struct KafkaRegistry<F: BrokerFactory = RdKafkaFactory> {
    factory: F,
    enabled: bool,
    client_id: String,
    flush_timeout: Duration,
    // Only flipped while holding a collection lock, see `shutdown`
    closed: AtomicBool,
    producers: RwLock<BTreeMap<String, Arc<F::Producer>>>,
    consumers: Mutex<Vec<Arc<F::Consumer>>>,
}

impl KafkaRegistry<RdKafkaFactory> {
    pub fn new(config: &KafkaConfig) -> Self {
        Self::with_factory(
            RdKafkaFactory::new(config),
            config.kafka_enabled,
            &config.kafka_client_id,
            config.kafka_flush_timeout.0,
        )
    }
}

impl<F: BrokerFactory> KafkaRegistry<F> {
    pub fn with_factory(
        factory: F,
        enabled: bool,
        client_id: &str,
        flush_timeout: Duration,
    ) -> Self {
        info!("kafka registry initialized (enabled={})", enabled);

        Self {
            factory,
            enabled,
            client_id: client_id.to_owned(),
            flush_timeout,
            closed: AtomicBool::new(false),
            producers: RwLock::new(BTreeMap::new()),
            consumers: Mutex::new(Vec::new()),
        }
    }

    /// Create the named producers that don't exist yet and return the names
    /// of all registered producers. A disabled registry returns no names.
    ///
    /// If one producer can't be created, those created by this call are
    /// dropped again before the error is returned.
    pub fn connect(&self, default_producers: &[String]) -> Result<Vec<String>, ServiceError> {
        if !self.enabled {
            warn!("kafka usage is disabled, skipping connection");
            record_connection(ServiceKind::Kafka, "disabled");
            return Ok(Vec::new());
        }

        let mut producers = self
            .producers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.ensure_open()?;
        let mut created = Vec::new();

        for name in default_producers {
            if producers.contains_key(name) {
                continue;
            }

            match self.build_producer(name) {
                Ok(producer) => {
                    drop(producers.insert(name.to_owned(), Arc::new(producer)));
                    created.push(name);
                    info!("kafka producer '{}' created at startup", name);
                }
                Err(err) => {
                    for name in created {
                        drop(producers.remove(name));
                    }
                    record_connection(ServiceKind::Kafka, "failed");
                    return Err(err);
                }
            }
        }

        record_connection(ServiceKind::Kafka, "connected");
        info!("kafka registry connected with {} producers", producers.len());

        Ok(producers.keys().cloned().collect())
    }

    /// Return the producer registered under `name`. Producers are never created here.
    pub fn get_producer(&self, name: &str) -> Result<Arc<F::Producer>, ServiceError> {
        if !self.enabled {
            return Err(ServiceError::Disabled(ServiceKind::Kafka));
        }

        self.producers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::NotInitialized {
                service: ServiceKind::Kafka,
                resource: format!("producer '{}'", name),
            })
    }

    /// Register a producer under `name` unless one already exists, and return it.
    pub fn create_producer(&self, name: &str) -> Result<Arc<F::Producer>, ServiceError> {
        if !self.enabled {
            return Err(ServiceError::Disabled(ServiceKind::Kafka));
        }

        let mut producers = self
            .producers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.ensure_open()?;
        if let Some(producer) = producers.get(name) {
            return Ok(producer.clone());
        }

        let producer = Arc::new(self.build_producer(name)?);
        drop(producers.insert(name.to_owned(), producer.clone()));
        info!("kafka producer '{}' created", name);

        Ok(producer)
    }

    /// Create a consumer with manual offset commits, subscribed to `topics`.
    /// Every call creates a new consumer, even for a known group and topics.
    pub fn create_consumer(
        &self,
        group_id: &str,
        topics: &[&str],
    ) -> Result<Arc<F::Consumer>, ServiceError> {
        if !self.enabled {
            return Err(ServiceError::Disabled(ServiceKind::Kafka));
        }
        self.ensure_open()?;

        let consumer = self
            .factory
            .create_consumer(group_id, topics)
            .map(Arc::new)
            .map_err(|error| {
                error!(
                    "failed to create kafka consumer for group '{}': {:#}",
                    group_id, error
                );
                ServiceError::Connection {
                    service: ServiceKind::Kafka,
                    error,
                }
            })?;

        {
            let mut consumers = self.consumers.lock().unwrap_or_else(PoisonError::into_inner);
            // Shut down while this one was being created
            self.ensure_open()?;
            consumers.push(consumer.clone());
        }
        info!(
            "kafka consumer created for group '{}' subscribing to {:?}",
            group_id, topics
        );

        Ok(consumer)
    }

    pub fn producer_names(&self) -> Vec<String> {
        self.producers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn consumer_count(&self) -> usize {
        self.consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Close the registry, then flush every producer and close every consumer
    /// and forget them all.
    ///
    /// Each flush blocks for up to the configured timeout. A failing producer
    /// or consumer does not stop the others from being processed, failures
    /// are logged and returned. Calling it again finds nothing left to do.
    pub fn shutdown(&self) -> Vec<ServiceError> {
        info!("shutting down kafka registry");

        let producers = {
            let mut producers = self
                .producers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            self.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *producers)
        };
        let consumers = std::mem::take(
            &mut *self
                .consumers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let mut failures = Vec::new();

        for (name, producer) in producers {
            match producer.flush_within(self.flush_timeout) {
                Ok(()) => info!("kafka producer '{}' flushed", name),
                Err(error) => {
                    error!("failed to flush kafka producer '{}': {:#}", name, error);
                    failures.push(ServiceError::Teardown {
                        service: ServiceKind::Kafka,
                        error: error.context(format!("flushing producer '{}'", name)),
                    });
                }
            }
        }

        for consumer in consumers {
            match consumer.close() {
                Ok(()) => info!("kafka consumer closed"),
                Err(error) => {
                    error!("failed to close kafka consumer: {:#}", error);
                    failures.push(ServiceError::Teardown {
                        service: ServiceKind::Kafka,
                        error: error.context("closing consumer"),
                    });
                }
            }
        }

        info!("kafka registry shutdown complete");
        failures
    }

    fn ensure_open(&self) -> Result<(), ServiceError> {
        if self.closed.load(Ordering::SeqCst) {
            warn!("kafka registry is shut down, refusing new clients");
            return Err(ServiceError::Closed(ServiceKind::Kafka));
        }

        Ok(())
    }

    fn build_producer(&self, name: &str) -> Result<F::Producer, ServiceError> {
        let client_id = format!("{}-{}", self.client_id, name);

        self.factory.create_producer(&client_id).map_err(|error| {
            error!("failed to create kafka producer '{}': {:#}", name, error);
            ServiceError::Connection {
                service: ServiceKind::Kafka,
                error,
            }
        })
    }
}
