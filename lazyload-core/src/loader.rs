//! Async driver and the caller-facing chain API.
//!
//! A [`Loader`] is a cheap handle. All orchestration runs on one driver task
//! that owns the [`Orchestrator`] and applies commands in arrival order, so
//! state transitions never interleave. Fetches run as separate tasks and
//! report back to the driver. Callbacks fire on the driver; a callback that
//! issues another `require` only queues a command.

use std::{fmt, sync::Arc, time::Duration};

use lazyload_config::{ConfigPatch, LoaderConfig, apply_guard_rails};
use lazyload_model::{DescriptorOverrides, ResourceKey};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cache::{DiskResourceCache, PersistentCache};
use crate::error::{LoadError, Result};
use crate::fetch::{PipePool, Transport};
use crate::orchestrator::{
    DrainMode, Effect, FetchJob, LoaderStats, Orchestrator, SharedConfig,
    batch::BatchRequest,
    completion::{Callbacks, Channel, LoadFailure},
};
use crate::sink::{PlacementSink, TracingSink};

enum Command {
    Enqueue {
        batch: BatchRequest,
        mode: DrainMode,
    },
    Register {
        channel: Channel,
        callbacks: Callbacks,
    },
    Fetched {
        key: ResourceKey,
        generation: u64,
        outcome: Result<Arc<str>>,
    },
    Snapshot {
        reply: oneshot::Sender<LoaderStats>,
    },
}

pub struct LoaderBuilder {
    config: LoaderConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn PlacementSink>,
    cache: Option<Arc<dyn PersistentCache>>,
}

impl fmt::Debug for LoaderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderBuilder")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("sink", &self.sink)
            .field("cache", &self.cache)
            .finish()
    }
}

impl LoaderBuilder {
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn PlacementSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Overrides the cache built from `persistent_cache` in the config.
    pub fn persistent_cache(mut self, cache: Arc<dyn PersistentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validates the configuration and spawns the driver on the current
    /// Tokio runtime.
    pub fn build(self) -> Result<Loader> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| LoadError::NoRuntime)?;

        let warnings = apply_guard_rails(&self.config)
            .map_err(|err| LoadError::Config(err.to_string()))?;
        warnings.log();

        let cache = self.cache.or_else(|| {
            self.config.persistent_cache.as_ref().map(|config| {
                Arc::new(DiskResourceCache::from_config(config))
                    as Arc<dyn PersistentCache>
            })
        });

        let pool = Arc::new(PipePool::new(self.config.pipes_max));
        let config: SharedConfig = Arc::new(RwLock::new(self.config));
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = Driver {
            orchestrator: Orchestrator::new(Arc::clone(&config)),
            config: Arc::clone(&config),
            pool: Arc::clone(&pool),
            transport: self.transport,
            sink: self.sink,
            cache,
            tx: tx.downgrade(),
            rx,
        };
        runtime.spawn(driver.run());

        Ok(Loader { tx, config, pool })
    }
}

/// Handle to one loader instance. Clones share the same instance.
#[derive(Clone)]
pub struct Loader {
    tx: mpsc::UnboundedSender<Command>,
    config: SharedConfig,
    pool: Arc<PipePool>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("config", &*self.config.read())
            .field("pool", &self.pool)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl Loader {
    pub fn builder(transport: Arc<dyn Transport>) -> LoaderBuilder {
        LoaderBuilder {
            config: LoaderConfig::default(),
            transport,
            sink: Arc::new(TracingSink),
            cache: None,
        }
    }

    pub fn new(
        config: LoaderConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn PlacementSink>,
    ) -> Result<Self> {
        Self::builder(transport).config(config).sink(sink).build()
    }

    /// Merges `patch` into the configuration and returns the result. An
    /// empty patch returns the current configuration unchanged.
    pub fn configure(&self, patch: &ConfigPatch) -> LoaderConfig {
        if patch.is_empty() {
            return self.config();
        }
        let updated = {
            let mut config = self.config.write();
            config.apply(patch);
            config.clone()
        };
        self.pool.resize(updated.pipes_max);
        updated
    }

    pub fn config(&self) -> LoaderConfig {
        self.config.read().clone()
    }

    /// Starts loading a comma-delimited list of names.
    pub fn require(&self, names: &str) -> LoadChain {
        self.require_with(names, DescriptorOverrides::default(), ConfigPatch::default())
    }

    pub fn require_with(
        &self,
        names: &str,
        properties: DescriptorOverrides,
        config: ConfigPatch,
    ) -> LoadChain {
        let batch = BatchRequest::new(names)
            .with_properties(properties)
            .with_config(config);
        self.send(Command::Enqueue {
            batch,
            mode: DrainMode::Always,
        });
        LoadChain {
            loader: self.clone(),
        }
    }

    /// Counters of the running instance, taken between transitions.
    pub async fn snapshot(&self) -> Result<LoaderStats> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Snapshot { reply }) {
            return Err(LoadError::Closed);
        }
        rx.await.map_err(|_| LoadError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: Command) -> bool {
        if self.tx.send(command).is_err() {
            warn!("loader driver is gone; dropping command");
            return false;
        }
        true
    }
}

/// Chain returned by [`Loader::require`]. Every call queues work on the
/// same loader; callbacks belong to the chain currently running.
#[derive(Debug, Clone)]
pub struct LoadChain {
    loader: Loader,
}

impl LoadChain {
    /// Adds names to the chain. They join the running chain if one is in
    /// flight, otherwise they start one.
    pub fn and(self, names: &str) -> Self {
        self.and_with(names, DescriptorOverrides::default(), ConfigPatch::default())
    }

    pub fn and_with(
        self,
        names: &str,
        properties: DescriptorOverrides,
        config: ConfigPatch,
    ) -> Self {
        let batch = BatchRequest::new(names)
            .with_properties(properties)
            .with_config(config);
        self.loader.send(Command::Enqueue {
            batch,
            mode: DrainMode::IfIdle,
        });
        self
    }

    /// Registers callbacks for the chain's outcome. Exactly one of them
    /// fires, once.
    pub fn then<S, F>(self, on_success: S, on_failure: F) -> Self
    where
        S: FnOnce(&[String]) + Send + 'static,
        F: FnOnce(&LoadFailure) + Send + 'static,
    {
        self.register(Channel::Api, Callbacks::both(on_success, on_failure))
    }

    pub fn on_success<S>(self, on_success: S) -> Self
    where
        S: FnOnce(&[String]) + Send + 'static,
    {
        self.register(Channel::Api, Callbacks::on_success(on_success))
    }

    pub fn on_failure<F>(self, on_failure: F) -> Self
    where
        F: FnOnce(&LoadFailure) + Send + 'static,
    {
        self.register(Channel::Api, Callbacks::on_failure(on_failure))
    }

    /// Waits for the chain to settle.
    pub async fn wait(self) -> std::result::Result<Vec<String>, LoadFailure> {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let on_failure_tx = Arc::clone(&tx);

        let callbacks = Callbacks::both(
            move |names: &[String]| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(Ok(names.to_vec()));
                }
            },
            move |failure: &LoadFailure| {
                if let Some(tx) = on_failure_tx.lock().take() {
                    let _ = tx.send(Err(failure.clone()));
                }
            },
        );
        if !self.loader.send(Command::Register {
            channel: Channel::Internal,
            callbacks,
        }) {
            return Err(LoadFailure::closed());
        }

        rx.await.unwrap_or_else(|_| Err(LoadFailure::closed()))
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    fn register(self, channel: Channel, callbacks: Callbacks) -> Self {
        self.loader.send(Command::Register { channel, callbacks });
        self
    }
}

struct Driver {
    orchestrator: Orchestrator,
    config: SharedConfig,
    pool: Arc<PipePool>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn PlacementSink>,
    cache: Option<Arc<dyn PersistentCache>>,
    tx: mpsc::WeakUnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl Driver {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            let effects = match command {
                Command::Enqueue { batch, mode } => {
                    self.orchestrator.enqueue(batch, mode)
                }
                Command::Register {
                    channel,
                    callbacks,
                } => self.orchestrator.register(channel, callbacks),
                Command::Fetched {
                    key,
                    generation,
                    outcome,
                } => self.orchestrator.fetched(key, generation, outcome),
                Command::Snapshot { reply } => {
                    let mut stats = self.orchestrator.stats();
                    stats.open_pipes = self.pool.open_pipes();
                    let _ = reply.send(stats);
                    continue;
                }
            };
            self.apply(effects);
        }
        debug!("loader driver stopped");
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Fetch(job) => self.spawn_fetch(job),
                Effect::Place(descriptors) => {
                    for descriptor in &descriptors {
                        self.sink.place(descriptor);
                    }
                }
                Effect::Settle(settlement) => settlement.fire(),
            }
        }
    }

    fn spawn_fetch(&self, job: FetchJob) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let (pipes_max, ttl) = {
            let config = self.config.read();
            (
                config.pipes_max,
                config.persistent_cache.as_ref().map(|c| c.ttl()),
            )
        };
        self.pool.resize(pipes_max);

        let pool = Arc::clone(&self.pool);
        let transport = Arc::clone(&self.transport);
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let outcome = fetch_resource(
                &job,
                &pool,
                transport.as_ref(),
                cache.as_deref(),
                ttl,
            )
            .await;
            let _ = tx.send(Command::Fetched {
                key: job.key,
                generation: job.generation,
                outcome,
            });
        });
    }
}

/// Persistent cache first for cacheable resources, then a pipe. A fetched
/// cacheable payload is written back; cache errors only cost a miss.
async fn fetch_resource(
    job: &FetchJob,
    pool: &PipePool,
    transport: &dyn Transport,
    cache: Option<&dyn PersistentCache>,
    ttl: Option<Duration>,
) -> Result<Arc<str>> {
    let cache = cache.filter(|_| job.cacheable);

    if let Some(cache) = cache {
        match cache.get(&job.key).await {
            Ok(Some(stored)) => {
                debug!(key = %job.key, "persistent cache hit");
                return Ok(stored.payload);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(key = %job.key, %err, "persistent cache read failed")
            }
        }
    }

    let payload = pool.fetch(transport, &job.name, &job.request).await?;

    if let Some(cache) = cache {
        let ttl = ttl.unwrap_or_else(|| {
            lazyload_config::PersistentCacheConfig::default().ttl()
        });
        if let Err(err) = cache.put(&job.key, &payload, ttl).await {
            warn!(key = %job.key, %err, "persistent cache write failed");
        }
    }

    Ok(payload)
}
