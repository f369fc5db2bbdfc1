//! Load orchestration state machine.
//!
//! The orchestrator owns every piece of per-loader state (queue, placement
//! tree, pending counter, registry, session cache, completion registry) and
//! changes it only through its transition methods. Each transition returns
//! the [`Effect`]s the caller must carry out: fetches to start, placements
//! to apply, settlements to fire. It never performs I/O itself, so it runs
//! the same under the async driver and under a test stepping it by hand.

pub mod batch;
pub mod completion;
pub mod tree;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use lazyload_config::LoaderConfig;
use lazyload_model::{ResourceDescriptor, ResourceKey};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use self::batch::{BatchQueue, BatchRequest};
use self::completion::{
    Callbacks, Channel, CompletionRegistry, LoadFailure, Settlement,
};
use self::tree::PlacementTree;
use crate::declarations::Declarations;
use crate::error::{LoadError, Result};
use crate::fetch::FetchRequest;
use crate::registry::Registry;
use crate::scanner::scan;
use crate::session_cache::SessionCache;

/// Configuration shared between a loader handle and its orchestrator.
pub type SharedConfig = Arc<RwLock<LoaderConfig>>;

/// Per-resource lifecycle events, emitted only with `debug.enabled`.
macro_rules! lifecycle {
    ($self:ident, $($arg:tt)+) => {
        if $self.config.read().debug.enabled {
            debug!($($arg)+);
        }
    };
}

/// Work the caller must carry out after a transition.
#[derive(Debug)]
pub enum Effect {
    Fetch(FetchJob),
    /// Descriptors in placement order, dependencies first.
    Place(Vec<ResourceDescriptor>),
    Settle(Settlement),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub key: ResourceKey,
    pub name: String,
    pub request: FetchRequest,
    pub cacheable: bool,
    /// Reset generation the fetch belongs to; completions from an older
    /// generation are dropped.
    pub generation: u64,
}

/// Whether a newly queued batch is drained right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// `require`: always drain.
    Always,
    /// `and`: drain only if nothing is pending and the tree is empty;
    /// otherwise the running drain picks it up.
    IfIdle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub pending: usize,
    pub queued: usize,
    pub tree_len: usize,
    pub touched: usize,
    pub in_flight: usize,
    pub open_pipes: usize,
    pub generation: u64,
    pub chains_completed: u64,
    pub chains_failed: u64,
    pub active: bool,
}

#[derive(Debug)]
pub struct Orchestrator {
    config: SharedConfig,
    registry: Registry,
    session: SessionCache,
    queue: BatchQueue,
    tree: PlacementTree,
    /// Dispatched fetches and the depth their result belongs at.
    in_flight: HashMap<ResourceKey, usize>,
    /// Session cache hits counted but not yet loaded, with their depth.
    pending_hits: HashMap<ResourceKey, usize>,
    /// Dependency edges discovered in this chain, declaring key first.
    children: HashMap<ResourceKey, Vec<ResourceKey>>,
    pending: usize,
    touched: Vec<String>,
    touched_keys: HashSet<ResourceKey>,
    completion: CompletionRegistry,
    generation: u64,
    active: bool,
    chains_completed: u64,
    chains_failed: u64,
    effects: Vec<Effect>,
}

impl Orchestrator {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            session: SessionCache::new(),
            queue: BatchQueue::default(),
            tree: PlacementTree::default(),
            in_flight: HashMap::new(),
            pending_hits: HashMap::new(),
            children: HashMap::new(),
            pending: 0,
            touched: Vec::new(),
            touched_keys: HashSet::new(),
            completion: CompletionRegistry::default(),
            generation: 0,
            active: false,
            chains_completed: 0,
            chains_failed: 0,
            effects: Vec::new(),
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// No chain is running: nothing queued, pending, or waiting to be placed.
    pub fn is_idle(&self) -> bool {
        !self.active
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            pending: self.pending,
            queued: self.queue.len(),
            tree_len: self.tree.len(),
            touched: self.touched.len(),
            in_flight: self.in_flight.len(),
            open_pipes: 0,
            generation: self.generation,
            chains_completed: self.chains_completed,
            chains_failed: self.chains_failed,
            active: self.active,
        }
    }

    /// Queues a batch and, depending on `mode`, drains it.
    pub fn enqueue(&mut self, batch: BatchRequest, mode: DrainMode) -> Vec<Effect> {
        if !self.active {
            self.active = true;
            self.completion.clear_settled();
        }

        self.queue.push_back(batch);
        let drain = match mode {
            DrainMode::Always => true,
            DrainMode::IfIdle => self.pending == 0 && self.tree.is_empty(),
        };
        if drain {
            self.drain_next();
        }
        self.pump();
        self.take_effects()
    }

    pub fn register(
        &mut self,
        channel: Channel,
        callbacks: Callbacks,
    ) -> Vec<Effect> {
        self.completion
            .register(channel, callbacks)
            .map(|settlement| vec![Effect::Settle(settlement)])
            .unwrap_or_default()
    }

    /// Terminal event for a dispatched fetch.
    pub fn fetched(
        &mut self,
        key: ResourceKey,
        generation: u64,
        outcome: Result<Arc<str>>,
    ) -> Vec<Effect> {
        if generation != self.generation {
            debug!(%key, generation, current = self.generation, "dropping fetch result from an aborted chain");
            return Vec::new();
        }
        let Some(depth) = self.in_flight.remove(&key) else {
            warn!(%key, "dropping fetch result with no matching dispatch");
            return Vec::new();
        };

        match outcome {
            Ok(payload) => {
                lifecycle!(self, %key, bytes = payload.len(), "fetched");
                self.session.put(key.clone(), payload);
                self.loaded(key, depth);
            }
            Err(error) => {
                let name = self
                    .registry
                    .get(&key)
                    .map(|d| d.name)
                    .unwrap_or_else(|| key.to_string());
                self.fail(name, error);
            }
        }

        self.pump();
        self.take_effects()
    }

    fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Pops the front batch and dispatches its names. Cache hits complete
    /// on the spot, which may discover and drain further batches.
    fn drain_next(&mut self) {
        let Some(batch) = self.queue.pop_front() else {
            return;
        };
        let generation = self.generation;

        if !batch.config.is_empty() {
            self.config.write().apply(&batch.config);
        }
        let config = self.config.read().clone();

        let mut hits = Vec::new();
        for name in &batch.names {
            let descriptor =
                match self.registry.translate(name, &batch.properties, &config) {
                    Ok(descriptor) => descriptor,
                    Err(error) => {
                        self.fail(name.clone(), error);
                        return;
                    }
                };
            let key = descriptor.key.clone();
            lifecycle!(self, %key, uri = %descriptor.uri, depth = batch.depth, "translated");
            if let Some(parent) = &batch.properties.parent {
                let edges = self.children.entry(parent.clone()).or_default();
                if !edges.contains(&key) {
                    edges.push(key.clone());
                }
            }

            if self.touched_keys.contains(&key) {
                self.deepen(&key, batch.depth);
                lifecycle!(self, %key, "already requested in this chain");
                continue;
            }
            self.touched_keys.insert(key.clone());
            self.touched.push(descriptor.name.clone());
            self.pending += 1;

            if descriptor.cacheable && self.session.contains(&key) {
                lifecycle!(self, %key, "session cache hit");
                self.pending_hits.insert(key.clone(), batch.depth);
                hits.push(key);
                continue;
            }

            self.in_flight.insert(key.clone(), batch.depth);
            self.effects.push(Effect::Fetch(FetchJob {
                request: FetchRequest {
                    url: descriptor.uri.clone(),
                    timeout: config.timeout(),
                    bypass_cache: !descriptor.cacheable,
                },
                key,
                name: descriptor.name,
                cacheable: descriptor.cacheable,
                generation,
            }));
        }

        for key in hits {
            if self.generation != generation {
                return;
            }
            let depth = self.pending_hits.remove(&key).unwrap_or(batch.depth);
            self.loaded(key, depth);
        }
    }

    /// A resource finished loading: count it, queue it for placement, and
    /// scan it for dependencies once.
    fn loaded(&mut self, key: ResourceKey, depth: usize) {
        self.pending = match self.pending.checked_sub(1) {
            Some(pending) => pending,
            None => {
                warn!(%key, "load completion with nothing pending");
                0
            }
        };
        self.tree.insert(key.clone(), depth);

        let Some(descriptor) = self.registry.get(&key) else {
            return;
        };
        let (parse, directives) = {
            let config = self.config.read();
            (config.parse, config.directives.clone())
        };
        if !parse || !descriptor.wants_scan() {
            return;
        }
        let Some(payload) = self.session.get(&key) else {
            return;
        };

        self.registry.mark_discovered(&key);
        let declarations =
            Declarations::from_directives(&scan(&payload, &directives));
        if !declarations.config.is_empty() {
            lifecycle!(self, %key, "applying declared configuration");
            self.config.write().apply(&declarations.config);
        }
        if declarations.dependencies.is_empty() {
            return;
        }

        lifecycle!(
            self,
            %key,
            dependencies = ?declarations.dependencies,
            "discovered dependencies"
        );
        let batch = BatchRequest::from_names(declarations.dependencies)
            .with_properties(declarations.properties.with_parent(key))
            .at_depth(depth + 1);
        self.queue.push_front(batch);
        self.drain_next();
    }

    /// A repeated request at a deeper level pulls an unplaced resource down
    /// so it still lands before its new dependent. Its own dependencies move
    /// along so they stay below it.
    fn deepen(&mut self, key: &ResourceKey, depth: usize) {
        let mut stack = vec![(key.clone(), depth)];
        let mut seen = HashSet::new();

        while let Some((key, depth)) = stack.pop() {
            if !seen.insert(key.clone()) {
                continue;
            }
            let raised = match self.tree.depth_of(&key) {
                Some(current) if current < depth => {
                    self.tree.insert(key.clone(), depth);
                    true
                }
                Some(_) => false,
                None => match self
                    .in_flight
                    .get_mut(&key)
                    .or_else(|| self.pending_hits.get_mut(&key))
                {
                    Some(current) if *current < depth => {
                        *current = depth;
                        true
                    }
                    _ => false,
                },
            };
            if !raised {
                continue;
            }
            lifecycle!(self, %key, depth, "moved deeper");
            if let Some(children) = self.children.get(&key) {
                stack.extend(children.iter().map(|child| (child.clone(), depth + 1)));
            }
        }
    }

    /// Advances the chain while nothing is pending: flush the tree, then
    /// drain the next batch or settle.
    fn pump(&mut self) {
        while self.active && self.pending == 0 {
            self.flush();
            if self.queue.is_empty() {
                self.resolve();
                break;
            }
            self.drain_next();
        }
    }

    fn flush(&mut self) {
        if self.tree.is_empty() {
            return;
        }

        let order = self.tree.drain_deepest_first();
        let mut placed = Vec::with_capacity(order.len());
        for key in order {
            let Some(mut descriptor) = self.registry.get(&key) else {
                continue;
            };
            descriptor.payload = if descriptor.cacheable {
                self.session.get(&key)
            } else {
                self.session.remove(&key)
            };
            lifecycle!(self, %key, target = %descriptor.target, "placing");
            placed.push(descriptor);
        }
        self.effects.push(Effect::Place(placed));
    }

    fn resolve(&mut self) {
        let names = std::mem::take(&mut self.touched);
        self.touched_keys.clear();
        self.children.clear();
        self.active = false;
        self.chains_completed += 1;
        info!(resources = names.len(), "load chain complete");

        let settlement = self.completion.resolve(names);
        self.effects.push(Effect::Settle(settlement));
    }

    /// Aborts the chain. Fetches still in flight belong to the old
    /// generation and are ignored when they land.
    fn fail(&mut self, name: String, error: LoadError) {
        warn!(resource = %name, %error, "load chain aborted");
        self.generation += 1;
        self.queue.clear();
        self.tree.clear();
        self.in_flight.clear();
        self.pending_hits.clear();
        self.children.clear();
        self.pending = 0;
        self.touched.clear();
        self.touched_keys.clear();
        self.active = false;
        self.chains_failed += 1;

        let settlement = self.completion.reject(LoadFailure::new(name, error));
        self.effects.push(Effect::Settle(settlement));
    }
}
