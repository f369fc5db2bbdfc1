//! Completion registry: the success/failure callbacks of the running chain.
//!
//! Callbacks fire at most once and are cleared as they fire. The outcome of
//! the last settled chain is kept, so a registration that arrives after the
//! chain settled still receives it; starting a new chain clears it.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use thiserror::Error;
use tracing::warn;

use crate::error::LoadError;

pub type SuccessCallback = Box<dyn FnOnce(&[String]) + Send + 'static>;
pub type FailureCallback = Box<dyn FnOnce(&LoadFailure) + Send + 'static>;

/// Why a chain was aborted: the resource that failed and the cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("loading {name} failed: {error}")]
pub struct LoadFailure {
    pub name: String,
    #[source]
    pub error: LoadError,
}

impl LoadFailure {
    pub fn new(name: impl Into<String>, error: LoadError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    /// Failure reported when the loader is gone before the chain settled.
    pub fn closed() -> Self {
        Self::new(String::new(), LoadError::Closed)
    }
}

/// Who registered a callback. Internal registrations never show up in what
/// the external caller observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Api,
    Internal,
}

#[derive(Default)]
pub struct Callbacks {
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

impl Callbacks {
    pub fn new(
        on_success: Option<SuccessCallback>,
        on_failure: Option<FailureCallback>,
    ) -> Self {
        Self {
            on_success,
            on_failure,
        }
    }

    pub fn on_success<S>(callback: S) -> Self
    where
        S: FnOnce(&[String]) + Send + 'static,
    {
        Self::new(Some(Box::new(callback)), None)
    }

    pub fn on_failure<F>(callback: F) -> Self
    where
        F: FnOnce(&LoadFailure) + Send + 'static,
    {
        Self::new(None, Some(Box::new(callback)))
    }

    pub fn both<S, F>(on_success: S, on_failure: F) -> Self
    where
        S: FnOnce(&[String]) + Send + 'static,
        F: FnOnce(&LoadFailure) + Send + 'static,
    {
        Self::new(Some(Box::new(on_success)), Some(Box::new(on_failure)))
    }

    fn fire(self, outcome: &Outcome) {
        let result = match outcome {
            Outcome::Loaded(names) => self
                .on_success
                .map(|cb| catch_unwind(AssertUnwindSafe(|| cb(names)))),
            Outcome::Failed(failure) => self
                .on_failure
                .map(|cb| catch_unwind(AssertUnwindSafe(|| cb(failure)))),
        };
        if let Some(Err(_)) = result {
            warn!("load chain callback panicked");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every resource touched by the chain, in request order.
    Loaded(Vec<String>),
    Failed(LoadFailure),
}

/// An outcome paired with the callbacks it must be delivered to.
#[derive(Debug)]
pub struct Settlement {
    outcome: Outcome,
    callbacks: Vec<Callbacks>,
}

impl Settlement {
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn fire(self) {
        for callbacks in self.callbacks {
            callbacks.fire(&self.outcome);
        }
    }
}

#[derive(Debug, Default)]
pub struct CompletionRegistry {
    api: Vec<Callbacks>,
    internal: Vec<Callbacks>,
    settled: Option<Outcome>,
}

impl CompletionRegistry {
    /// Registers for the running chain, or returns an immediate settlement
    /// when the last chain already settled.
    pub fn register(
        &mut self,
        channel: Channel,
        callbacks: Callbacks,
    ) -> Option<Settlement> {
        if let Some(outcome) = &self.settled {
            return Some(Settlement {
                outcome: outcome.clone(),
                callbacks: vec![callbacks],
            });
        }
        match channel {
            Channel::Api => self.api.push(callbacks),
            Channel::Internal => self.internal.push(callbacks),
        }
        None
    }

    pub fn resolve(&mut self, names: Vec<String>) -> Settlement {
        self.settle(Outcome::Loaded(names))
    }

    pub fn reject(&mut self, failure: LoadFailure) -> Settlement {
        self.settle(Outcome::Failed(failure))
    }

    /// Forgets the last outcome; called when a new chain starts.
    pub fn clear_settled(&mut self) {
        self.settled = None;
    }

    pub fn settled(&self) -> Option<&Outcome> {
        self.settled.as_ref()
    }

    pub fn registered(&self) -> usize {
        self.api.len() + self.internal.len()
    }

    fn settle(&mut self, outcome: Outcome) -> Settlement {
        let mut callbacks = std::mem::take(&mut self.internal);
        callbacks.append(&mut self.api);
        self.settled = Some(outcome.clone());
        Settlement { outcome, callbacks }
    }
}
