//! Benchmark Registry
//!
//! Benchmarks are registered explicitly: each definition pairs an id with
//! the hooks that build, prepare, invoke and reset its state. The registry
//! is handed to both the supervisor (for planning) and the fork worker (for
//! execution), so the two always agree on what exists.

use crate::DEFAULT_GROUP;
use crate::blackhole::Blackhole;
use crate::pool::PoolError;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use thiserror::Error;

/// Setup could not prepare the benchmark state
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SetupError {
    message: String,
}

impl SetupError {
    /// Create a setup error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<PoolError> for SetupError {
    fn from(err: PoolError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors raised while building a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two definitions share an id
    #[error("benchmark '{0}' is already registered")]
    Duplicate(String),

    /// Id is empty or contains whitespace
    #[error("invalid benchmark id '{0}'")]
    InvalidId(String),
}

/// One trial's worth of benchmark state.
///
/// `setup` and `teardown` get exclusive access; `invoke` only gets a shared
/// reference because it may run on several threads at once.
pub trait Trial: Send + Sync {
    /// Prepare state before warmup
    fn setup(&mut self) -> Result<(), SetupError>;

    /// Run the workload once and hand its result to `sink`
    fn invoke(&self, sink: &mut Blackhole);

    /// Reset state after measurement
    fn teardown(&mut self);
}

/// Creates fresh trial state
pub trait TrialFactory: Send + Sync {
    /// Build the state for a new trial
    fn new_trial(&self) -> Result<Box<dyn Trial>, SetupError>;
}

/// Function hooks describing a benchmark over state `S` returning `R`
pub struct Hooks<S, R> {
    init: fn() -> Result<S, SetupError>,
    setup: fn(&mut S) -> Result<(), SetupError>,
    invoke: fn(&S) -> R,
    teardown: fn(&mut S),
}

impl<S, R> Hooks<S, R> {
    /// Hooks with a state constructor and workload; setup and teardown are no-ops
    pub fn new(init: fn() -> Result<S, SetupError>, invoke: fn(&S) -> R) -> Self {
        Self {
            init,
            setup: |_| Ok(()),
            invoke,
            teardown: |_| {},
        }
    }

    /// Run `setup` once per trial before warmup
    pub fn with_setup(mut self, setup: fn(&mut S) -> Result<(), SetupError>) -> Self {
        self.setup = setup;
        self
    }

    /// Run `teardown` once per trial after measurement
    pub fn with_teardown(mut self, teardown: fn(&mut S)) -> Self {
        self.teardown = teardown;
        self
    }
}

struct StateTrial<S, R> {
    state: S,
    setup: fn(&mut S) -> Result<(), SetupError>,
    invoke: fn(&S) -> R,
    teardown: fn(&mut S),
}

impl<S, R> Trial for StateTrial<S, R>
where
    S: Send + Sync,
{
    fn setup(&mut self) -> Result<(), SetupError> {
        (self.setup)(&mut self.state)
    }

    #[inline]
    fn invoke(&self, sink: &mut Blackhole) {
        sink.consume((self.invoke)(&self.state));
    }

    fn teardown(&mut self) {
        (self.teardown)(&mut self.state)
    }
}

impl<S, R> TrialFactory for Hooks<S, R>
where
    S: Send + Sync + 'static,
    R: 'static,
{
    fn new_trial(&self) -> Result<Box<dyn Trial>, SetupError> {
        let state = (self.init)()?;
        Ok(Box::new(StateTrial {
            state,
            setup: self.setup,
            invoke: self.invoke,
            teardown: self.teardown,
        }))
    }
}

/// A registered benchmark
#[derive(Clone)]
pub struct BenchmarkDef {
    id: String,
    group: String,
    factory: Arc<dyn TrialFactory>,
}

impl std::fmt::Debug for BenchmarkDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkDef")
            .field("id", &self.id)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl BenchmarkDef {
    /// Define a benchmark from any trial factory
    pub fn new(id: impl Into<String>, factory: impl TrialFactory + 'static) -> Self {
        Self {
            id: id.into(),
            group: DEFAULT_GROUP.to_string(),
            factory: Arc::new(factory),
        }
    }

    /// Place the benchmark in a group
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Unique identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Group name
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Build the state for a new trial
    pub fn new_trial(&self) -> Result<Box<dyn Trial>, SetupError> {
        self.factory.new_trial()
    }
}

/// All benchmarks known to this binary, ordered by id
#[derive(Debug, Clone, Default)]
pub struct Registry {
    benchmarks: BTreeMap<String, BenchmarkDef>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a benchmark, rejecting duplicate or malformed ids
    pub fn register(&mut self, def: BenchmarkDef) -> Result<(), RegistryError> {
        if def.id.is_empty() || def.id.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidId(def.id));
        }
        match self.benchmarks.entry(def.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(def.id)),
            Entry::Vacant(slot) => {
                slot.insert(def);
                Ok(())
            }
        }
    }

    /// Look up a benchmark by id
    pub fn get(&self, id: &str) -> Option<&BenchmarkDef> {
        self.benchmarks.get(id)
    }

    /// Iterate over benchmarks in id order
    pub fn iter(&self) -> impl Iterator<Item = &BenchmarkDef> {
        self.benchmarks.values()
    }

    /// Number of registered benchmarks
    pub fn len(&self) -> usize {
        self.benchmarks.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }
}
