//! Stream Workload
//!
//! Keep the even values of `1..=INPUT_LEN` and triple them, four ways:
//!
//! | Id | Pipeline |
//! |----|----------|
//! | `filter_map_sequential` | one fused pass, single thread |
//! | `filter_map_parallel` | one fused pass per partition on the state's pool |
//! | `filter_then_map_sequential` | filter into an intermediate vector, then map |
//! | `filter_then_map_parallel` | both passes partitioned on the pool |
//!
//! The parallel variants split the input into contiguous partitions and
//! concatenate partition results in order, so all four return the same
//! vector. Their pool has one thread per available CPU unless
//! `STREAMBENCH_POOL_THREADS` names a count; the variable is inherited by
//! forked workers.

use rand::Rng;
use streambench_core::{BenchmarkDef, Hooks, Registry, RegistryError, SetupError, WorkerPool};

/// Length of the benchmark input
pub const INPUT_LEN: usize = 1_000_000;

/// Group the stream benchmarks are registered under
pub const GROUP: &str = "filter_map";

/// Environment variable fixing the parallel variants' pool size
pub const POOL_THREADS_ENV: &str = "STREAMBENCH_POOL_THREADS";

#[inline]
fn is_even(x: &i64) -> bool {
    x % 2 == 0
}

#[inline]
fn triple(x: i64) -> i64 {
    x * 3
}

/// State owned by one trial
#[derive(Debug)]
pub struct StreamState {
    /// Fixed input, shared by every invocation
    pub input: Vec<i64>,
    /// Pool for the parallel variants
    pub pool: WorkerPool,
    /// Scratch value re-randomized by setup and cleared by teardown
    pub sum: i64,
}

/// Pool size requested through [`POOL_THREADS_ENV`]; `None` when unset
fn requested_pool_threads(value: Option<&str>) -> Result<Option<usize>, SetupError> {
    let Some(value) = value else {
        return Ok(None);
    };
    value.trim().parse().map(Some).map_err(|_| {
        SetupError::new(format!(
            "{POOL_THREADS_ENV}={value:?} is not a thread count"
        ))
    })
}

/// Pool for the parallel variants, sized from the environment or the machine
pub fn stream_pool() -> Result<WorkerPool, SetupError> {
    let value = std::env::var(POOL_THREADS_ENV).ok();
    match requested_pool_threads(value.as_deref())? {
        Some(threads) => Ok(WorkerPool::new(threads)?),
        None => Ok(WorkerPool::with_available_parallelism()?),
    }
}

impl StreamState {
    /// State over `1..=INPUT_LEN` with the pool from [`stream_pool`]
    pub fn new() -> Result<Self, SetupError> {
        Self::with_input((1..=INPUT_LEN as i64).collect())
    }

    /// State over an arbitrary input
    pub fn with_input(input: Vec<i64>) -> Result<Self, SetupError> {
        Ok(Self::with_pool(input, stream_pool()?))
    }

    /// State over an arbitrary input and an explicitly sized pool
    pub fn with_pool(input: Vec<i64>, pool: WorkerPool) -> Self {
        Self {
            input,
            pool,
            sum: 0,
        }
    }

    /// Per-trial setup
    pub fn setup(&mut self) -> Result<(), SetupError> {
        self.sum = rand::thread_rng().r#gen();
        Ok(())
    }

    /// Per-trial teardown
    pub fn teardown(&mut self) {
        self.sum = 0;
    }
}

/// Fused filter and map on the calling thread
pub fn filter_map_sequential(input: &[i64]) -> Vec<i64> {
    input.iter().copied().filter(is_even).map(triple).collect()
}

/// Fused filter and map, one partition per pool thread
pub fn filter_map_parallel(pool: &WorkerPool, input: &[i64]) -> Vec<i64> {
    pool.map_partitions(input, filter_map_sequential).concat()
}

/// Filter into an intermediate vector, then map it
pub fn filter_then_map_sequential(input: &[i64]) -> Vec<i64> {
    let evens: Vec<i64> = input.iter().copied().filter(is_even).collect();
    evens.into_iter().map(triple).collect()
}

/// Partitioned filter, then partitioned map over the filtered values
pub fn filter_then_map_parallel(pool: &WorkerPool, input: &[i64]) -> Vec<i64> {
    let evens = pool
        .map_partitions(input, |part| {
            part.iter().copied().filter(is_even).collect::<Vec<_>>()
        })
        .concat();
    pool.map_partitions(&evens, |part| {
        part.iter().copied().map(triple).collect::<Vec<_>>()
    })
    .concat()
}

fn stream_benchmark(id: &str, invoke: fn(&StreamState) -> Vec<i64>) -> BenchmarkDef {
    let hooks = Hooks::new(StreamState::new, invoke)
        .with_setup(StreamState::setup)
        .with_teardown(StreamState::teardown);
    BenchmarkDef::new(id, hooks).in_group(GROUP)
}

/// Register the four stream benchmarks
pub fn register_stream_benchmarks(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(stream_benchmark("filter_map_sequential", |s| {
        filter_map_sequential(&s.input)
    }))?;
    registry.register(stream_benchmark("filter_map_parallel", |s| {
        filter_map_parallel(&s.pool, &s.input)
    }))?;
    registry.register(stream_benchmark("filter_then_map_sequential", |s| {
        filter_then_map_sequential(&s.input)
    }))?;
    registry.register(stream_benchmark("filter_then_map_parallel", |s| {
        filter_then_map_parallel(&s.pool, &s.input)
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_input() -> Vec<i64> {
        (1..=10).collect()
    }

    #[test]
    fn test_small_input_all_variants() {
        let pool = WorkerPool::new(3).unwrap();
        let input = small_input();
        let expected = vec![6, 12, 18, 24, 30];

        assert_eq!(filter_map_sequential(&input), expected);
        assert_eq!(filter_then_map_sequential(&input), expected);
        assert_eq!(filter_map_parallel(&pool, &input), expected);
        assert_eq!(filter_then_map_parallel(&pool, &input), expected);
    }

    #[test]
    fn test_every_output_is_a_tripled_even_input() {
        let input: Vec<i64> = (1..=1_001).collect();
        let out = filter_map_sequential(&input);
        assert_eq!(out.len(), 500);
        for value in &out {
            assert_eq!(value % 3, 0);
            let source = value / 3;
            assert_eq!(source % 2, 0);
            assert!(input.contains(&source));
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pool = WorkerPool::new(4).unwrap();
        let input: Vec<i64> = (1..=10_007).collect();
        let expected = filter_map_sequential(&input);
        assert_eq!(filter_map_parallel(&pool, &input), expected);
        assert_eq!(filter_then_map_parallel(&pool, &input), expected);
    }

    #[test]
    fn test_empty_input() {
        let pool = WorkerPool::new(2).unwrap();
        assert!(filter_map_sequential(&[]).is_empty());
        assert!(filter_then_map_parallel(&pool, &[]).is_empty());
    }

    #[test]
    fn test_setup_teardown_idempotent() {
        let mut state = StreamState::with_pool(small_input(), WorkerPool::new(1).unwrap());
        state.setup().unwrap();
        state.teardown();
        assert_eq!(state.sum, 0);
        assert_eq!(state.input, small_input());

        state.setup().unwrap();
        state.teardown();
        assert_eq!(state.sum, 0);
        assert_eq!(state.input, small_input());
    }

    #[test]
    fn test_pool_threads_from_setting() {
        assert_eq!(requested_pool_threads(None).unwrap(), None);
        assert_eq!(requested_pool_threads(Some("3")).unwrap(), Some(3));
        assert_eq!(requested_pool_threads(Some(" 8 ")).unwrap(), Some(8));

        let err = requested_pool_threads(Some("many")).unwrap_err();
        assert!(err.message().contains(POOL_THREADS_ENV));
    }

    #[test]
    fn test_state_uses_given_pool() {
        let state = StreamState::with_pool(small_input(), WorkerPool::new(2).unwrap());
        assert_eq!(state.pool.concurrency(), 2);
        assert_eq!(
            filter_then_map_parallel(&state.pool, &state.input),
            vec![6, 12, 18, 24, 30]
        );
    }

    #[test]
    fn test_full_input_size() {
        let state = StreamState::new().unwrap();
        assert_eq!(state.input.len(), INPUT_LEN);
        assert_eq!(filter_map_sequential(&state.input).len(), INPUT_LEN / 2);
    }

    #[test]
    fn test_register_four_benchmarks() {
        let mut registry = Registry::new();
        register_stream_benchmarks(&mut registry).unwrap();
        let ids: Vec<&str> = registry.iter().map(|b| b.id()).collect();
        assert_eq!(
            ids,
            vec![
                "filter_map_parallel",
                "filter_map_sequential",
                "filter_then_map_parallel",
                "filter_then_map_sequential",
            ]
        );
        assert!(registry.iter().all(|b| b.group() == GROUP));

        // Registering twice is rejected
        assert!(matches!(
            register_stream_benchmarks(&mut registry),
            Err(RegistryError::Duplicate(_))
        ));
    }
}
