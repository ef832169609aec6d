//! Benchmark binary whose extra benchmarks fail on purpose.
//!
//! Next to the stream benchmarks it registers one that panics in its
//! workload, one whose setup fails and one that aborts the process. Runs
//! against it show that a failing fork costs that fork and nothing more.

use streambench::{BenchmarkDef, Hooks, Registry, SetupError, register_stream_benchmarks};

const FAULTS_GROUP: &str = "faults";

fn main() -> anyhow::Result<()> {
    let mut registry = Registry::new();
    register_stream_benchmarks(&mut registry)?;

    registry.register(
        BenchmarkDef::new(
            "panics",
            Hooks::new(|| Ok(()), |_| -> u64 { panic!("workload exploded") }),
        )
        .in_group(FAULTS_GROUP),
    )?;
    registry.register(
        BenchmarkDef::new(
            "setup_fails",
            Hooks::new(|| Ok(0_u64), |n| *n).with_setup(|_| Err(SetupError::new("input missing"))),
        )
        .in_group(FAULTS_GROUP),
    )?;
    registry.register(
        BenchmarkDef::new(
            "aborts",
            Hooks::new(|| Ok(()), |_| -> u64 { std::process::abort() }),
        )
        .in_group(FAULTS_GROUP),
    )?;

    streambench::run(registry)
}
