//! Trial Lifecycle
//!
//! `construct -> setup -> warmup/measure -> teardown`, with every user hook
//! isolated behind `catch_unwind`:
//! - a failing or panicking constructor or setup aborts the trial before any
//!   iteration and skips teardown
//! - a workload panic aborts the trial, but teardown still runs
//! - a teardown panic is logged and otherwise ignored

use crate::bencher::{Bencher, Phase, SampleSink, TrialOutcome};
use crate::pool::{PoolError, WorkerPool};
use crate::registry::{BenchmarkDef, SetupError};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use streambench_ipc::BenchmarkConfig;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a trial produced no outcome
#[derive(Debug, Error)]
pub enum TrialError {
    /// Configuration rejected before anything ran
    #[error("invalid configuration: {0}")]
    Config(String),

    /// State construction or setup failed
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),

    /// Invocation threads could not be created
    #[error("worker pool unavailable: {0}")]
    Pool(#[from] PoolError),

    /// The workload panicked
    #[error("benchmark panicked during {phase}: {message}")]
    Panic {
        /// Phase the panic happened in
        phase: Phase,
        /// Panic payload rendered as text
        message: String,
    },
}

impl TrialError {
    /// Whether this is a configuration-class failure (not a measurement crash)
    pub fn is_setup_failure(&self) -> bool {
        matches!(self, TrialError::Config(_) | TrialError::Setup(_))
    }
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one complete trial of `def` in the current process
pub fn run_trial(
    def: &BenchmarkDef,
    config: &BenchmarkConfig,
    sink: &mut dyn SampleSink,
) -> Result<TrialOutcome, TrialError> {
    config.validate().map_err(TrialError::Config)?;

    let pool = if config.threads > 1 {
        Some(WorkerPool::new(config.threads as usize)?)
    } else {
        None
    };

    let mut trial = match catch_unwind(AssertUnwindSafe(|| def.new_trial())) {
        Ok(result) => result?,
        Err(payload) => {
            return Err(SetupError::new(format!(
                "state construction panicked: {}",
                panic_message(payload.as_ref())
            ))
            .into());
        }
    };

    match catch_unwind(AssertUnwindSafe(|| trial.setup())) {
        Ok(result) => result?,
        Err(payload) => {
            return Err(SetupError::new(format!(
                "setup panicked: {}",
                panic_message(payload.as_ref())
            ))
            .into());
        }
    }
    debug!(bench_id = def.id(), "setup complete");

    let mut bencher = Bencher::new(config, pool.as_ref());
    let measured = catch_unwind(AssertUnwindSafe(|| bencher.run(trial.as_ref(), sink)));

    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| trial.teardown())) {
        warn!(
            bench_id = def.id(),
            "teardown panicked: {}",
            panic_message(payload.as_ref())
        );
    } else {
        debug!(bench_id = def.id(), "teardown complete");
    }

    measured.map_err(|payload| TrialError::Panic {
        phase: bencher.phase(),
        message: panic_message(payload.as_ref()),
    })
}
