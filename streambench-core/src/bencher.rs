//! Bencher - The Invocation Driver
//!
//! Drives one trial through its phases:
//!
//! ```text
//! Warmup --(W iterations)--> Measure --(I iterations)--> Done
//! ```
//!
//! Warmup iterations are timed and logged but never recorded. Each
//! measurement iteration produces one `Sample` in throughput and
//! average-time modes, or one `Sample` per invocation in sample-time mode.
//!
//! With more than one thread, every pool thread runs the same iteration
//! loop with its own `Blackhole`, and the per-thread rates are summed.

use crate::blackhole::Blackhole;
use crate::measure::Timer;
use crate::pool::WorkerPool;
use crate::registry::Trial;
use crate::worker::shutdown_requested;
use std::fmt;
use std::time::{Duration, Instant};
use streambench_ipc::{BenchmarkConfig, IterationLimit, Mode, Sample};
use tracing::{debug, warn};

/// Phase of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Running iterations whose results are discarded
    Warmup,
    /// Recording samples
    Measure,
    /// All iterations finished (or the trial was cut short)
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Warmup => "warmup",
            Phase::Measure => "measurement",
            Phase::Done => "completion",
        })
    }
}

/// Receives samples as the trial records them
pub trait SampleSink {
    /// Called once when warmup ends, before the first sample
    fn warmup_complete(&mut self, _summary: &WarmupSummary) {}

    /// Called for every recorded sample, in order
    fn record(&mut self, sample: Sample);
}

impl SampleSink for Vec<Sample> {
    fn record(&mut self, sample: Sample) {
        self.push(sample);
    }
}

/// What warmup did (informational only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupSummary {
    /// Warmup iterations performed
    pub iterations: u32,
    /// Invocations performed during warmup
    pub invocations: u64,
    /// Total warmup wall-clock time
    pub duration_nanos: u64,
}

/// Result of one trial's warmup and measurement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialOutcome {
    /// Warmup summary
    pub warmup: WarmupSummary,
    /// Measurement iterations executed (a cut-short iteration counts)
    pub measured_iterations: u32,
    /// Invocations performed during measurement
    pub invocations: u64,
    /// Samples handed to the sink
    pub samples_recorded: u64,
    /// Whether the timeout or a shutdown request ended the trial early
    pub truncated: bool,
    /// Values consumed by the blackholes during measurement
    pub consumed: u64,
}

/// Cooperative stop condition checked before every invocation
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    fn after(timeout_ns: u64) -> Self {
        Self {
            at: (timeout_ns > 0).then(|| Instant::now() + Duration::from_nanos(timeout_ns)),
        }
    }

    #[inline]
    fn reached(&self) -> bool {
        shutdown_requested() || self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// One thread's share of an iteration
#[derive(Debug, Default)]
struct ThreadTally {
    operations: u64,
    duration_nanos: u64,
    invocation_samples: Vec<Sample>,
    sink: Blackhole,
    stopped: bool,
}

/// An iteration's combined result across threads
#[derive(Debug, Default)]
struct IterationTally {
    operations: u64,
    duration_nanos: u64,
    invocation_samples: Vec<Sample>,
    consumed: u64,
    stopped: bool,
}

/// Drives a trial through warmup and measurement
pub struct Bencher<'a> {
    config: &'a BenchmarkConfig,
    pool: Option<&'a WorkerPool>,
    phase: Phase,
}

impl<'a> Bencher<'a> {
    /// Create a driver; `pool` is used when the config asks for more than one thread
    pub fn new(config: &'a BenchmarkConfig, pool: Option<&'a WorkerPool>) -> Self {
        Self {
            config,
            pool,
            phase: Phase::Warmup,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run warmup then measurement, streaming samples into `sink`
    pub fn run(&mut self, trial: &dyn Trial, sink: &mut dyn SampleSink) -> TrialOutcome {
        let deadline = Deadline::after(self.config.timeout_ns);
        let mut outcome = TrialOutcome::default();

        self.phase = Phase::Warmup;
        let warmup_timer = Timer::start();
        for iteration in 1..=self.config.warmup_iterations {
            let tally = self.iterate(trial, self.config.warmup_limit, false, deadline);
            outcome.warmup.iterations = iteration;
            outcome.warmup.invocations += tally.operations;
            debug!(
                iteration,
                operations = tally.operations,
                duration_ns = tally.duration_nanos,
                "warmup iteration"
            );
            if tally.stopped {
                outcome.truncated = true;
                break;
            }
        }
        outcome.warmup.duration_nanos = warmup_timer.stop();
        sink.warmup_complete(&outcome.warmup);

        if !outcome.truncated {
            self.phase = Phase::Measure;
            let per_invocation = self.config.mode == Mode::SampleTime;
            for iteration in 1..=self.config.measurement_iterations {
                let tally =
                    self.iterate(trial, self.config.measurement_limit, per_invocation, deadline);
                outcome.invocations += tally.operations;
                outcome.consumed += tally.consumed;

                if tally.operations > 0 {
                    outcome.measured_iterations = iteration;
                    if per_invocation {
                        outcome.samples_recorded += tally.invocation_samples.len() as u64;
                        for sample in tally.invocation_samples {
                            sink.record(sample);
                        }
                    } else {
                        outcome.samples_recorded += 1;
                        sink.record(Sample::new(tally.duration_nanos, tally.operations));
                    }
                }
                debug!(
                    iteration,
                    operations = tally.operations,
                    duration_ns = tally.duration_nanos,
                    "measurement iteration"
                );
                if tally.stopped {
                    outcome.truncated = true;
                    break;
                }
            }
        }

        if outcome.truncated {
            warn!(
                measured_iterations = outcome.measured_iterations,
                requested = self.config.measurement_iterations,
                "trial stopped early by timeout or shutdown request"
            );
        }
        self.phase = Phase::Done;
        outcome
    }

    fn iterate(
        &self,
        trial: &dyn Trial,
        limit: IterationLimit,
        per_invocation: bool,
        deadline: Deadline,
    ) -> IterationTally {
        match self.pool {
            Some(pool) if self.config.threads > 1 => {
                let threads = pool.concurrency() as u64;
                let cap = per_invocation
                    .then(|| self.config.max_invocation_samples.div_ceil(threads).max(1));
                let tallies =
                    pool.broadcast(|_| run_thread_iteration(trial, limit, cap, deadline));
                combine(tallies)
            }
            _ => {
                let cap = per_invocation.then_some(self.config.max_invocation_samples);
                combine(vec![run_thread_iteration(trial, limit, cap, deadline)])
            }
        }
    }
}

#[inline]
fn limit_reached(limit: IterationLimit, operations: u64, elapsed_nanos: u64) -> bool {
    match limit {
        IterationLimit::Time { nanos } => elapsed_nanos >= nanos,
        IterationLimit::Invocations { count } => operations >= count,
    }
}

/// The per-thread loop: deadline check, invoke, count, limit check.
///
/// `invocation_cap` is set in sample-time mode, where each invocation is
/// timed on its own and the iteration ends once the cap is reached.
fn run_thread_iteration(
    trial: &dyn Trial,
    limit: IterationLimit,
    invocation_cap: Option<u64>,
    deadline: Deadline,
) -> ThreadTally {
    let mut tally = ThreadTally::default();
    let timer = Timer::start();

    loop {
        if deadline.reached() {
            tally.stopped = true;
            break;
        }

        match invocation_cap {
            Some(cap) => {
                let invocation = Timer::start();
                trial.invoke(&mut tally.sink);
                tally.invocation_samples.push(Sample::new(invocation.stop(), 1));
                tally.operations += 1;
                if tally.operations >= cap {
                    break;
                }
            }
            None => {
                trial.invoke(&mut tally.sink);
                tally.operations += 1;
            }
        }

        if limit_reached(limit, tally.operations, timer.elapsed_nanos()) {
            break;
        }
    }

    tally.duration_nanos = timer.stop();
    tally
}

/// Merge per-thread tallies into one iteration result.
///
/// Throughput adds up across threads, so the combined duration is chosen
/// such that `operations / duration` equals the sum of per-thread rates.
fn combine(tallies: Vec<ThreadTally>) -> IterationTally {
    let mut combined = IterationTally::default();
    let mut rate_sum = 0.0;
    let mut longest = 0;

    for tally in tallies {
        combined.operations += tally.operations;
        combined.consumed += tally.sink.consumed();
        combined.stopped |= tally.stopped;
        longest = longest.max(tally.duration_nanos);
        if tally.operations > 0 && tally.duration_nanos > 0 {
            rate_sum += tally.operations as f64 / tally.duration_nanos as f64;
        }
        combined.invocation_samples.extend(tally.invocation_samples);
    }

    combined.duration_nanos = if rate_sum > 0.0 {
        (combined.operations as f64 / rate_sum).round() as u64
    } else {
        longest
    };
    combined
}
