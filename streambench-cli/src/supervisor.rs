//! Fork Supervisor
//!
//! Every fork of a benchmark is a fresh worker process: the supervisor
//! re-executes the current binary with `--worker`, hands it one `Run`
//! command over a pipe pair and collects the streamed samples. Forks of one
//! benchmark run one after another; `--jobs` lets different benchmarks run
//! side by side.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::env;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use streambench_core::{BenchmarkDef, IPC_FD_ENV};
use streambench_ipc::{
    BenchmarkConfig, FailureKind, FrameReader, FrameWriter, PROTOCOL_VERSION, Sample,
    SampleBatch, SupervisorCommand, WireError, WorkerCapabilities, WorkerMessage,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extra time a fork gets past its trial timeout before it is signalled
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// How long a signalled fork may keep flushing before it is killed
pub const DRAIN_WINDOW: Duration = Duration::from_millis(500);

/// Errors talking to a worker process
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker process could not be started or signalled
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// Framing or transport failure on the pipes
    #[error("IPC error: {0}")]
    IpcError(String),

    /// The worker died or closed its pipe mid-trial
    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    /// The worker sent something the protocol does not allow here
    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError {
        /// What the supervisor was waiting for
        expected: String,
        /// What arrived instead
        got: String,
    },
}

impl From<WireError> for SupervisorError {
    fn from(e: WireError) -> Self {
        SupervisorError::IpcError(e.to_string())
    }
}

/// How a single fork ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForkStatus {
    /// Trial ran to the end (possibly cut short by its own timeout)
    Completed {
        /// Whether the trial timeout stopped measurement early
        truncated: bool,
    },
    /// Setup failed or the benchmark is unknown to the worker
    SetupFailed {
        /// Reason reported by the worker
        message: String,
    },
    /// Workload panicked or the worker died
    Crashed {
        /// Panic message or transport error
        message: String,
    },
    /// Hard deadline passed; the worker was signalled and killed
    TimedOut,
}

/// Everything one fork reported
#[derive(Debug, Clone)]
pub struct ForkOutcome {
    /// Fork index (1-based)
    pub fork: u32,
    /// How the fork ended
    pub status: ForkStatus,
    /// Measurement samples, empty for crashed forks
    pub samples: Vec<Sample>,
    /// Workload invocations over warmup and measurement
    pub invocations: u64,
    /// Measurement iterations that recorded a sample
    pub measured_iterations: u32,
}

impl ForkOutcome {
    fn failed(fork: u32, status: ForkStatus) -> Self {
        Self {
            fork,
            status,
            samples: Vec::new(),
            invocations: 0,
            measured_iterations: 0,
        }
    }
}

/// Result of polling for data
#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

/// Wait for data to be available on a file descriptor with timeout
fn wait_for_data(fd: i32, timeout_ms: i32) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        // Data first: a closing pipe may still hold the final frames
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Create a pipe pair, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // Close-on-exec on both ends; the child clears it for the two it keeps.
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Close a raw file descriptor.
fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Send SIGTERM to a process. Returns `Err` if the signal could not be delivered.
fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Runs in the forked child before exec: leaves the command pipe's read end
/// on fd 3 and the message pipe's write end on fd 4, and nothing else of
/// either pipe.
///
/// The pipe descriptors may themselves be 3 or 4, so both ends are first
/// parked above the target range before being moved into place.
fn install_worker_fds(
    cmd_read: RawFd,
    cmd_write: RawFd,
    msg_read: RawFd,
    msg_write: RawFd,
) -> std::io::Result<()> {
    const PARK_FLOOR: RawFd = 10;

    let check = |ret: libc::c_int| {
        if ret < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(ret)
        }
    };

    unsafe {
        // Parent-side ends must go first; one of them may sit on 3 or 4
        libc::close(cmd_write);
        libc::close(msg_read);

        let parked_cmd = check(libc::fcntl(cmd_read, libc::F_DUPFD, PARK_FLOOR))?;
        let parked_msg = check(libc::fcntl(msg_write, libc::F_DUPFD, PARK_FLOOR))?;
        for fd in [cmd_read, msg_write] {
            if fd != 3 && fd != 4 {
                libc::close(fd);
            }
        }

        // dup2 leaves the new descriptors without FD_CLOEXEC
        check(libc::dup2(parked_cmd, 3))?;
        check(libc::dup2(parked_msg, 4))?;
        libc::close(parked_cmd);
        libc::close(parked_msg);
    }
    Ok(())
}

fn poll_millis(duration: Duration) -> i32 {
    i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}

/// Append a batch's samples, rejecting batches for another fork or out of sequence.
fn accept_batch(
    batch: SampleBatch,
    fork: u32,
    next_sequence: &mut u32,
    samples: &mut Vec<Sample>,
) -> Result<(), SupervisorError> {
    if batch.fork != fork {
        return Err(SupervisorError::ProtocolError {
            expected: format!("batch for fork {fork}"),
            got: format!("batch for fork {}", batch.fork),
        });
    }
    if batch.sequence != *next_sequence {
        return Err(SupervisorError::ProtocolError {
            expected: format!("batch {}", *next_sequence),
            got: format!("batch {}", batch.sequence),
        });
    }
    *next_sequence += 1;
    samples.extend(batch.samples);
    Ok(())
}

/// Worker process handle
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
    capabilities: Option<WorkerCapabilities>,
    msg_read_fd: RawFd,
}

impl WorkerHandle {
    /// Spawn a new worker process using fd 3/4 for IPC.
    pub fn spawn() -> Result<Self, SupervisorError> {
        let binary = env::current_exe().map_err(SupervisorError::SpawnFailed)?;
        Self::spawn_binary(&binary)
    }

    /// Spawn a worker from a specific binary
    pub fn spawn_binary(binary: &std::path::Path) -> Result<Self, SupervisorError> {
        // cmd_pipe: supervisor writes commands → worker reads from fd 3
        let (cmd_read, cmd_write) = create_pipe()?;
        // msg_pipe: worker writes messages from fd 4 → supervisor reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(binary);
        command
            .arg("--worker")
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        unsafe {
            command.pre_exec(move || {
                install_worker_fds(cmd_read, cmd_write, msg_read, msg_write)
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        // Close the child-side ends in the parent
        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        let mut handle = Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
            capabilities: None,
            msg_read_fd: msg_read,
        };

        handle.wait_for_hello()?;
        Ok(handle)
    }

    /// Wait for Hello message from worker and validate protocol version
    fn wait_for_hello(&mut self) -> Result<(), SupervisorError> {
        let msg: WorkerMessage = self.reader.read()?;

        match msg {
            WorkerMessage::Hello(caps) => {
                if caps.protocol_version != PROTOCOL_VERSION {
                    return Err(SupervisorError::ProtocolError {
                        expected: format!("protocol version {}", PROTOCOL_VERSION),
                        got: format!("protocol version {}", caps.protocol_version),
                    });
                }
                debug!(pid = caps.pid, cpus = caps.cpu_count, "worker ready");
                self.capabilities = Some(caps);
                Ok(())
            }
            other => Err(SupervisorError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Get worker capabilities
    pub fn capabilities(&self) -> Option<&WorkerCapabilities> {
        self.capabilities.as_ref()
    }

    /// Run one fork on this worker, enforcing `hard_timeout` if set
    pub fn run_fork(
        &mut self,
        bench_id: &str,
        fork: u32,
        config: &BenchmarkConfig,
        hard_timeout: Option<Duration>,
    ) -> Result<ForkOutcome, SupervisorError> {
        self.writer.write(&SupervisorCommand::Run {
            bench_id: bench_id.to_string(),
            fork,
            config: config.clone(),
        })?;

        let mut samples = Vec::new();
        let mut next_sequence = 0;
        let start = Instant::now();

        loop {
            let remaining = hard_timeout.map(|t| t.saturating_sub(start.elapsed()));
            if remaining.is_some_and(|r| r.is_zero()) {
                // Graceful timeout: SIGTERM → drain → SIGKILL
                return Ok(self.handle_timeout(fork, samples, next_sequence));
            }

            // Even with buffered data we verify the worker is alive; the buffer
            // might hold an incomplete frame that will never be completed.
            if self.reader.has_buffered_data() {
                if !self.is_alive() {
                    return Err(SupervisorError::WorkerCrashed(
                        "worker process crashed with partial data buffered".to_string(),
                    ));
                }
            } else {
                let poll_timeout = remaining
                    .unwrap_or(Duration::MAX)
                    .min(Duration::from_millis(100));
                match wait_for_data(self.msg_read_fd, poll_millis(poll_timeout)) {
                    PollResult::DataAvailable => {}
                    PollResult::Timeout => {
                        if !self.is_alive() {
                            return Err(SupervisorError::WorkerCrashed(
                                "worker process exited unexpectedly".to_string(),
                            ));
                        }
                        continue;
                    }
                    PollResult::PipeClosed => {
                        return Err(SupervisorError::WorkerCrashed(
                            "worker pipe closed unexpectedly".to_string(),
                        ));
                    }
                    PollResult::Error(e) => {
                        return Err(SupervisorError::WorkerCrashed(format!("pipe error: {}", e)));
                    }
                }
            }

            let msg: WorkerMessage = match self.reader.read::<WorkerMessage>() {
                Ok(msg) => msg,
                Err(WireError::EndOfStream) => {
                    return Err(SupervisorError::WorkerCrashed(
                        "worker closed connection unexpectedly".to_string(),
                    ));
                }
                Err(e) => {
                    if !self.is_alive() {
                        return Err(SupervisorError::WorkerCrashed(
                            "worker crashed during read".to_string(),
                        ));
                    }
                    return Err(e.into());
                }
            };

            match msg {
                WorkerMessage::SampleBatch(batch) => {
                    accept_batch(batch, fork, &mut next_sequence, &mut samples)?;
                }
                WorkerMessage::WarmupComplete {
                    iterations,
                    invocations,
                    duration_nanos,
                } => {
                    debug!(
                        bench_id,
                        fork,
                        iterations,
                        invocations,
                        duration_ms = duration_nanos as f64 / 1e6,
                        "warmup complete"
                    );
                }
                WorkerMessage::Complete {
                    total_invocations,
                    measured_iterations,
                    truncated,
                } => {
                    return Ok(ForkOutcome {
                        fork,
                        status: ForkStatus::Completed { truncated },
                        samples,
                        invocations: total_invocations,
                        measured_iterations,
                    });
                }
                WorkerMessage::Failure { kind, message } => {
                    let status = match kind {
                        FailureKind::Setup | FailureKind::NotFound => {
                            ForkStatus::SetupFailed { message }
                        }
                        FailureKind::Panic | FailureKind::Internal => {
                            ForkStatus::Crashed { message }
                        }
                    };
                    return Ok(ForkOutcome::failed(fork, status));
                }
                WorkerMessage::Hello(_) => {
                    return Err(SupervisorError::ProtocolError {
                        expected: "SampleBatch/Complete/Failure".to_string(),
                        got: "Hello".to_string(),
                    });
                }
            }
        }
    }

    /// Handle timeout: send SIGTERM, drain remaining messages, then SIGKILL.
    ///
    /// Batches that arrive out of sequence end the drain; what came before
    /// them is kept.
    fn handle_timeout(
        &mut self,
        fork: u32,
        mut samples: Vec<Sample>,
        mut next_sequence: u32,
    ) -> ForkOutcome {
        let _ = send_sigterm(self.child.id());

        let mut invocations = 0;
        let mut measured_iterations = 0;
        let drain_deadline = Instant::now() + DRAIN_WINDOW;
        loop {
            let remaining = drain_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match wait_for_data(self.msg_read_fd, poll_millis(remaining)) {
                PollResult::DataAvailable => match self.reader.read::<WorkerMessage>() {
                    Ok(WorkerMessage::SampleBatch(batch)) => {
                        if accept_batch(batch, fork, &mut next_sequence, &mut samples).is_err() {
                            break;
                        }
                    }
                    Ok(WorkerMessage::WarmupComplete { .. }) => {}
                    Ok(WorkerMessage::Complete {
                        total_invocations,
                        measured_iterations: iterations,
                        ..
                    }) => {
                        invocations = total_invocations;
                        measured_iterations = iterations;
                        break;
                    }
                    _ => break,
                },
                _ => break,
            }
        }

        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }

        ForkOutcome {
            fork,
            status: ForkStatus::TimedOut,
            samples,
            invocations,
            measured_iterations,
        }
    }

    /// Shutdown the worker gracefully
    pub fn shutdown(mut self) -> Result<(), SupervisorError> {
        if self.is_alive() {
            self.writer.write(&SupervisorCommand::Shutdown)?;
            let _ = self.child.wait();
        }
        Ok(())
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the worker process forcefully
    pub fn kill(&mut self) -> Result<(), SupervisorError> {
        self.child.kill().map_err(SupervisorError::SpawnFailed)?;
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            // Graceful: SIGTERM first, brief wait, then SIGKILL
            let _ = send_sigterm(self.child.id());
            std::thread::sleep(Duration::from_millis(50));
            if self.is_alive() {
                let _ = self.child.kill();
            }
            let _ = self.child.wait();
        }
    }
}

/// Runs every fork of every benchmark in worker processes
pub struct Supervisor {
    config: BenchmarkConfig,
    forks: u32,
    jobs: usize,
}

impl Supervisor {
    /// Create a new supervisor
    pub fn new(config: BenchmarkConfig, forks: u32, jobs: usize) -> Self {
        Self {
            config,
            forks: forks.max(1),
            jobs: jobs.max(1),
        }
    }

    /// Deadline after which a fork is signalled; `None` when trials are unbounded
    pub fn hard_timeout(&self) -> Option<Duration> {
        (self.config.timeout_ns > 0)
            .then(|| Duration::from_nanos(self.config.timeout_ns) + TIMEOUT_GRACE)
    }

    /// Run all forks of one benchmark, one after another.
    ///
    /// A setup failure stops the sequence; later forks would fail the same way.
    pub fn run_benchmark(&self, bench: &BenchmarkDef) -> Vec<ForkOutcome> {
        let mut outcomes = Vec::with_capacity(self.forks as usize);

        for fork in 1..=self.forks {
            info!(bench_id = bench.id(), fork, forks = self.forks, "starting fork");
            let outcome = self.run_fork(bench, fork);

            match &outcome.status {
                ForkStatus::Completed { truncated: true } => {
                    warn!(bench_id = bench.id(), fork, "fork truncated by trial timeout");
                }
                ForkStatus::TimedOut => {
                    warn!(bench_id = bench.id(), fork, "fork killed after hard timeout");
                }
                ForkStatus::Crashed { message } => {
                    warn!(bench_id = bench.id(), fork, "fork crashed: {message}");
                }
                _ => {}
            }

            let stop = matches!(outcome.status, ForkStatus::SetupFailed { .. });
            outcomes.push(outcome);
            if stop {
                warn!(
                    bench_id = bench.id(),
                    "setup failed, skipping remaining forks"
                );
                break;
            }
        }

        outcomes
    }

    fn run_fork(&self, bench: &BenchmarkDef, fork: u32) -> ForkOutcome {
        let mut worker = match WorkerHandle::spawn() {
            Ok(worker) => worker,
            Err(e) => {
                return ForkOutcome::failed(
                    fork,
                    ForkStatus::Crashed {
                        message: e.to_string(),
                    },
                );
            }
        };

        let result = worker.run_fork(bench.id(), fork, &self.config, self.hard_timeout());
        match result {
            Ok(outcome) => {
                if outcome.status != ForkStatus::TimedOut {
                    let _ = worker.shutdown();
                }
                outcome
            }
            Err(e) => {
                if worker.is_alive() {
                    let _ = worker.kill();
                }
                ForkOutcome::failed(
                    fork,
                    ForkStatus::Crashed {
                        message: e.to_string(),
                    },
                )
            }
        }
    }

    /// Run all benchmarks, up to `jobs` at a time.
    ///
    /// Results come back in the order of `benchmarks`. `on_done` is called as
    /// each benchmark finishes.
    pub fn run_all<F>(
        &self,
        benchmarks: &[&BenchmarkDef],
        on_done: F,
    ) -> Result<Vec<Vec<ForkOutcome>>, SupervisorError>
    where
        F: Fn(&BenchmarkDef) + Sync,
    {
        if benchmarks.is_empty() {
            return Ok(Vec::new());
        }

        let run_one = |bench: &&BenchmarkDef| {
            let outcomes = self.run_benchmark(bench);
            on_done(bench);
            outcomes
        };

        if self.jobs == 1 || benchmarks.len() == 1 {
            return Ok(benchmarks.iter().map(run_one).collect());
        }

        let worker_count = self.jobs.min(benchmarks.len());
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .map_err(|e| {
                SupervisorError::IpcError(format!("Failed to build worker pool: {}", e))
            })?;

        Ok(pool.install(|| benchmarks.par_iter().map(run_one).collect()))
    }
}
