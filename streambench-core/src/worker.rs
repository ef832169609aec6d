//! Worker Process Entry Point
//!
//! Handles the worker side of the supervisor-worker architecture. Each fork
//! is a fresh process running the benchmark binary with `--worker`; it says
//! hello, runs the trial it is told to run and streams samples back.
//!
//! On Unix, uses fd 3/4 for IPC (set via `STREAMBENCH_IPC_FD`) and installs
//! a SIGTERM handler that stops the running trial cooperatively. On non-Unix,
//! falls back to stdin/stdout and skips signal handling.

use crate::bencher::{SampleSink, WarmupSummary};
use crate::lifecycle::{TrialError, run_trial};
use crate::registry::Registry;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use streambench_ipc::{
    BenchmarkConfig, FailureKind, FrameReader, FrameWriter, Sample, SampleBatcher,
    SupervisorCommand, WireError, WorkerCapabilities, WorkerMessage,
};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Environment variable naming the `<read_fd>,<write_fd>` pair
pub const IPC_FD_ENV: &str = "STREAMBENCH_IPC_FD";

/// Global flag set by SIGTERM handler to request graceful shutdown.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if a graceful shutdown has been requested via SIGTERM.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// Install a SIGTERM handler that sets the `SHUTDOWN_REQUESTED` flag.
/// The handler is async-signal-safe (only sets an atomic).
#[cfg(unix)]
fn install_sigterm_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigterm_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigterm_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

/// No-op on non-Unix (no SIGTERM equivalent).
#[cfg(not(unix))]
fn install_sigterm_handler() {}

/// IPC transport: either inherited fd pair or stdin/stdout fallback.
enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        if let Some((r, w)) = val.split_once(',') {
            if let (Ok(read_fd), Ok(write_fd)) = (r.trim().parse(), w.trim().parse()) {
                return IpcTransport::Fds { read_fd, write_fd };
            }
        }
        warn!("invalid {IPC_FD_ENV}={val:?} (expected <read_fd>,<write_fd>), falling back to stdio");
    }
    IpcTransport::Stdio
}

/// Streams samples to the supervisor as they are recorded
struct BatchingSink<'w, W: Write> {
    batcher: SampleBatcher,
    writer: &'w mut FrameWriter<W>,
    error: Option<WireError>,
}

impl<W: Write> BatchingSink<'_, W> {
    fn send(&mut self, message: &WorkerMessage) {
        if self.error.is_none() {
            if let Err(e) = self.writer.write(message) {
                self.error = Some(e);
            }
        }
    }

    fn finish(mut self) -> Result<(), WireError> {
        if let Some(batch) = self.batcher.finish() {
            self.send(&WorkerMessage::SampleBatch(batch));
        }
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<W: Write> SampleSink for BatchingSink<'_, W> {
    fn warmup_complete(&mut self, summary: &WarmupSummary) {
        self.send(&WorkerMessage::WarmupComplete {
            iterations: summary.iterations,
            invocations: summary.invocations,
            duration_nanos: summary.duration_nanos,
        });
    }

    fn record(&mut self, sample: Sample) {
        if let Some(batch) = self.batcher.push(sample) {
            self.send(&WorkerMessage::SampleBatch(batch));
        }
    }
}

/// Worker main loop
pub struct WorkerMain<R: Read = Box<dyn Read>, W: Write = Box<dyn Write>> {
    registry: Registry,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl WorkerMain {
    /// Create a new worker, using fd 3/4 if `STREAMBENCH_IPC_FD` is set, otherwise stdin/stdout.
    pub fn new(registry: Registry) -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                // SAFETY: the supervisor dup2'd these descriptors for us and
                // nothing else in this process owns them.
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self::with_transport(registry, Box::new(read_file), Box::new(write_file))
            }
            IpcTransport::Stdio => Self::with_transport(
                registry,
                Box::new(std::io::stdin()),
                Box::new(std::io::stdout()),
            ),
        }
    }
}

impl<R: Read, W: Write> WorkerMain<R, W> {
    /// Create a worker over an explicit transport
    pub fn with_transport(registry: Registry, reader: R, writer: W) -> Self {
        Self {
            registry,
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Run the worker main loop until shutdown or end of stream
    pub fn run(&mut self) -> Result<(), WireError> {
        install_sigterm_handler();

        self.writer
            .write(&WorkerMessage::Hello(WorkerCapabilities::default()))?;

        loop {
            if shutdown_requested() {
                break;
            }

            let command: SupervisorCommand = match self.reader.read() {
                Ok(command) => command,
                Err(WireError::EndOfStream) => break,
                Err(e) => return Err(e),
            };

            match command {
                SupervisorCommand::Run {
                    bench_id,
                    fork,
                    config,
                } => {
                    self.run_benchmark(&bench_id, fork, &config)?;
                }
                SupervisorCommand::Shutdown => break,
            }
        }

        Ok(())
    }

    /// Run a single trial and report it
    fn run_benchmark(
        &mut self,
        bench_id: &str,
        fork: u32,
        config: &BenchmarkConfig,
    ) -> Result<(), WireError> {
        let Some(def) = self.registry.get(bench_id) else {
            return self.writer.write(&WorkerMessage::Failure {
                kind: FailureKind::NotFound,
                message: format!("benchmark not found: {bench_id}"),
            });
        };

        debug!(bench_id, fork, "starting trial");
        let mut sink = BatchingSink {
            batcher: SampleBatcher::new(fork),
            writer: &mut self.writer,
            error: None,
        };
        let result = run_trial(def, config, &mut sink);

        match result {
            Ok(outcome) => {
                sink.finish()?;
                self.writer.write(&WorkerMessage::Complete {
                    total_invocations: outcome.invocations,
                    measured_iterations: outcome.measured_iterations,
                    truncated: outcome.truncated,
                })
            }
            Err(err) => {
                if let Some(e) = sink.error {
                    return Err(e);
                }
                let kind = match &err {
                    TrialError::Config(_) | TrialError::Setup(_) => FailureKind::Setup,
                    TrialError::Panic { .. } => FailureKind::Panic,
                    TrialError::Pool(_) => FailureKind::Internal,
                };
                self.writer.write(&WorkerMessage::Failure {
                    kind,
                    message: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BenchmarkDef, Hooks, SetupError};
    use std::io::Cursor;
    use streambench_ipc::{IterationLimit, Mode};

    fn test_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(BenchmarkDef::new(
                "count",
                Hooks::new(|| Ok(10_u64), |n| (0..*n).sum::<u64>()),
            ))
            .unwrap();
        registry
            .register(BenchmarkDef::new(
                "no_setup",
                Hooks::new(|| Ok(0_u64), |n| *n).with_setup(|_| Err(SetupError::new("nope"))),
            ))
            .unwrap();
        registry
    }

    fn command_stream(commands: &[SupervisorCommand]) -> Cursor<Vec<u8>> {
        let mut bytes = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut bytes);
            for command in commands {
                writer.write(command).unwrap();
            }
        }
        Cursor::new(bytes)
    }

    fn run_command(bench_id: &str) -> SupervisorCommand {
        SupervisorCommand::Run {
            bench_id: bench_id.to_string(),
            fork: 1,
            config: BenchmarkConfig {
                mode: Mode::AverageTime,
                warmup_iterations: 1,
                measurement_iterations: 4,
                warmup_limit: IterationLimit::Invocations { count: 2 },
                measurement_limit: IterationLimit::Invocations { count: 2 },
                ..Default::default()
            },
        }
    }

    fn replies(output: Vec<u8>) -> Vec<WorkerMessage> {
        let mut reader = FrameReader::new(Cursor::new(output));
        let mut messages = Vec::new();
        while let Ok(message) = reader.read::<WorkerMessage>() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn test_worker_streams_trial() {
        let input = command_stream(&[run_command("count"), SupervisorCommand::Shutdown]);
        let mut output = Vec::new();
        WorkerMain::with_transport(test_registry(), input, &mut output)
            .run()
            .unwrap();

        let messages = replies(output);
        assert!(matches!(messages[0], WorkerMessage::Hello(_)));
        assert!(matches!(
            messages[1],
            WorkerMessage::WarmupComplete { iterations: 1, .. }
        ));
        match &messages[2] {
            WorkerMessage::SampleBatch(batch) => {
                assert_eq!(batch.samples.len(), 4);
                assert_eq!(batch.fork, 1);
            }
            other => panic!("expected batch, got {other:?}"),
        }
        assert!(matches!(
            messages[3],
            WorkerMessage::Complete {
                total_invocations: 8,
                measured_iterations: 4,
                truncated: false,
            }
        ));
    }

    #[test]
    fn test_worker_reports_setup_failure() {
        let input = command_stream(&[run_command("no_setup")]);
        let mut output = Vec::new();
        WorkerMain::with_transport(test_registry(), input, &mut output)
            .run()
            .unwrap();

        let messages = replies(output);
        match &messages[1] {
            WorkerMessage::Failure { kind, message } => {
                assert_eq!(*kind, FailureKind::Setup);
                assert!(message.contains("nope"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_worker_reports_unknown_benchmark() {
        let input = command_stream(&[run_command("missing")]);
        let mut output = Vec::new();
        WorkerMain::with_transport(test_registry(), input, &mut output)
            .run()
            .unwrap();

        let messages = replies(output);
        assert!(matches!(
            messages[1],
            WorkerMessage::Failure {
                kind: FailureKind::NotFound,
                ..
            }
        ));
    }
}
