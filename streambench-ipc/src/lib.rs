#![warn(missing_docs)]
//! streambench IPC Protocol
//!
//! Wire protocol between the supervisor and its fork workers. Every fork is a
//! fresh process that receives one `Run` command, executes a single trial and
//! streams its samples back in batches.
//!
//! Messages are serialized with rkyv and framed with a 4-byte length prefix.

mod batcher;
mod framing;
mod messages;

pub use batcher::SampleBatcher;
pub use framing::{FrameReader, FrameWriter, MAX_FRAME_SIZE, WireError};
pub use messages::{
    BenchmarkConfig, FailureKind, FlushReason, IterationLimit, Mode, Sample, SampleBatch,
    SupervisorCommand, TimeUnit, WorkerCapabilities, WorkerMessage,
};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum samples per batch
pub const MAX_BATCH_SIZE: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_layout() {
        assert_eq!(std::mem::size_of::<Sample>(), 16);
        assert_eq!(std::mem::align_of::<Sample>(), 8);
    }

    #[test]
    fn test_batch_fits_in_frame() {
        assert!(MAX_BATCH_SIZE * std::mem::size_of::<Sample>() < MAX_FRAME_SIZE);
    }
}
