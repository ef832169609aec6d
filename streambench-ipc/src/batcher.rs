//! Sample batching for the worker side of the pipe.

use crate::{FlushReason, MAX_BATCH_SIZE, Sample, SampleBatch};

/// Groups samples into `SampleBatch` messages of at most `MAX_BATCH_SIZE`.
pub struct SampleBatcher {
    fork: u32,
    sequence: u32,
    pending: Vec<Sample>,
}

impl SampleBatcher {
    /// Create a batcher for one fork
    pub fn new(fork: u32) -> Self {
        Self {
            fork,
            sequence: 0,
            pending: Vec::with_capacity(MAX_BATCH_SIZE),
        }
    }

    /// Queue a sample, returning a full batch when the limit is reached
    pub fn push(&mut self, sample: Sample) -> Option<SampleBatch> {
        self.pending.push(sample);
        if self.pending.len() >= MAX_BATCH_SIZE {
            Some(self.take(FlushReason::BatchFull))
        } else {
            None
        }
    }

    /// Flush whatever is pending at the end of the trial
    pub fn finish(&mut self) -> Option<SampleBatch> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take(FlushReason::TrialEnd))
        }
    }

    fn take(&mut self, flush_reason: FlushReason) -> SampleBatch {
        let batch = SampleBatch {
            fork: self.fork,
            sequence: self.sequence,
            samples: std::mem::replace(&mut self.pending, Vec::with_capacity(MAX_BATCH_SIZE)),
            flush_reason,
        };
        self.sequence += 1;
        batch
    }
}
