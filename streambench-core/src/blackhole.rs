//! Result sink that keeps benchmark work observable to the optimizer.

/// Consumes workload results so the computation producing them is not
/// eliminated as dead code.
///
/// Each invoking thread owns one `Blackhole`; their counts are summed at the
/// end of every iteration.
#[derive(Debug, Default)]
pub struct Blackhole {
    consumed: u64,
}

impl Blackhole {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Swallow a value
    #[inline(always)]
    pub fn consume<T>(&mut self, value: T) {
        std::hint::black_box(value);
        self.consumed += 1;
    }

    /// Number of values consumed so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}
