//! Exponential backoff for retried jobs

/// Largest power of two applied to a base delay. Beyond this every
/// non-zero base saturates anyway.
pub const MAX_BACKOFF_EXPONENT: u32 = 62;

/// Computes the delay for the next attempt of a failed job
#[derive(Debug, Clone, Copy, Default)]
pub struct BackoffCalculator;

impl BackoffCalculator {
    pub fn new() -> Self {
        Self
    }

    /// `base_delay * 2^(retry + 1)`: the first retry (retry = 0) doubles the base.
    ///
    /// Negative retry counts are treated as 0 and non-positive bases yield 0.
    /// Large inputs saturate at `i64::MAX` rather than wrapping.
    ///
    /// ```
    /// use delayq::job_scheduling::BackoffCalculator;
    ///
    /// let backoff = BackoffCalculator::new();
    /// assert_eq!(backoff.calculate(500, 0), 1000);
    /// assert_eq!(backoff.calculate(500, 1), 2000);
    /// assert_eq!(backoff.calculate(0, 7), 0);
    /// ```
    pub fn calculate(&self, base_delay: i64, retry: i32) -> i64 {
        if base_delay <= 0 {
            return 0;
        }

        let exponent = u32::try_from(retry.max(0))
            .unwrap_or(0)
            .saturating_add(1)
            .min(MAX_BACKOFF_EXPONENT);

        base_delay.saturating_mul(1_i64 << exponent)
    }
}
