//! Facade error types.

/// Outcome of a failed [`crate::Publisher::send`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The rate limiter rejected the message (drop mode only; block mode
    /// waits instead).
    #[error("dropped by rate limiter")]
    Dropped,

    /// MWMR slot-safety wait timed out (drop mode only; block mode keeps
    /// retrying).
    #[error("ring contention timeout")]
    Timeout,

    /// Payload does not fit a slot; never retried.
    #[error("payload of {len} bytes exceeds slot capacity of {max} bytes")]
    TooLarge { len: usize, max: usize },
}
