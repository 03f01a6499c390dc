//! Error types for region setup and the ring fast paths.
//!
//! Fast-path outcomes are values: `NO_DATA` is `Ok(None)` on the subscriber
//! side, not an error, and nothing here is ever retried internally.

use crate::layout::RingKind;

/// Errors from region init, attach, and topic binding.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// Caller input that can never succeed; not retryable.
    #[error("invalid region config: {0}")]
    InvalidConfig(&'static str),

    /// The backing store could not be created, sized, or mapped.
    #[error("backing store failure")]
    Backing(#[from] std::io::Error),

    /// The configured topics do not fit in the requested region size.
    #[error("region too small: need {needed} bytes, have {available}")]
    InsufficientSpace { needed: u64, available: u64 },

    /// The mapped bytes are not a USRL region.
    #[error("bad region magic {0:#010x}")]
    BadMagic(u32),

    /// The region was written by an incompatible layout version.
    #[error("unsupported region layout version {0}")]
    BadVersion(u32),

    /// The mapping is shorter than the header claims, or a topic's ring
    /// falls outside the mapping.
    #[error("region layout exceeds the mapped bytes")]
    Truncated,

    #[error("unknown topic '{0}'")]
    TopicNotFound(String),

    /// The topic exists but with a different ring discipline than required.
    #[error("topic '{topic}' is not a {expected:?} ring")]
    WrongRingKind { topic: String, expected: RingKind },
}

/// Errors from the publish fast path.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Payload does not fit in a slot; surfaced to the caller, never retried.
    #[error("payload of {len} bytes exceeds slot capacity of {max} bytes")]
    TooLarge { len: usize, max: usize },

    /// MWMR slot-safety wait exceeded its iteration bound. Retryable.
    #[error("slot-safety wait exceeded {0} iterations")]
    Timeout(u32),
}

/// Errors from the subscribe fast path.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    /// The committed message does not fit the caller's buffer. The slot is
    /// consumed (the cursor advances) so a small buffer cannot live-lock
    /// the subscriber.
    #[error("message of {len} bytes exceeds the {cap}-byte receive buffer")]
    Truncated { len: usize, cap: usize },
}
