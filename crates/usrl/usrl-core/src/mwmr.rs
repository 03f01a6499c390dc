//! Multi-writer multi-reader publish path.
//!
//! Reservation is identical to SWMR; the difference is the slot-safety
//! wait. Because several writers may lap the ring concurrently, a writer
//! that reserved `commit_seq` must not touch its slot until the slot's
//! current occupant belongs to an older generation (`seq / slot_count`).
//! Reservation order fully decides slot ownership; the wait only covers the
//! window where a previous generation's writer is still mid-commit.

use crate::error::{PublishError, RegionError};
use crate::layout::{RingKind, SlotHeader};
use crate::region::Region;
use crate::ring::RingRef;
use std::sync::atomic::Ordering;

/// Iterations spent spinning with a CPU pause hint before yielding to the
/// scheduler.
const SPIN_ITERS: u32 = 10;

/// Slot-safety wait bound. Exceeding it fails the publish with `Timeout`
/// rather than risking a deadlock against a stalled peer.
pub const SLOT_WAIT_MAX_ITERS: u32 = 10_000;

/// Publisher handle for an MWMR topic.
///
/// Each producer (thread or process) opens its own handle; `publish`
/// atomically claims a unique sequence, so no two writers commit into the
/// same slot within a generation.
#[derive(Debug)]
pub struct MwmrPublisher {
    /// Owns the mapping the cached ring pointers point into.
    _region: Region,
    ring: RingRef,
    pub_id: u16,
}

// SAFETY: same rationale as `SwmrPublisher`.
unsafe impl Send for MwmrPublisher {}

impl MwmrPublisher {
    /// Bind a publisher to an MWMR topic. Fails with `WrongRingKind` if the
    /// topic was laid out as SWMR: the slot-safety wait is mandatory for
    /// shared rings, and silently downgrading would corrupt them.
    pub fn attach(region: Region, topic: &str, pub_id: u16) -> Result<Self, RegionError> {
        let (ring, kind) = RingRef::bind(&region, topic)?;
        if kind != RingKind::Mwmr {
            return Err(RegionError::WrongRingKind {
                topic: topic.to_owned(),
                expected: RingKind::Mwmr,
            });
        }
        Ok(Self {
            _region: region,
            ring,
            pub_id,
        })
    }

    /// Publish one message; returns its commit sequence.
    pub fn publish(&mut self, payload: &[u8]) -> Result<u64, PublishError> {
        let max = self.ring.max_payload();
        if payload.len() > max {
            return Err(PublishError::TooLarge {
                len: payload.len(),
                max,
            });
        }

        let commit_seq = self.ring.reserve();
        let slot = self.ring.slot_ptr(commit_seq);
        let hdr = slot as *const SlotHeader;

        // Slot-safety wait: the slot is ours once its occupant is from an
        // older lap. seq == 0 means never written. A same-generation seq
        // can only be a writer of a previous lap still in flight.
        let my_gen = commit_seq / self.ring.slot_count();
        let mut iter: u32 = 0;
        loop {
            // SAFETY: hdr points at a validated slot; seq is atomic.
            let current = unsafe { (*hdr).seq.load(Ordering::Acquire) };
            if current == 0 || current / self.ring.slot_count() < my_gen {
                break;
            }
            if iter >= SLOT_WAIT_MAX_ITERS {
                return Err(PublishError::Timeout(iter));
            }
            backoff(iter);
            iter += 1;
        }

        // SAFETY: slot is from slot_ptr for our reservation, length checked,
        // and the wait above established the slot is safe to overwrite.
        unsafe {
            self.ring
                .fill_and_commit(slot, payload, self.pub_id, commit_seq)
        };
        Ok(commit_seq)
    }

    pub fn pub_id(&self) -> u16 {
        self.pub_id
    }

    /// Total messages ever reserved on this ring.
    pub fn head(&self) -> u64 {
        self.ring.w_head().load(Ordering::Acquire)
    }

    pub fn max_payload(&self) -> usize {
        self.ring.max_payload()
    }
}

/// Contention backoff: CPU pause hint for the first few iterations, then a
/// cooperative yield to the scheduler.
#[inline(always)]
fn backoff(iter: u32) {
    if iter < SPIN_ITERS {
        std::hint::spin_loop();
    } else {
        std::thread::yield_now();
    }
}
