//! Single-writer multi-reader publish path.
//!
//! SWMR assumes one logical writer per ring, but the reservation still goes
//! through the atomic `fetch_add` so multiple threads inside a
//! single-writer process cannot interleave unsafely. The discipline is a
//! performance hint (no slot-safety wait), not a relaxation of the memory
//! protocol.

use crate::error::{PublishError, RegionError};
use crate::region::Region;
use crate::ring::RingRef;

/// Publisher handle for a SWMR topic.
///
/// Owns its own mapping of the region. Not `Sync`: use one handle per
/// thread.
pub struct SwmrPublisher {
    /// Owns the mapping the cached ring pointers point into.
    _region: Region,
    ring: RingRef,
    pub_id: u16,
}

// SAFETY: the handle's only shared state is reached through atomics; the
// rest is owned. See the `Region` Send rationale.
unsafe impl Send for SwmrPublisher {}

impl SwmrPublisher {
    /// Bind a publisher to `topic` inside an attached region.
    ///
    /// The ring kind is not checked here: publishing into an MWMR ring via
    /// the SWMR path is merely a discipline violation by the caller, not a
    /// layout error.
    pub fn attach(region: Region, topic: &str, pub_id: u16) -> Result<Self, RegionError> {
        let (ring, _kind) = RingRef::bind(&region, topic)?;
        Ok(Self {
            _region: region,
            ring,
            pub_id,
        })
    }

    /// Publish one message; returns its commit sequence.
    ///
    /// Reserve via `fetch_add(w_head)`, copy the payload into the reserved
    /// slot, then commit with the release-ordered `seq` store.
    #[inline(always)]
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
        // SAFETY: slot comes from slot_ptr for our reservation and the
        // length was checked against max_payload.
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
        self.ring.w_head().load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn max_payload(&self) -> usize {
        self.ring.max_payload()
    }
}
