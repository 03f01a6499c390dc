//! Subscriber state machine: polling consume with at-most-once delivery.
//!
//! A subscriber never writes shared state. Its cursor (`last_seq`, the
//! greatest sequence already delivered) lives in the handle, so independent
//! subscribers consume at their own pace. Falling more than `slot_count`
//! behind the writer loses the gap: the cursor jumps forward and the loss
//! is counted, never silently re-read as stale bytes.

use crate::error::{RecvError, RegionError};
use crate::layout::{SLOT_HEADER_SIZE, SlotHeader};
use crate::region::Region;
use crate::ring::RingRef;
use std::ptr;
use std::sync::atomic::{Ordering, fence};

/// One delivered message's metadata. The payload bytes land in the buffer
/// passed to [`Subscriber::try_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Payload bytes written into the caller's buffer.
    pub len: usize,
    /// Advisory id of the publisher that wrote the message.
    pub pub_id: u16,
    /// Monotonic timestamp taken at commit time.
    pub timestamp_ns: u64,
    /// Commit sequence of the message on its ring.
    pub seq: u64,
}

/// Consumer handle for one topic. Owns its own mapping of the region.
///
/// Not `Sync`; the cursor is thread-local by design.
pub struct Subscriber {
    /// Owns the mapping the cached ring pointers point into.
    _region: Region,
    ring: RingRef,
    /// Greatest sequence already delivered. 0 = nothing consumed yet.
    last_seq: u64,
    /// Messages lost to overruns and laps since attach.
    skipped: u64,
}

// SAFETY: same rationale as the publisher handles; the cursor is owned.
unsafe impl Send for Subscriber {}

impl Subscriber {
    /// Bind a subscriber to `topic`. Works for both ring disciplines.
    pub fn attach(region: Region, topic: &str) -> Result<Self, RegionError> {
        let (ring, _kind) = RingRef::bind(&region, topic)?;
        Ok(Self {
            _region: region,
            ring,
            last_seq: 0,
            skipped: 0,
        })
    }

    /// Poll for the next message, copying its payload into `buf`.
    ///
    /// Returns `Ok(None)` when nothing new is committed (the normal polling
    /// result), `Ok(Some(..))` on delivery, and `Err(Truncated)` when the
    /// message does not fit `buf`; in that case the slot is consumed so a
    /// small buffer cannot live-lock the subscriber.
    pub fn try_next(&mut self, buf: &mut [u8]) -> Result<Option<Message>, RecvError> {
        let mut w = self.ring.w_head().load(Ordering::Acquire);
        let mut next = self.last_seq + 1;
        if next > w {
            return Ok(None);
        }

        // Overrun recovery: the writer lapped us; jump to the oldest slot
        // that can still be intact and account for the gap.
        if w - next >= self.ring.slot_count() {
            let jumped_to = w - self.ring.slot_count();
            self.skipped += jumped_to - self.last_seq;
            self.last_seq = jumped_to;
            next = jumped_to + 1;
            w = self.ring.w_head().load(Ordering::Acquire);
            if next > w {
                return Ok(None);
            }
        }

        let slot = self.ring.slot_ptr(next);
        let hdr = slot as *const SlotHeader;

        // SAFETY: slot geometry was validated at bind time; seq is atomic.
        let seq = unsafe { (*hdr).seq.load(Ordering::Acquire) };
        if seq == 0 || seq < next {
            // Not yet committed for this generation.
            return Ok(None);
        }
        if seq > next {
            // The writer moved past us between the head load and the slot
            // read; resync to what the slot proves was overwritten.
            self.skipped += (seq - 1) - self.last_seq;
            self.last_seq = seq - 1;
            return Ok(None);
        }

        // SAFETY: non-atomic header fields; the seqlock verify below
        // rejects the read if a writer touched the slot meanwhile.
        let len = unsafe { ptr::addr_of!((*hdr).payload_len).read() } as usize;
        if len > self.ring.max_payload() {
            // A length beyond the slot bound can only be a torn header from
            // an in-flight overwrite; resync to the head.
            self.skipped += w - self.last_seq;
            self.last_seq = w;
            return Ok(None);
        }
        if len > buf.len() {
            self.last_seq = next;
            return Err(RecvError::Truncated {
                len,
                cap: buf.len(),
            });
        }

        let pub_id = unsafe { ptr::addr_of!((*hdr).pub_id).read() };
        let timestamp_ns = unsafe { ptr::addr_of!((*hdr).timestamp_ns).read() };
        // SAFETY: len <= max_payload <= buf.len(), both ranges in bounds.
        unsafe {
            ptr::copy_nonoverlapping(slot.add(SLOT_HEADER_SIZE) as *const u8, buf.as_mut_ptr(), len)
        };

        // Seqlock verify: if the writer overwrote the slot during our copy
        // the bytes are torn; discard them and jump to the latest head.
        fence(Ordering::Acquire);
        let post = unsafe { (*hdr).seq.load(Ordering::Relaxed) };
        if post != seq {
            self.skipped += w - self.last_seq;
            self.last_seq = w;
            return Ok(None);
        }

        self.last_seq = next;
        Ok(Some(Message {
            len,
            pub_id,
            timestamp_ns,
            seq,
        }))
    }

    /// Committed-but-undelivered distance to the writer head.
    pub fn lag(&self) -> u64 {
        self.ring
            .w_head()
            .load(Ordering::Acquire)
            .saturating_sub(self.last_seq)
    }

    /// Messages lost to overruns and laps since attach.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Greatest sequence already delivered.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Current writer head of the ring.
    pub fn head(&self) -> u64 {
        self.ring.w_head().load(Ordering::Acquire)
    }
}
