//! Shared ring plumbing: topic binding, slot addressing, and the commit
//! protocol used by both publish disciplines.
//!
//! A [`RingRef`] caches everything a handle needs on the fast path: the
//! descriptor pointer, the slot base pointer, the index mask, and the
//! stride. Binding validates the geometry against the mapping once so the
//! fast paths can use unchecked pointer arithmetic.

use crate::error::RegionError;
use crate::layout::{RingDesc, RingKind, SLOT_HEADER_SIZE, SlotHeader};
use crate::region::Region;
use crate::time;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering, fence};

/// Cached pointers and geometry for one topic's ring.
#[derive(Debug)]
pub(crate) struct RingRef {
    /// Ring descriptor inside the shared mapping.
    desc: *const RingDesc,
    /// First slot of the ring.
    slots: *mut u8,
    /// `slot_count - 1`, for index wrapping.
    mask: u64,
    slot_count: u64,
    slot_stride: u64,
}

impl RingRef {
    /// Bind to `topic` inside `region`, validating that the descriptor and
    /// the whole slot array lie within the mapping.
    pub fn bind(region: &Region, topic: &str) -> Result<(Self, RingKind), RegionError> {
        let entry = region
            .find_topic(topic)
            .ok_or_else(|| RegionError::TopicNotFound(topic.to_owned()))?;
        let kind = entry.kind();

        let len = region.len() as u64;
        if entry.ring_desc_offset + size_of::<RingDesc>() as u64 > len {
            return Err(RegionError::Truncated);
        }

        // SAFETY: the descriptor offset was bounds-checked above and is
        // 64-aligned by construction (placement aligns the descriptor
        // array, and the mapping base is page-aligned).
        let desc = unsafe { region.base().add(entry.ring_desc_offset as usize) } as *const RingDesc;
        let (slot_count, slot_stride, base_offset) = unsafe {
            (
                (*desc).slot_count as u64,
                (*desc).slot_size as u64,
                (*desc).base_offset,
            )
        };

        if slot_count == 0 || !slot_count.is_power_of_two() {
            return Err(RegionError::Truncated);
        }
        if slot_stride < SLOT_HEADER_SIZE as u64 + 8 {
            return Err(RegionError::Truncated);
        }
        if base_offset + slot_count * slot_stride > len {
            return Err(RegionError::Truncated);
        }

        let slots = unsafe { region.base().add(base_offset as usize) };
        Ok((
            Self {
                desc,
                slots,
                mask: slot_count - 1,
                slot_count,
                slot_stride,
            },
            kind,
        ))
    }

    #[inline(always)]
    pub fn w_head(&self) -> &AtomicU64 {
        // SAFETY: desc was validated at bind time and outlives the handle
        // that owns this RingRef (the handle owns the Region).
        unsafe { &(*self.desc).w_head }
    }

    /// Reserve the next sequence. The `fetch_add` is the linearization
    /// point for all writers on this ring.
    #[inline(always)]
    pub fn reserve(&self) -> u64 {
        self.w_head().fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Slot holding `commit_seq`: index `(commit_seq - 1) & mask`.
    #[inline(always)]
    pub fn slot_ptr(&self, commit_seq: u64) -> *mut u8 {
        let idx = (commit_seq - 1) & self.mask;
        // SAFETY: idx < slot_count and the whole array was bounds-checked
        // at bind time.
        unsafe { self.slots.add((idx * self.slot_stride) as usize) }
    }

    #[inline(always)]
    pub fn slot_count(&self) -> u64 {
        self.slot_count
    }

    /// Largest payload a slot can hold.
    #[inline(always)]
    pub fn max_payload(&self) -> usize {
        self.slot_stride as usize - SLOT_HEADER_SIZE
    }

    /// Write payload and header, then publish the slot.
    ///
    /// The release fence plus the release store order every payload and
    /// header byte before the `seq` becomes visible; a reader that observes
    /// `seq == commit_seq` with acquire ordering sees the full message.
    ///
    /// # Safety
    /// `slot` must come from `slot_ptr` on this ring, `payload.len()` must
    /// be at most `max_payload()`, and the caller must hold the reservation
    /// for `commit_seq` (MWMR callers must have completed the slot-safety
    /// wait).
    #[inline(always)]
    pub unsafe fn fill_and_commit(&self, slot: *mut u8, payload: &[u8], pub_id: u16, commit_seq: u64) {
        unsafe {
            ptr::copy_nonoverlapping(payload.as_ptr(), slot.add(SLOT_HEADER_SIZE), payload.len());

            let hdr = slot as *mut SlotHeader;
            ptr::addr_of_mut!((*hdr).timestamp_ns).write(time::now_ns());
            ptr::addr_of_mut!((*hdr).payload_len).write(payload.len() as u32);
            ptr::addr_of_mut!((*hdr).pub_id).write(pub_id);

            fence(Ordering::Release);
            (*hdr).seq.store(commit_seq, Ordering::Release);
        }
    }
}
