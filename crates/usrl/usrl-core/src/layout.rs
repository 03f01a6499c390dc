//! Shared memory layout definitions for a USRL region.
//!
//! A region is one contiguous mapping shared by every participant. It is
//! written once at init and read-only afterwards, except for the per-ring
//! `w_head` counters and the slots themselves.
//!
//! # Memory Layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ RegionHeader   magic │ version │ mmap_size │ table_off │ count │
//! ├──────────────────────────── 64-aligned ────────────────────────┤
//! │ TopicEntry[0] … TopicEntry[topic_count-1]                      │
//! ├──────────────────────────── 64-aligned ────────────────────────┤
//! │ RingDesc[0] … RingDesc[topic_count-1]      (64 bytes each)     │
//! ├──────────────────────────── 64-aligned ────────────────────────┤
//! │ topic 0 slots: [SlotHeader │ payload] × slot_count             │
//! ├──────────────────────────── 64-aligned ────────────────────────┤
//! │ topic 1 slots …                                                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All offsets are from the region base. Slot counts are normalized to
//! powers of two; slot strides to 8-byte multiples. The placement of every
//! structure is computed by [`LayoutPlan`] before a single byte is written,
//! so an undersized region fails cleanly with nothing on disk mutated.

use crate::error::RegionError;
use std::sync::atomic::AtomicU64;

/// Magic number identifying a valid USRL region. ASCII "USRL".
pub const USRL_MAGIC: u32 = 0x5553_524C;

/// Current region layout version. Attach rejects anything else.
pub const LAYOUT_VERSION: u32 = 1;

/// Maximum topic name length in bytes, including the terminating NUL.
pub const MAX_TOPIC_NAME: usize = 64;

/// Alignment for the topic table, descriptor array, and each slot array.
pub const REGION_ALIGN: u64 = 64;

/// Smallest region size accepted at init.
pub const MIN_REGION_SIZE: u64 = 4096;

/// Bytes of metadata at the head of every slot.
pub const SLOT_HEADER_SIZE: usize = size_of::<SlotHeader>();

/// Ring write discipline, stored per topic as a `u32` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RingKind {
    /// Single writer, multiple readers. Writer uniqueness is a performance
    /// hint, not enforced.
    #[default]
    Swmr,
    /// Multiple writers, multiple readers. Publish performs a slot-safety
    /// wait before overwriting.
    Mwmr,
}

impl RingKind {
    /// Decode the on-disk tag. Unknown values decode as SWMR.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => RingKind::Mwmr,
            _ => RingKind::Swmr,
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            RingKind::Swmr => 0,
            RingKind::Mwmr => 1,
        }
    }
}

/// Region header at offset 0 of the mapping.
///
/// Written once at creation, never mutated afterwards.
#[repr(C)]
pub struct RegionHeader {
    /// Must equal [`USRL_MAGIC`] for any valid region.
    pub magic: u32,
    /// Must equal [`LAYOUT_VERSION`].
    pub version: u32,
    /// Total size of the mapped region in bytes.
    pub mmap_size: u64,
    /// Offset of `TopicEntry[topic_count]` from the region base.
    pub topic_table_offset: u64,
    /// Number of topics in the table.
    pub topic_count: u32,
    pub _pad: u32,
}

/// One entry in the topic table.
#[repr(C)]
pub struct TopicEntry {
    /// NUL-terminated topic name.
    pub name: [u8; MAX_TOPIC_NAME],
    /// Offset of this topic's [`RingDesc`] from the region base.
    pub ring_desc_offset: u64,
    /// Slot count, normalized to a power of two.
    pub slot_count: u32,
    /// Slot stride in bytes (header + payload, 8-aligned).
    pub slot_size: u32,
    /// [`RingKind`] tag.
    pub kind: u32,
    pub _pad: u32,
}

impl TopicEntry {
    /// The stored name up to (not including) the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_TOPIC_NAME);
        &self.name[..end]
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    pub fn kind(&self) -> RingKind {
        RingKind::from_raw(self.kind)
    }
}

/// Per-topic ring control block.
///
/// Cache-line aligned so `w_head` never false-shares with a neighboring
/// descriptor. `w_head` is the only field mutated after init.
#[repr(C, align(64))]
pub struct RingDesc {
    pub slot_count: u32,
    pub slot_size: u32,
    /// Offset of the first slot from the region base.
    pub base_offset: u64,
    /// Monotonic writer head. Writers reserve sequences by incrementing it.
    pub w_head: AtomicU64,
    pub _pad: [u8; 32],
}

/// Metadata at the head of every slot.
///
/// `seq` is stored last with release ordering; a reader observing
/// `seq == commit_seq` with acquire ordering is guaranteed to see the
/// payload bytes of that commit. `seq == 0` means the slot was never
/// written.
#[repr(C)]
pub struct SlotHeader {
    pub seq: AtomicU64,
    pub timestamp_ns: u64,
    pub payload_len: u32,
    pub pub_id: u16,
    pub _pad: u16,
}

const _: () = assert!(size_of::<RegionHeader>() == 32);
const _: () = assert!(size_of::<TopicEntry>() == 88);
const _: () = assert!(size_of::<RingDesc>() == 64);
const _: () = assert!(align_of::<RingDesc>() == 64);
const _: () = assert!(size_of::<SlotHeader>() == 24);
const _: () = assert!(size_of::<SlotHeader>() % 8 == 0);

/// Aligns `v` up to a multiple of `a`. `a` must be a power of two.
#[inline(always)]
pub const fn align_up(v: u64, a: u64) -> u64 {
    (v + (a - 1)) & !(a - 1)
}

/// User-provided description of one topic, before normalization.
#[derive(Debug, Clone)]
pub struct TopicConfig {
    pub name: String,
    /// Requested slots; rounded up to a power of two, minimum 1.
    pub slot_count: u32,
    /// Requested payload bytes per slot; the slot header is added on top.
    pub payload_size: u32,
    pub kind: RingKind,
}

/// One topic's normalized geometry and placement inside the region.
#[derive(Debug, Clone)]
pub struct PlannedTopic {
    pub name: [u8; MAX_TOPIC_NAME],
    pub slot_count: u32,
    pub slot_stride: u32,
    pub kind: RingKind,
    pub ring_desc_offset: u64,
    pub slots_offset: u64,
}

/// Computed placement of every structure in a region.
///
/// Pure arithmetic over the configs; nothing is mapped or written. Init
/// materializes a plan only after it fits the requested size, which is what
/// makes an undersized init atomic.
#[derive(Debug)]
pub struct LayoutPlan {
    pub topic_table_offset: u64,
    pub topics: Vec<PlannedTopic>,
    /// First byte past the last slot array.
    pub bytes_used: u64,
}

impl LayoutPlan {
    pub fn compute(region_size: u64, topics: &[TopicConfig]) -> Result<Self, RegionError> {
        if region_size < MIN_REGION_SIZE {
            return Err(RegionError::InvalidConfig("region size below 4096 bytes"));
        }
        if topics.is_empty() {
            return Err(RegionError::InvalidConfig("no topics configured"));
        }

        let topic_table_offset = align_up(size_of::<RegionHeader>() as u64, REGION_ALIGN);
        let ring_desc_start = align_up(
            topic_table_offset + size_of::<TopicEntry>() as u64 * topics.len() as u64,
            REGION_ALIGN,
        );
        let slots_start = align_up(
            ring_desc_start + size_of::<RingDesc>() as u64 * topics.len() as u64,
            REGION_ALIGN,
        );

        let mut planned = Vec::with_capacity(topics.len());
        let mut next_free = slots_start;

        for (i, t) in topics.iter().enumerate() {
            let name = encode_topic_name(&t.name)?;
            let slot_count = normalize_slot_count(t.slot_count)?;
            let slot_stride = normalize_slot_stride(t.payload_size);

            let slots_offset = next_free;
            let ring_bytes = slot_count as u64 * slot_stride as u64;
            next_free = align_up(slots_offset + ring_bytes, REGION_ALIGN);

            if slots_offset + ring_bytes > region_size {
                return Err(RegionError::InsufficientSpace {
                    needed: slots_offset + ring_bytes,
                    available: region_size,
                });
            }

            planned.push(PlannedTopic {
                name,
                slot_count,
                slot_stride,
                kind: t.kind,
                ring_desc_offset: ring_desc_start + size_of::<RingDesc>() as u64 * i as u64,
                slots_offset,
            });
        }

        Ok(Self {
            topic_table_offset,
            topics: planned,
            bytes_used: next_free,
        })
    }
}

/// Rounds a requested slot count up to a power of two, minimum 1.
pub fn normalize_slot_count(requested: u32) -> Result<u32, RegionError> {
    requested
        .max(1)
        .checked_next_power_of_two()
        .ok_or(RegionError::InvalidConfig("slot count too large"))
}

/// Computes the slot stride: header plus payload, rounded up to 8 bytes.
///
/// Payloads below 8 bytes are clamped up so every stride leaves at least
/// 8 usable payload bytes.
pub fn normalize_slot_stride(payload_size: u32) -> u32 {
    let payload = payload_size.max(8);
    align_up(SLOT_HEADER_SIZE as u64 + payload as u64, 8) as u32
}

fn encode_topic_name(name: &str) -> Result<[u8; MAX_TOPIC_NAME], RegionError> {
    if name.is_empty() {
        return Err(RegionError::InvalidConfig("empty topic name"));
    }
    // one byte reserved for the NUL terminator
    if name.len() >= MAX_TOPIC_NAME {
        return Err(RegionError::InvalidConfig("topic name longer than 63 bytes"));
    }
    let mut out = [0u8; MAX_TOPIC_NAME];
    out[..name.len()].copy_from_slice(name.as_bytes());
    Ok(out)
}
