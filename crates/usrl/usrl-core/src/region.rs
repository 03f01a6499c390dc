//! Region creation, attach, and the typed view over the mapping.
//!
//! [`Region`] is the only way the rest of the crate touches shared memory:
//! it owns the mapping and resolves headers, topic entries, and ring
//! descriptors by offset. After init the region is immutable except for the
//! per-ring `w_head` atomics and the slots owned by their reserving writers,
//! so handing out shared references to the metadata is sound.

use crate::error::RegionError;
use crate::layout::{
    LAYOUT_VERSION, LayoutPlan, RegionHeader, RingDesc, TopicConfig, TopicEntry, USRL_MAGIC,
};
use std::io::ErrorKind;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering, fence};
use usrl_mmap::MmapFileMut;

/// Bound on how long a racing attacher waits for the winning creator to
/// finish laying the region out (yields per iteration).
const ATTACH_RACE_MAX_ITERS: u32 = 100_000;

/// Result of [`Region::init`]: either this caller laid the region out, or
/// another process got there first and we attached to its work.
#[derive(Debug)]
pub enum InitOutcome {
    Created(Region),
    AlreadyExists(Region),
}

impl InitOutcome {
    pub fn into_region(self) -> Region {
        match self {
            InitOutcome::Created(r) | InitOutcome::AlreadyExists(r) => r,
        }
    }
}

/// A mapped USRL region.
///
/// Every handle (publisher or subscriber) owns its own `Region`, i.e. its
/// own mapping of the backing file, mirroring how independent processes
/// each map the object. Dropping a `Region` unmaps the view; the backing
/// file is never unlinked here.
#[derive(Debug)]
pub struct Region {
    /// Owns the mmap lifetime; kept alive but not accessed after init.
    _mm: MmapFileMut,
    /// Raw pointer to the start of the mapped region.
    base: *mut u8,
    len: usize,
}

// SAFETY: all post-init mutation of the mapped bytes goes through atomics
// (`w_head`, slot `seq`) or through a slot exclusively reserved by one
// writer; the `Region` value itself holds no thread-affine state.
unsafe impl Send for Region {}

impl Region {
    /// Create the backing file and lay out the region, or attach if another
    /// process already created it.
    ///
    /// Creation is exclusive: concurrent initializers race on the file
    /// itself and exactly one wins; the losers attach to the winner's
    /// layout. The plan is computed before the file is created, so invalid
    /// or oversized configs fail with no backing store left behind.
    pub fn init<P: AsRef<Path>>(
        path: P,
        size: u64,
        topics: &[TopicConfig],
    ) -> Result<InitOutcome, RegionError> {
        let plan = LayoutPlan::compute(size, topics)?;

        let mut mm = match MmapFileMut::create_excl(&path, size) {
            Ok(mm) => mm,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(InitOutcome::AlreadyExists(Self::attach_racing(path)?));
            }
            Err(e) => return Err(RegionError::Backing(e)),
        };

        let base = mm.as_mut_ptr();
        let len = mm.len();

        // The file was just created exclusively and set_len left it zeroed:
        // every slot already reads seq = 0. Only the metadata needs writing.
        // The magic is stored last with release ordering, so an attacher
        // that observes it (with acquire) sees the complete layout.
        unsafe {
            ptr::write(
                base as *mut RegionHeader,
                RegionHeader {
                    magic: 0,
                    version: LAYOUT_VERSION,
                    mmap_size: size,
                    topic_table_offset: plan.topic_table_offset,
                    topic_count: plan.topics.len() as u32,
                    _pad: 0,
                },
            );

            for (i, t) in plan.topics.iter().enumerate() {
                let entry = (base.add(plan.topic_table_offset as usize) as *mut TopicEntry).add(i);
                ptr::write(
                    entry,
                    TopicEntry {
                        name: t.name,
                        ring_desc_offset: t.ring_desc_offset,
                        slot_count: t.slot_count,
                        slot_size: t.slot_stride,
                        kind: t.kind.as_raw(),
                        _pad: 0,
                    },
                );

                let desc = base.add(t.ring_desc_offset as usize) as *mut RingDesc;
                ptr::write(
                    desc,
                    RingDesc {
                        slot_count: t.slot_count,
                        slot_size: t.slot_stride,
                        base_offset: t.slots_offset,
                        w_head: AtomicU64::new(0),
                        _pad: [0; 32],
                    },
                );
            }

            fence(Ordering::Release);
            (*(base as *const AtomicU32)).store(USRL_MAGIC, Ordering::Release);
        }

        Ok(InitOutcome::Created(Region {
            _mm: mm,
            base,
            len,
        }))
    }

    /// Attach behind a lost creation race: the winner may still be writing
    /// the layout, so transient not-yet-valid states are retried with a
    /// yield until the magic appears.
    fn attach_racing<P: AsRef<Path>>(path: P) -> Result<Self, RegionError> {
        let mut iter: u32 = 0;
        loop {
            match Self::attach(&path) {
                Ok(region) => return Ok(region),
                Err(
                    RegionError::BadMagic(_)
                    | RegionError::Truncated
                    | RegionError::Backing(_),
                ) if iter < ATTACH_RACE_MAX_ITERS => {
                    iter += 1;
                    std::thread::yield_now();
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Map an existing region at the size the OS reports for its backing
    /// file and validate the header.
    pub fn attach<P: AsRef<Path>>(path: P) -> Result<Self, RegionError> {
        let mut mm = MmapFileMut::open_rw(path)?;
        let base = mm.as_mut_ptr();
        let len = mm.len();

        if len < size_of::<RegionHeader>() {
            return Err(RegionError::Truncated);
        }

        let region = Region {
            _mm: mm,
            base,
            len,
        };

        // Acquire-load the magic: observing it implies the creator's layout
        // writes (header, table, descriptors) are visible too.
        let magic = unsafe { (*(region.base as *const AtomicU32)).load(Ordering::Acquire) };
        if magic != USRL_MAGIC {
            return Err(RegionError::BadMagic(magic));
        }

        let h = region.header();
        if h.version != LAYOUT_VERSION {
            return Err(RegionError::BadVersion(h.version));
        }
        if h.mmap_size > len as u64 {
            return Err(RegionError::Truncated);
        }
        let table_end = h.topic_table_offset
            + h.topic_count as u64 * size_of::<TopicEntry>() as u64;
        if table_end > len as u64 {
            return Err(RegionError::Truncated);
        }

        Ok(region)
    }

    #[inline(always)]
    pub fn header(&self) -> &RegionHeader {
        // SAFETY: attach/init validated that the mapping holds a header;
        // the header is never mutated after init.
        unsafe { &*(self.base as *const RegionHeader) }
    }

    /// The topic table. Entries are immutable after init.
    pub fn topics(&self) -> &[TopicEntry] {
        let h = self.header();
        // SAFETY: attach/init validated table bounds; the table offset is
        // 64-aligned, which satisfies TopicEntry's alignment.
        unsafe {
            std::slice::from_raw_parts(
                self.base.add(h.topic_table_offset as usize) as *const TopicEntry,
                h.topic_count as usize,
            )
        }
    }

    pub fn find_topic(&self, name: &str) -> Option<&TopicEntry> {
        self.topics().iter().find(|t| t.name_matches(name))
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub(crate) fn base(&self) -> *mut u8 {
        self.base
    }
}
