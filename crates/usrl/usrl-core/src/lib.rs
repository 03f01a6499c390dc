//! `usrl-core`: zero-copy shared-memory pub/sub rings.
//!
//! This crate provides the core of USRL: named topics backed by
//! power-of-two rings of fixed-size slots inside a single shared-memory
//! region, with lock-free publishers and polling subscribers, suited for:
//! - Fan-out of small messages between processes on one host
//! - Single-writer (SWMR) and multi-writer (MWMR) topics
//! - At-most-once delivery with explicit lag/overrun accounting
//!
//! # Core Components
//!
//! - [`Region`]: creates or attaches a self-describing shared-memory region
//! - [`SwmrPublisher`] / [`MwmrPublisher`]: lock-free publish handles
//! - [`Subscriber`]: polling consume handle with a local cursor
//! - [`PublishQuota`]: fixed-window rate limiter for flow control
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐      shared memory region      ┌──────────────┐
//! │ SwmrPublisher │ ───────────────────────────────│  Subscriber  │
//! │  (Process A)  │   header │ topics │ rings │    │ (Process B)  │
//! └───────────────┘   slot arrays (mmap)           └──────────────┘
//! ┌───────────────┐                                ┌──────────────┐
//! │ MwmrPublisher │ ──── same region, other topic ─│  Subscriber  │
//! │  (Process C)  │                                │ (Process D)  │
//! └───────────────┘                                └──────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use usrl_core::{Region, RingKind, Subscriber, SwmrPublisher, TopicConfig};
//!
//! // One process lays the region out; racers attach.
//! let topics = [TopicConfig {
//!     name: "demo".into(),
//!     slot_count: 64,
//!     payload_size: 256,
//!     kind: RingKind::Swmr,
//! }];
//! let region = Region::init("/dev/shm/usrl-demo", 64 << 20, &topics)?.into_region();
//! let mut publisher = SwmrPublisher::attach(region, "demo", 1)?;
//! publisher.publish(b"hello")?;
//!
//! // Subscribers map their own view.
//! let mut sub = Subscriber::attach(Region::attach("/dev/shm/usrl-demo")?, "demo")?;
//! let mut buf = [0u8; 256];
//! if let Some(msg) = sub.try_next(&mut buf)? {
//!     println!("got {} bytes from pub {}", msg.len, msg.pub_id);
//! }
//! ```
//!
//! # Internal Modules
//!
//! - `layout`: binary layout of the region and the placement planner
//! - `region`: region init/attach and the typed view over the mapping
//! - `ring`: slot addressing and the commit protocol
//! - `swmr` / `mwmr`: the two publish disciplines
//! - `sub`: the subscriber state machine
//! - `flow`: quota and backoff primitives
//! - `time`: monotonic clock

mod error;
mod flow;
mod layout;
mod mwmr;
mod region;
mod ring;
mod sub;
mod swmr;
mod time;

pub use error::{PublishError, RecvError, RegionError};
pub use flow::{
    PublishQuota, QUOTA_WINDOW_NS, backoff_exponential_ns, backoff_linear_us, is_lagging,
};
pub use layout::{
    LAYOUT_VERSION, LayoutPlan, MAX_TOPIC_NAME, MIN_REGION_SIZE, PlannedTopic, REGION_ALIGN,
    RegionHeader, RingDesc, RingKind, SLOT_HEADER_SIZE, SlotHeader, TopicConfig, TopicEntry,
    USRL_MAGIC, align_up, normalize_slot_count, normalize_slot_stride,
};
pub use mwmr::{MwmrPublisher, SLOT_WAIT_MAX_ITERS};
pub use region::{InitOutcome, Region};
pub use sub::{Message, Subscriber};
pub use swmr::SwmrPublisher;
pub use time::now_ns;
