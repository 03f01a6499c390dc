//! `usrl`: the unified facade over the shared-memory pub/sub core.
//!
//! Binds publishers and subscribers to named topics: derives the region
//! backing file from the topic name, initializes or attaches the region,
//! allocates advisory publisher ids, wires the rate limiter around the
//! publish path, and surfaces health counters per handle.
//!
//! # Example
//!
//! ```ignore
//! use usrl::{Context, PublisherConfig, SystemConfig};
//!
//! let ctx = Context::new(SystemConfig::default());
//!
//! // Publisher side: creates the topic region on first use.
//! let mut publisher = ctx.publisher(PublisherConfig::new("demo"))?;
//! publisher.send(b"hello")?;
//!
//! // Subscriber side (same or another process): attach-only.
//! let mut sub = ctx.subscriber("demo")?;
//! let mut buf = [0u8; 1024];
//! if let Some(msg) = sub.recv(&mut buf)? {
//!     println!("{} bytes from publisher {}", msg.len, msg.pub_id);
//! }
//! ```
//!
//! Handles are destroyed by dropping them; that unmaps the process's view
//! and never unlinks the region. [`Context::remove_region`] is the explicit
//! destructive tool.

mod context;
mod error;
mod health;
mod publisher;
mod subscriber;

pub use context::{Context, MIN_REGION_MIB, SystemConfig};
pub use error::SendError;
pub use health::{HEALTHY_LAG_THRESHOLD, Health};
pub use publisher::{Publisher, PublisherConfig};
pub use subscriber::Subscriber;

// Core vocabulary re-exported so facade users rarely need usrl-core
// directly.
pub use usrl_core::{Message, RecvError, RegionError, RingKind};
