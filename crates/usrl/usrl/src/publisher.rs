//! Publisher facade: region setup, quota gating, and the block/drop policy
//! around the core publish paths.

use crate::context::Context;
use crate::error::SendError;
use crate::health::Health;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use usrl_core::{
    InitOutcome, MwmrPublisher, PublishError, PublishQuota, Region, RegionError, RingKind,
    SwmrPublisher, TopicConfig, backoff_exponential_ns, now_ns,
};

/// Advisory publisher ids, unique within this process. Cross-process
/// uniqueness is not needed; the id exists for telemetry.
static NEXT_PUB_ID: AtomicU16 = AtomicU16::new(1);

const DEFAULT_SLOT_COUNT: u32 = 4096;
const DEFAULT_SLOT_SIZE: u32 = 1024;

/// Per-publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub topic: String,
    pub ring: RingKind,
    /// Requested slots; 0 selects the default of 4096.
    pub slot_count: u32,
    /// Requested payload bytes per slot; 0 selects the default of 1024.
    pub slot_size: u32,
    /// Messages per second; 0 disables rate limiting.
    pub rate_limit_hz: u64,
    /// Throttle/contention policy: wait (`true`) or fail fast (`false`).
    pub block_on_full: bool,
}

impl PublisherConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ring: RingKind::Swmr,
            slot_count: 0,
            slot_size: 0,
            rate_limit_hz: 0,
            block_on_full: false,
        }
    }
}

enum RingHandle {
    Swmr(SwmrPublisher),
    Mwmr(MwmrPublisher),
}

/// An active publisher bound to one topic.
///
/// Creation either yields a live handle or an error; dropping it unmaps the
/// region view and leaves the region itself in place.
pub struct Publisher {
    topic: String,
    ring: RingHandle,
    quota: Option<PublishQuota>,
    block_on_full: bool,
    operations: u64,
    drops: u64,
    started: Instant,
}

impl Publisher {
    pub(crate) fn create(ctx: &Context, config: PublisherConfig) -> Result<Self, RegionError> {
        let slot_count = if config.slot_count > 0 {
            config.slot_count
        } else {
            DEFAULT_SLOT_COUNT
        };
        let slot_size = if config.slot_size > 0 {
            config.slot_size
        } else {
            DEFAULT_SLOT_SIZE
        };

        // Size the backing object generously: the ring itself plus slack,
        // but never below the process-wide default.
        let ring_bytes = slot_count as u64 * slot_size as u64 + (1 << 20);
        let region_size = ring_bytes.max(ctx.default_region_mib() as u64 * 1024 * 1024);

        let path = ctx.region_path(&config.topic);
        let topics = [TopicConfig {
            name: config.topic.clone(),
            slot_count,
            payload_size: slot_size,
            kind: config.ring,
        }];

        let region = match Region::init(&path, region_size, &topics) {
            Ok(InitOutcome::Created(r)) => {
                debug!(topic = %config.topic, size = region_size, "region created");
                r
            }
            Ok(InitOutcome::AlreadyExists(r)) => {
                debug!(topic = %config.topic, "region exists; attaching");
                r
            }
            Err(e) => {
                warn!(topic = %config.topic, error = %e, "region init failed");
                return Err(e);
            }
        };

        let pub_id = NEXT_PUB_ID.fetch_add(1, Ordering::Relaxed);
        let ring = match config.ring {
            RingKind::Swmr => RingHandle::Swmr(SwmrPublisher::attach(region, &config.topic, pub_id)?),
            RingKind::Mwmr => RingHandle::Mwmr(MwmrPublisher::attach(region, &config.topic, pub_id)?),
        };

        info!(
            topic = %config.topic,
            pub_id,
            ring = ?config.ring,
            rate_limit_hz = config.rate_limit_hz,
            "publisher active"
        );

        Ok(Self {
            topic: config.topic,
            ring,
            quota: (config.rate_limit_hz > 0).then(|| PublishQuota::new(config.rate_limit_hz)),
            block_on_full: config.block_on_full,
            operations: 0,
            drops: 0,
            started: Instant::now(),
        })
    }

    /// Publish one message under the configured flow-control policy.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), SendError> {
        if let Some(quota) = self.quota.as_mut() {
            if self.block_on_full {
                while !quota.try_acquire(now_ns()) {
                    std::thread::sleep(Duration::from_nanos(backoff_exponential_ns(1)));
                }
            } else if !quota.try_acquire(now_ns()) {
                self.drops += 1;
                return Err(SendError::Dropped);
            }
        }

        loop {
            let result = match &mut self.ring {
                RingHandle::Swmr(p) => p.publish(payload),
                RingHandle::Mwmr(p) => p.publish(payload),
            };

            match result {
                Ok(_) => {
                    self.operations += 1;
                    return Ok(());
                }
                Err(PublishError::TooLarge { len, max }) => {
                    return Err(SendError::TooLarge { len, max });
                }
                Err(PublishError::Timeout(_)) if self.block_on_full => {
                    std::thread::sleep(Duration::from_micros(1));
                }
                Err(PublishError::Timeout(_)) => {
                    self.drops += 1;
                    return Err(SendError::Timeout);
                }
            }
        }
    }

    pub fn health(&self) -> Health {
        let elapsed = self.started.elapsed().as_secs_f64();
        Health {
            operations: self.operations,
            errors: self.drops,
            rate_hz: if elapsed > 0.0 {
                self.operations as f64 / elapsed
            } else {
                0.0
            },
            lag: 0,
            healthy: self.drops == 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn pub_id(&self) -> u16 {
        match &self.ring {
            RingHandle::Swmr(p) => p.pub_id(),
            RingHandle::Mwmr(p) => p.pub_id(),
        }
    }

    /// Throttle events recorded by the rate limiter, if one is configured.
    pub fn total_throttled(&self) -> u64 {
        self.quota.as_ref().map_or(0, PublishQuota::total_throttled)
    }
}
