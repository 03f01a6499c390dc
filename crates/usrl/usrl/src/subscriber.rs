//! Subscriber facade: attach-only binding plus health accounting on top of
//! the core consume path.

use crate::context::Context;
use crate::health::{HEALTHY_LAG_THRESHOLD, Health};
use std::time::Instant;
use tracing::{debug, warn};
use usrl_core::{Message, RecvError, Region, RegionError, Subscriber as CoreSubscriber};

/// An active subscriber bound to one topic.
///
/// Subscribers never create regions: if no publisher has laid the topic
/// out yet, creation fails and the caller retries on its own schedule.
pub struct Subscriber {
    topic: String,
    core: CoreSubscriber,
    operations: u64,
    truncations: u64,
    started: Instant,
}

impl Subscriber {
    pub(crate) fn create(ctx: &Context, topic: &str) -> Result<Self, RegionError> {
        let path = ctx.region_path(topic);
        let region = match Region::attach(&path) {
            Ok(r) => r,
            Err(e) => {
                warn!(topic, path = %path.display(), error = %e, "subscriber attach failed");
                return Err(e);
            }
        };
        let core = CoreSubscriber::attach(region, topic)?;
        debug!(topic, "subscriber attached");
        Ok(Self {
            topic: topic.to_owned(),
            core,
            operations: 0,
            truncations: 0,
            started: Instant::now(),
        })
    }

    /// Poll for the next message. `Ok(None)` means nothing new is
    /// committed; truncation consumes the slot and is counted against this
    /// handle's health.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<Option<Message>, RecvError> {
        match self.core.try_next(buf) {
            Ok(Some(msg)) => {
                self.operations += 1;
                Ok(Some(msg))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.truncations += 1;
                Err(e)
            }
        }
    }

    pub fn health(&self) -> Health {
        let errors = self.truncations + self.core.skipped();
        let lag = self.core.lag();
        let elapsed = self.started.elapsed().as_secs_f64();
        Health {
            operations: self.operations,
            errors,
            rate_hz: if elapsed > 0.0 {
                self.operations as f64 / elapsed
            } else {
                0.0
            },
            lag,
            healthy: lag < HEALTHY_LAG_THRESHOLD && errors == 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Messages lost to overruns since attach.
    pub fn skipped(&self) -> u64 {
        self.core.skipped()
    }
}
