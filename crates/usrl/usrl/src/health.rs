//! Health snapshots for publisher and subscriber handles.

/// Subscriber lag (in messages) above which a handle reports unhealthy.
pub const HEALTHY_LAG_THRESHOLD: u64 = 100;

/// Point-in-time view of one handle's counters.
///
/// All counters are handle-local: `operations` is successful sends or
/// receives, `errors` is drops/timeouts for publishers and
/// truncations-plus-overrun-skips for subscribers. `lag` is always 0 for
/// publishers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub operations: u64,
    pub errors: u64,
    /// Successful operations per second since the handle was created.
    pub rate_hz: f64,
    pub lag: u64,
    pub healthy: bool,
}
