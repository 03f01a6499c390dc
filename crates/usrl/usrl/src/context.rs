//! System context: names the region directory, carries process-wide
//! defaults, and mints publisher/subscriber handles.

use crate::publisher::{Publisher, PublisherConfig};
use crate::subscriber::Subscriber;
use std::io;
use std::path::PathBuf;
use tracing::info;
use usrl_core::RegionError;

/// Minimum accepted default region size in MiB.
pub const MIN_REGION_MIB: u32 = 8;

/// Process-wide configuration handed to [`Context::new`].
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub app_name: String,
    /// Directory holding region backing files. Defaults to `/dev/shm` when
    /// it exists, the temp dir otherwise.
    pub shm_dir: Option<PathBuf>,
    /// Default region size in MiB for newly created regions; clamped to at
    /// least [`MIN_REGION_MIB`].
    pub default_region_mib: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            app_name: "usrl_app".into(),
            shm_dir: None,
            default_region_mib: 64,
        }
    }
}

/// Root handle for one process's use of USRL.
///
/// Creating handles goes through the context so every region file lands in
/// one directory under one naming convention. Dropping the context releases
/// nothing shared: regions persist until explicitly removed.
pub struct Context {
    app_name: String,
    shm_dir: PathBuf,
    default_region_mib: u32,
}

impl Context {
    pub fn new(config: SystemConfig) -> Self {
        let shm_dir = config.shm_dir.unwrap_or_else(default_shm_dir);
        let ctx = Self {
            app_name: config.app_name,
            shm_dir,
            default_region_mib: config.default_region_mib.max(MIN_REGION_MIB),
        };
        info!(app = %ctx.app_name, dir = %ctx.shm_dir.display(), "usrl system initialized");
        ctx
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Adjust the default region size for subsequently created publishers.
    /// Values below [`MIN_REGION_MIB`] are clamped up.
    pub fn set_default_region_mib(&mut self, mib: u32) {
        self.default_region_mib = mib.max(MIN_REGION_MIB);
    }

    pub fn default_region_mib(&self) -> u32 {
        self.default_region_mib
    }

    /// Backing file for `topic`: `<shm_dir>/usrl-<topic>`.
    pub fn region_path(&self, topic: &str) -> PathBuf {
        self.shm_dir.join(format!("usrl-{topic}"))
    }

    /// Create a publisher, initializing the topic's region on first use and
    /// attaching when another process already created it.
    pub fn publisher(&self, config: PublisherConfig) -> Result<Publisher, RegionError> {
        Publisher::create(self, config)
    }

    /// Attach a subscriber to an existing topic region. Fails if no
    /// publisher has initialized the region yet.
    pub fn subscriber(&self, topic: &str) -> Result<Subscriber, RegionError> {
        Subscriber::create(self, topic)
    }

    /// Unlink a topic's backing file.
    ///
    /// Destructive: peers still mapped keep their views, but new
    /// participants will re-initialize from scratch. Never called
    /// implicitly by handle teardown.
    pub fn remove_region(&self, topic: &str) -> io::Result<()> {
        let path = self.region_path(topic);
        info!(topic, path = %path.display(), "removing region backing file");
        std::fs::remove_file(path)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        info!(app = %self.app_name, "usrl system shutdown");
    }
}

fn default_shm_dir() -> PathBuf {
    let dev_shm = PathBuf::from("/dev/shm");
    if dev_shm.is_dir() {
        dev_shm
    } else {
        std::env::temp_dir()
    }
}
