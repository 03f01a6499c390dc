//! Region initializer: reads a JSON system config and lays out the shared
//! memory region for every configured topic. Run once before starting
//! publishers and subscribers that share a multi-topic region.

use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use usrl_config::SystemConfig;
use usrl_core::{InitOutcome, Region, RingKind, TopicConfig};

fn shm_dir() -> PathBuf {
    let dev_shm = PathBuf::from("/dev/shm");
    if dev_shm.is_dir() {
        dev_shm
    } else {
        std::env::temp_dir()
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "usrl_config.json".into());
    let config = SystemConfig::load(config_path)?;

    let topics: Vec<TopicConfig> = config
        .topics
        .iter()
        .map(|t| TopicConfig {
            name: t.name.clone(),
            slot_count: t.slots,
            payload_size: t.payload_size,
            kind: if t.is_mwmr() {
                RingKind::Mwmr
            } else {
                RingKind::Swmr
            },
        })
        .collect();

    let region_path = shm_dir().join(&config.region);
    let size = config.size_mib as u64 * 1024 * 1024;

    let outcome = Region::init(&region_path, size, &topics)?;
    let region = match outcome {
        InitOutcome::Created(r) => {
            info!(path = %region_path.display(), size, "region initialized");
            r
        }
        InitOutcome::AlreadyExists(r) => {
            info!(path = %region_path.display(), "region already exists; left untouched");
            r
        }
    };

    for entry in region.topics() {
        info!(
            topic = %String::from_utf8_lossy(entry.name_bytes()),
            slots = entry.slot_count,
            slot_size = entry.slot_size,
            kind = ?entry.kind(),
            "topic ready"
        );
    }

    Ok(())
}
