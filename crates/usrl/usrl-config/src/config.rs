use serde::Deserialize;
use std::path::Path;

/// JSON system configuration for region initialization.
///
/// ```json
/// {
///   "region": "usrl_core",
///   "size_mib": 32,
///   "topics": [
///     { "name": "demo", "slots": 4096, "payload_size": 1024 },
///     { "name": "bus", "slots": 256, "payload_size": 256, "type": "mwmr" }
///   ]
/// }
/// ```
#[derive(Deserialize, Debug)]
pub struct SystemConfig {
    #[serde(default = "defaults::region")]
    pub region: String,
    #[serde(default = "defaults::size_mib")]
    pub size_mib: u32,
    pub topics: Vec<TopicSpec>,
}

/// One topic as configured externally. Slot counts and payload sizes are
/// requests; the core normalizes them at init.
#[derive(Deserialize, Debug)]
pub struct TopicSpec {
    pub name: String,
    pub slots: u32,
    pub payload_size: u32,
    /// `"swmr"` or `"mwmr"`; anything else is treated as SWMR.
    #[serde(default, rename = "type")]
    pub ring_type: String,
}

impl TopicSpec {
    pub fn is_mwmr(&self) -> bool {
        self.ring_type.eq_ignore_ascii_case("mwmr")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),
}

mod defaults {
    pub fn region() -> String {
        "usrl_core".into()
    }

    pub fn size_mib() -> u32 {
        64
    }
}

impl SystemConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: SystemConfig = serde_json::from_str(&json)?;
        Ok(config)
    }
}
