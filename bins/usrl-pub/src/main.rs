//! Demo publisher: creates (or attaches to) the `demo` topic and publishes
//! a numbered message at roughly 1 kHz.

use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use usrl::{Context, PublisherConfig, SystemConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")),
        )
        .init();

    let ctx = Context::new(SystemConfig {
        app_name: "usrl-pub".into(),
        ..SystemConfig::default()
    });

    let mut publisher = ctx.publisher(PublisherConfig::new("demo"))?;
    info!(pub_id = publisher.pub_id(), "publishing on 'demo'");

    let mut count: u64 = 0;
    loop {
        let msg = format!("Hello World #{count} from ID {}", publisher.pub_id());
        match publisher.send(msg.as_bytes()) {
            Ok(()) => {
                count += 1;
                if count % 1000 == 0 {
                    let health = publisher.health();
                    info!(count, rate_hz = health.rate_hz, "sent");
                }
            }
            Err(e) => warn!(error = %e, "send failed"),
        }

        // ~1 kHz
        std::thread::sleep(Duration::from_millis(1));
    }
}
