//! Demo subscriber: attaches to the `demo` topic and reports its read rate
//! and loss counters once per second.

use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use usrl::{Context, SystemConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")),
        )
        .init();

    let ctx = Context::new(SystemConfig {
        app_name: "usrl-sub".into(),
        ..SystemConfig::default()
    });

    // the publisher creates the region; retry until it shows up
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut sub = loop {
        match ctx.subscriber("demo") {
            Ok(s) => break s,
            Err(_) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => anyhow::bail!("could not attach to 'demo' (start usrl-pub first): {e}"),
        }
    };
    info!("listening on 'demo'");

    let mut buf = [0u8; 1024];
    let mut window_count: u64 = 0;
    let mut last_report = Instant::now();

    loop {
        match sub.recv(&mut buf) {
            Ok(Some(msg)) => {
                window_count += 1;
                if window_count % 1000 == 0 {
                    info!(
                        pub_id = msg.pub_id,
                        payload = %String::from_utf8_lossy(&buf[..msg.len]),
                        "received"
                    );
                }
            }
            Ok(None) => std::thread::sleep(Duration::from_micros(100)),
            Err(e) => warn!(error = %e, "recv failed"),
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            let health = sub.health();
            info!(
                rate_hz = health.rate_hz,
                lag = health.lag,
                skipped = sub.skipped(),
                healthy = health.healthy,
                "stats"
            );
            window_count = 0;
            last_report = Instant::now();
        }
    }
}
