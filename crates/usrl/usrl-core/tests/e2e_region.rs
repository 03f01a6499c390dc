//! End-to-end two-process integration test for a shared-memory region.
//!
//! # Overview
//!
//! Validates cross-process operation by spawning two independent OS
//! processes (publisher and subscriber) that communicate through one
//! region file **concurrently**: the subscriber consumes while the
//! publisher is still producing.
//!
//! # Test Architecture
//!
//! Uses a self-spawning pattern: the test executable re-invokes itself with
//! environment variables selecting each child's role.
//!
//! ```text
//!                    Time -->
//!
//! [Publisher] --[init region]--[publish ...]----------------[done]
//!                    |              |   |   |
//!                    v              v   v   v
//!               [region file]   (concurrent reads)
//!                    |              ^   ^   ^
//!                    v              |   |   |
//! [Subscriber] -----[attach]----[recv ...]------------------[done]
//! ```
//!
//! Concurrency is the point: it exercises the memory orderings, the
//! commit-sequence verification, and overrun recovery against a live
//! writer in another address space.
//!
//! # Running the Test
//!
//! ```bash
//! cargo test -p usrl-core --test e2e_region -- --nocapture
//! ```

use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Writes to stderr with immediate flush to bypass test output capture.
macro_rules! log {
    ($($arg:tt)*) => {{
        let _ = writeln!(std::io::stderr(), $($arg)*);
        let _ = std::io::stderr().flush();
    }};
}

const ENV_ROLE: &str = "USRL_E2E_ROLE";
const ENV_PATH: &str = "USRL_E2E_PATH";
const ROLE_PUBLISHER: &str = "publisher";
const ROLE_SUBSCRIBER: &str = "subscriber";

const MESSAGE_COUNT: u64 = 100_000;
const RING_SLOTS: u32 = 1 << 14;
const PAYLOAD_SIZE: u32 = 64;

/// Pacing keeps the two processes genuinely concurrent instead of
/// write-everything-then-read.
const BATCH_SIZE: u64 = 1_000;
const BATCH_DELAY_US: u64 = 100;

fn test_path() -> String {
    let pid = std::process::id();
    format!("/tmp/usrl_e2e_region_{pid}")
}

fn run_publisher(path: &str) {
    use usrl_core::{Region, RingKind, SwmrPublisher, TopicConfig};

    log!("[PUB] Initializing region");
    log!("[PUB]   path: {path}");
    log!("[PUB]   slots: {RING_SLOTS}, payload: {PAYLOAD_SIZE}");
    log!("[PUB]   messages: {MESSAGE_COUNT}");

    let topics = [TopicConfig {
        name: "bus".into(),
        slot_count: RING_SLOTS,
        payload_size: PAYLOAD_SIZE,
        kind: RingKind::Swmr,
    }];
    let region = Region::init(path, 16 << 20, &topics)
        .expect("publisher: region init failed")
        .into_region();
    let mut publisher =
        SwmrPublisher::attach(region, "bus", 42).expect("publisher: attach failed");

    let start = Instant::now();
    for i in 0..MESSAGE_COUNT {
        // payload = the 0-based message number; the reader checks it
        // against the commit sequence
        publisher
            .publish(&i.to_le_bytes())
            .expect("publisher: publish failed");

        if (i + 1) % BATCH_SIZE == 0 {
            std::thread::sleep(Duration::from_micros(BATCH_DELAY_US));
            if (i + 1) % 25_000 == 0 {
                let rate = (i + 1) as f64 / start.elapsed().as_secs_f64();
                log!("[PUB] Progress: {}/{} ({rate:.0} msg/s)", i + 1, MESSAGE_COUNT);
            }
        }
    }

    log!("[PUB] Complete: {MESSAGE_COUNT} messages in {:?}", start.elapsed());
}

fn run_subscriber(path: &str) {
    use usrl_core::{Region, Subscriber};

    log!("[SUB] Waiting for region at {path}");

    let open_deadline = Instant::now() + Duration::from_secs(5);
    let mut sub = loop {
        match Region::attach(path).and_then(|r| Subscriber::attach(r, "bus")) {
            Ok(s) => {
                log!("[SUB] Attached");
                break s;
            }
            Err(_) if Instant::now() < open_deadline => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => panic!("[SUB] attach failed: {e}"),
        }
    };

    let read_deadline = Instant::now() + Duration::from_secs(10);
    let mut buf = [0u8; PAYLOAD_SIZE as usize];
    let mut received: u64 = 0;
    let mut consecutive_empty: u32 = 0;
    let mut last_value: u64 = 0;

    while Instant::now() < read_deadline {
        match sub.try_next(&mut buf) {
            Ok(Some(msg)) => {
                consecutive_empty = 0;
                received += 1;

                let value = u64::from_le_bytes(buf[..8].try_into().unwrap());
                assert_eq!(
                    value,
                    msg.seq - 1,
                    "payload does not match its commit sequence"
                );
                assert_eq!(msg.pub_id, 42);
                assert!(value >= last_value || received == 1);
                last_value = value;
            }
            Ok(None) => {
                consecutive_empty += 1;
                if consecutive_empty > 10_000 && received > 0 {
                    log!("[SUB] No new messages, publisher appears done");
                    break;
                }
                std::hint::spin_loop();
            }
            Err(e) => panic!("[SUB] recv failed: {e}"),
        }
    }

    let skipped = sub.skipped();
    log!("[SUB] Complete");
    log!("[SUB]   received: {received}");
    log!("[SUB]   skipped (overruns): {skipped}");
    log!("[SUB]   accounted: {}", received + skipped);

    assert!(received > 0, "subscriber received nothing");
    assert!(
        received + skipped <= MESSAGE_COUNT,
        "delivered more than was published"
    );

    let coverage = received as f64 / MESSAGE_COUNT as f64 * 100.0;
    log!("[SUB] Coverage: {coverage:.1}% of published messages");
}

/// Two-process concurrent end-to-end test over one region file.
#[test]
fn e2e_two_process_region_bus() {
    if let Ok(role) = env::var(ENV_ROLE) {
        let path = env::var(ENV_PATH).expect("USRL_E2E_PATH not set");
        match role.as_str() {
            ROLE_PUBLISHER => run_publisher(&path),
            ROLE_SUBSCRIBER => run_subscriber(&path),
            other => panic!("Unknown role: {other}"),
        }
        return;
    }

    let path = test_path();
    let exe = env::current_exe().expect("Failed to get current executable path");

    log!("");
    log!("E2E Two-Process Region Bus Test");
    log!("Region: {path}, messages: {MESSAGE_COUNT}, slots: {RING_SLOTS}");
    log!("");

    log!("[ORCHESTRATOR] Spawning publisher...");
    let mut pub_proc = Command::new(&exe)
        .arg("--exact")
        .arg("e2e_two_process_region_bus")
        .env(ENV_ROLE, ROLE_PUBLISHER)
        .env(ENV_PATH, &path)
        .stderr(Stdio::inherit())
        .spawn()
        .expect("Failed to spawn publisher process");

    // Minimal delay; the subscriber retries until the region exists.
    std::thread::sleep(Duration::from_millis(5));

    log!("[ORCHESTRATOR] Spawning subscriber (concurrent with publisher)...");
    let mut sub_proc = Command::new(&exe)
        .arg("--exact")
        .arg("e2e_two_process_region_bus")
        .env(ENV_ROLE, ROLE_SUBSCRIBER)
        .env(ENV_PATH, &path)
        .stderr(Stdio::inherit())
        .spawn()
        .expect("Failed to spawn subscriber process");

    let pub_status = pub_proc.wait().expect("Failed to wait for publisher");
    let sub_status = sub_proc.wait().expect("Failed to wait for subscriber");

    let _ = std::fs::remove_file(&path);

    assert!(pub_status.success(), "publisher failed: {pub_status}");
    assert!(sub_status.success(), "subscriber failed: {sub_status}");

    log!("[ORCHESTRATOR] Concurrent test passed");
}
