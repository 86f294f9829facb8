//! End-to-end two-process test of the CnC handshake.
//!
//! The test executable re-spawns itself twice with a role in the environment:
//!
//! ```text
//!                    Time -->
//!
//! [Owner]    --[create]--[payload]--[signal_ready]--[heartbeat ...]--[exit]
//!                  |                      |              |
//!                  v                      v              v
//!              [cnc file]           (acquire reads of version / timestamp)
//!                  ^                      ^              ^
//!                  |                      |              |
//! [Watcher]  ----[wait for file]----[await version]--[is_active ...]--[stale]
//! ```
//!
//! Once both children exit, the orchestrator adopts the now stale file.
//!
//! ```bash
//! cargo test -p vigil-cnc --test e2e_two_process -- --nocapture
//! ```

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use vigil_cnc::{ControlLayout, Handshake, MajorVersionCheck, SemanticVersion, now_ms};

/// Writes to stderr with immediate flush to bypass test output capture.
macro_rules! log {
    ($($arg:tt)*) => {{
        let _ = writeln!(std::io::stderr(), $($arg)*);
        let _ = std::io::stderr().flush();
    }};
}

const ENV_ROLE: &str = "VIGIL_E2E_ROLE";
const ENV_DIR: &str = "VIGIL_E2E_DIR";
const ROLE_OWNER: &str = "owner";
const ROLE_WATCHER: &str = "watcher";

const FILENAME: &str = "cnc.dat";
const TOTAL_LEN: usize = 4096;
const PAYLOAD_OFFSET: usize = 64;
const VERSION: SemanticVersion = SemanticVersion::new(1, 2, 0);

/// How long the owner keeps its heartbeat going.
const OWNER_LIFETIME: Duration = Duration::from_millis(800);
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);
const LIVENESS_TIMEOUT_MS: i64 = 200;

fn handshake(timeout_ms: i64) -> Handshake {
    Handshake::new(ControlLayout::new(0, 8).unwrap())
        .timeout_ms(timeout_ms)
        .version_check(MajorVersionCheck::new(VERSION))
}

fn run_owner(dir: &Path) {
    log!("[OWNER] creating cnc file in {}", dir.display());
    let cnc = handshake(LIVENESS_TIMEOUT_MS)
        .create_in_directory(dir, FILENAME, TOTAL_LEN, false)
        .expect("owner: failed to create cnc file");

    cnc.buffer()
        .expect("owner: closed")
        .put_i64(PAYLOAD_OFFSET, i64::from(std::process::id()));
    cnc.timestamp_ordered(now_ms()).unwrap();
    cnc.signal_ready(VERSION.to_i32()).unwrap();
    log!("[OWNER] published version {VERSION}");

    let start = Instant::now();
    let mut beats = 0u64;
    while start.elapsed() < OWNER_LIFETIME {
        cnc.timestamp_ordered(now_ms()).unwrap();
        beats += 1;
        thread::sleep(HEARTBEAT_INTERVAL);
    }

    cnc.close();
    log!("[OWNER] stopped after {beats} heartbeats");
}

fn run_watcher(dir: &Path) {
    log!("[WATCHER] waiting for cnc file in {}", dir.display());
    let handshake = handshake(LIVENESS_TIMEOUT_MS);
    let attach = handshake.clone().timeout_ms(5_000);
    let cnc = attach
        .open_existing(dir, FILENAME)
        .expect("watcher: failed to attach");

    assert_eq!(cnc.version_volatile().unwrap(), VERSION.to_i32());
    let owner_pid = cnc.buffer().unwrap().get_i64(PAYLOAD_OFFSET);
    assert_ne!(owner_pid, 0, "payload written before publish must be visible");
    log!("[WATCHER] attached to owner pid {owner_pid}");

    assert!(cnc.is_active(&handshake).unwrap(), "owner should be alive");

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut active_checks = 0u64;
    while cnc.is_active(&handshake).unwrap() {
        active_checks += 1;
        assert!(Instant::now() < deadline, "owner never went stale");
        thread::sleep(Duration::from_millis(20));
    }

    log!("[WATCHER] owner went stale after {active_checks} active checks");
}

fn scratch_dir() -> PathBuf {
    env::temp_dir().join(format!("vigil_e2e_{}", std::process::id()))
}

#[test]
fn e2e_owner_and_watcher_processes() {
    if let Ok(role) = env::var(ENV_ROLE) {
        let dir = PathBuf::from(env::var(ENV_DIR).expect("VIGIL_E2E_DIR not set"));
        match role.as_str() {
            ROLE_OWNER => run_owner(&dir),
            ROLE_WATCHER => run_watcher(&dir),
            other => panic!("Unknown role: {other}"),
        }
        return;
    }

    let dir = scratch_dir();
    let _ = std::fs::remove_dir_all(&dir);
    let exe = env::current_exe().expect("Failed to get current executable path");

    let spawn = |role: &str| {
        Command::new(&exe)
            .arg("--exact")
            .arg("e2e_owner_and_watcher_processes")
            .arg("--nocapture")
            .env(ENV_ROLE, role)
            .env(ENV_DIR, &dir)
            .stderr(Stdio::inherit())
            .spawn()
            .expect("Failed to spawn child process")
    };

    // The watcher goes first so that it genuinely waits for the file.
    let mut watcher = spawn(ROLE_WATCHER);
    thread::sleep(Duration::from_millis(50));
    let mut owner = spawn(ROLE_OWNER);

    let owner_status = owner.wait().expect("Failed to wait for owner");
    let watcher_status = watcher.wait().expect("Failed to wait for watcher");
    log!("[ORCHESTRATOR] owner: {owner_status}, watcher: {watcher_status}");

    let adopted = handshake(LIVENESS_TIMEOUT_MS).create_or_adopt(dir.join(FILENAME), TOTAL_LEN, true);
    let _ = std::fs::remove_dir_all(&dir);

    assert!(owner_status.success(), "Owner process failed: {owner_status}");
    assert!(watcher_status.success(), "Watcher process failed: {watcher_status}");
    let adopted = adopted.expect("stale cnc file should be adoptable");
    assert_eq!(adopted.version_volatile().unwrap(), VERSION.to_i32());
}
