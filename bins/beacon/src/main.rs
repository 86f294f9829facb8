use anyhow::Context;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use vigil_cnc::{
    ControlLayout, Handshake, MajorVersionCheck, SemanticVersion, TracingLogger, now_ms,
};
use vigil_config::VigilConfig;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => VigilConfig::load(path)?,
        None => VigilConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let version: SemanticVersion = config.protocol_version.parse()?;
    let layout = ControlLayout::new(config.version_field_offset, config.timestamp_field_offset)?;
    let handshake = Handshake::new(layout)
        .timeout_ms(config.timeout_ms)
        .version_check(MajorVersionCheck::new(version))
        .warn_if_directory_exists(config.warn_if_directory_exists)
        .logger(TracingLogger);

    let cnc = handshake
        .create_in_directory(
            &config.cnc_dir,
            &config.filename,
            config.total_file_length,
            config.dir_delete_on_start,
        )
        .context("failed to create cnc file")?;

    // pid and start time go right after the control fields
    let payload_offset = layout.required_len().next_multiple_of(8);
    {
        let buffer = cnc.buffer()?;
        if buffer.capacity() >= payload_offset + 16 {
            buffer.put_i64(payload_offset, i64::from(std::process::id()));
            buffer.put_i64(payload_offset + 8, now_ms());
        }
    }
    cnc.timestamp_ordered(now_ms())?;
    cnc.signal_ready(version.to_i32())?;

    info!(
        "BEACON: publishing version {version} in {}/{} (heartbeat every {} ms)",
        config.cnc_dir, config.filename, config.heartbeat_interval_ms
    );

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::Release))
        .context("failed to install ctrl-c handler")?;

    let interval = Duration::from_millis(config.heartbeat_interval_ms);
    let mut last = Instant::now();
    let mut beats: u64 = 0;

    while running.load(Ordering::Acquire) {
        cnc.timestamp_ordered(now_ms())?;
        beats += 1;

        if last.elapsed() >= Duration::from_secs(10) {
            debug!(beats, "BEACON: heartbeat");
            last = Instant::now();
        }

        thread::sleep(interval);
    }

    cnc.close();
    cnc.delete_directory(true)?;
    info!(beats, "BEACON: stopped, cnc directory removed");
    Ok(())
}
