use anyhow::{Context, bail};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigil_cnc::{
    ControlLayout, Handshake, MajorVersionCheck, SemanticVersion, TracingLogger, heartbeat_age,
    now_ms,
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

    let expected: SemanticVersion = config.protocol_version.parse()?;
    let layout = ControlLayout::new(config.version_field_offset, config.timestamp_field_offset)?;
    let handshake = Handshake::new(layout)
        .timeout_ms(config.timeout_ms)
        .version_check(MajorVersionCheck::new(expected))
        .logger(TracingLogger);

    info!("LOOKOUT: waiting for {}/{}", config.cnc_dir, config.filename);
    let cnc = handshake
        .open_existing(&config.cnc_dir, &config.filename)
        .context("no live owner to watch")?;

    let version = SemanticVersion::from_i32(cnc.version_volatile()?);
    let payload_offset = layout.required_len().next_multiple_of(8);
    let owner_pid = {
        let buffer = cnc.buffer()?;
        (buffer.capacity() >= payload_offset + 8).then(|| buffer.get_i64(payload_offset))
    };
    info!(%version, ?owner_pid, "LOOKOUT: attached");

    let interval = Duration::from_millis(config.heartbeat_interval_ms);
    while cnc.is_active(&handshake)? {
        let age_ms = heartbeat_age(now_ms(), cnc.timestamp_volatile()?);
        info!(age_ms, "LOOKOUT: owner alive");
        thread::sleep(interval);
    }

    warn!("LOOKOUT: owner heartbeat is older than {} ms", config.timeout_ms);
    cnc.close();
    bail!("owner of {}/{} is no longer active", config.cnc_dir, config.filename)
}
