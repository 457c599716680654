//! waypost-replay: run a recorded track through the geofence monitor.
//!
//! Prints every published event as one JSON line on stdout; logs go to
//! stderr.

mod track;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use track::{load_track, ReplaySource};
use tracing_subscriber::EnvFilter;
use waypost_events::{bus_callbacks, spawn_state_forwarder, EventBus, GeofenceEvent};
use waypost_fence::{Event, GeofenceMonitor, MonitorConfig};
use waypost_permissions::StaticPermissions;

/// How long to wait for the classifier to catch up with one fix.
const SAMPLE_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "waypost-replay")]
#[command(about = "Replay a recorded track against an event's primary boundary")]
struct Cmd {
    /// Event JSON (id, start_time, boundaries)
    #[arg(long)]
    event: PathBuf,

    /// Track JSON: array of {lat, lon, timestamp, accuracy_m?}
    #[arg(long)]
    track: PathBuf,

    /// Monitor config JSON; defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulate a user who only grants foreground location access
    #[arg(long)]
    deny_background: bool,

    /// Also print monitor state changes
    #[arg(long)]
    states: bool,
}

/// Writes each event as `{"topic": ..., "payload": ...}` on stdout.
struct JsonLinesBus;

impl EventBus for JsonLinesBus {
    fn publish(&self, event: GeofenceEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(topic = event.topic(), error = %e, "failed to encode event"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,waypost=debug")),
        )
        .init();

    let cmd = Cmd::parse();
    run(cmd).await
}

async fn run(cmd: Cmd) -> Result<()> {
    let config = match &cmd.config {
        Some(path) => load_config(path)?,
        None => MonitorConfig::default(),
    };
    let event = load_event(&cmd.event)?;
    let fixes = load_track(&cmd.track)?;

    tracing::info!(
        event = %event.id,
        boundaries = event.boundaries.len(),
        fixes = fixes.len(),
        active = event.is_active(),
        "replay loaded"
    );

    let bus: Arc<dyn EventBus> = Arc::new(JsonLinesBus);
    let source = Arc::new(ReplaySource::new(fixes[0]));
    let permissions = if cmd.deny_background {
        StaticPermissions::foreground_only()
    } else {
        StaticPermissions::granted()
    };

    let monitor = GeofenceMonitor::new(
        config,
        source.clone(),
        Arc::new(permissions),
        bus_callbacks(bus.clone()),
    )?
    .with_background(source.clone());

    let forwarder = cmd
        .states
        .then(|| spawn_state_forwarder(bus.clone(), monitor.subscribe()));

    monitor.set_event(&event).await?;
    if !monitor.start_monitoring().await? {
        tracing::warn!("monitoring did not start, nothing to replay");
        return Ok(());
    }

    let sink = source
        .take_sink()
        .context("Monitor started without a foreground stream")?;

    for fix in &fixes {
        let expected = monitor.stats().classified + 1;
        if !sink.deliver(*fix) {
            tracing::warn!(timestamp = fix.timestamp, "fix rejected by location stream");
            continue;
        }
        settle(&monitor, expected).await?;
    }

    monitor.stop_monitoring().await;

    let stats = monitor.stats();
    tracing::info!(
        classified = stats.classified,
        transitions = stats.transitions,
        dropped = stats.dropped,
        "replay finished"
    );

    // Flushes queued enter/exit lines and releases the state channel.
    monitor.shutdown().await;
    if let Some(forwarder) = forwarder {
        forwarder.await.context("State forwarder failed")?;
    }
    Ok(())
}

/// Wait until the classifier has processed `expected` fixes.
async fn settle(monitor: &GeofenceMonitor, expected: u64) -> Result<()> {
    tokio::time::timeout(SAMPLE_SETTLE_TIMEOUT, async {
        while monitor.stats().classified < expected {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .context("Classifier stalled")
}

fn load_config(path: &Path) -> Result<MonitorConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    MonitorConfig::from_json_str(&raw)
        .with_context(|| format!("Invalid config {}", path.display()))
}

fn load_event(path: &Path) -> Result<Event> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse event {}", path.display()))
}
