//! Recorded track as a position source.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use waypost_fence::{
    Accuracy, BackgroundDelivery, Location, LocationError, LocationSink, PositionSource,
    Subscription, WatchOptions,
};

/// Load a JSON array of fixes (`{"lat", "lon", "timestamp", "accuracy_m"?}`).
pub fn load_track(path: &Path) -> Result<Vec<Location>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read track {}", path.display()))?;
    let track: Vec<Location> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse track {}", path.display()))?;
    if track.is_empty() {
        bail!("Track {} has no fixes", path.display());
    }
    Ok(track)
}

/// Serves the first fix as the one-shot position and hands out the
/// foreground sink so the caller can push the rest.
pub struct ReplaySource {
    first: Location,
    sink: Mutex<Option<LocationSink>>,
}

impl ReplaySource {
    pub fn new(first: Location) -> Self {
        Self {
            first,
            sink: Mutex::new(None),
        }
    }

    /// Sink registered by the monitor, once monitoring has started.
    pub fn take_sink(&self) -> Option<LocationSink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[async_trait]
impl PositionSource for ReplaySource {
    async fn current_position(&self, _accuracy: Accuracy) -> Result<Location, LocationError> {
        Ok(self.first)
    }

    async fn watch_position(
        &self,
        _options: WatchOptions,
        sink: LocationSink,
    ) -> Result<Subscription, LocationError> {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        Ok(Subscription::new(|| tracing::debug!("replay stream removed")))
    }
}

/// Accepts registration; a replay has no OS background channel to feed.
#[async_trait]
impl BackgroundDelivery for ReplaySource {
    async fn start_background_updates(
        &self,
        task_id: &str,
        _options: WatchOptions,
        _sink: LocationSink,
    ) -> Result<(), LocationError> {
        tracing::debug!(task_id, "background delivery registered");
        Ok(())
    }

    async fn stop_background_updates(&self, task_id: &str) -> Result<(), LocationError> {
        tracing::debug!(task_id, "background delivery stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("waypost-{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_track() {
        let path = write_temp(
            "track.json",
            r#"[{"lat": 52.0, "lon": 4.0, "timestamp": 1}, {"lat": 52.1, "lon": 4.1, "timestamp": 2, "accuracy_m": 5.0}]"#,
        );
        let track = load_track(&path).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track[1].accuracy_m, Some(5.0));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_empty_track_fails() {
        let path = write_temp("empty.json", "[]");
        assert!(load_track(&path).is_err());
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_replay_source_serves_first_fix() {
        let source = ReplaySource::new(Location::new(1.0, 2.0, 3));
        let fix = source.current_position(Accuracy::High).await.unwrap();
        assert_eq!(fix.timestamp, 3);
        assert!(source.take_sink().is_none());
    }
}
