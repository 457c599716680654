//! Location sample bus.
//!
//! The streaming channels (foreground watch, background delivery) write into
//! one bounded queue read by a single consumer, so streamed fixes are
//! classified in one total order whatever channel they came from. One-shot
//! fetches bypass the queue; the monitor classifies them inline under the
//! same lock the consumer uses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use waypost_geo::Coordinate;

/// Default queue capacity in samples.
pub const DEFAULT_CAPACITY: usize = 64;

/// A position fix as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    /// Horizontal accuracy radius in meters, if the platform reports one.
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    /// Fix time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Location {
    pub fn new(lat: f64, lon: f64, timestamp: i64) -> Self {
        Self {
            lat,
            lon,
            accuracy_m: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// Which delivery path produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleChannel {
    /// Explicit single fetch (start-up check or manual refresh). Never
    /// queued; only used to tag classifications.
    OneShot,
    /// Continuous subscription while the app is active.
    Foreground,
    /// OS-delivered batches while the app is suspended.
    Background,
}

impl fmt::Display for SampleChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SampleChannel::OneShot => "one_shot",
            SampleChannel::Foreground => "foreground",
            SampleChannel::Background => "background",
        };
        f.write_str(label)
    }
}

/// A location tagged with its position in the stream.
#[derive(Debug, Clone)]
pub struct LocationSample {
    /// Monotonic sequence number assigned at send time.
    pub seq: u64,
    pub channel: SampleChannel,
    pub location: Location,
}

/// Configuration for the location bus.
#[derive(Debug, Clone)]
pub struct LocationBusConfig {
    /// Maximum number of queued samples before new ones are dropped.
    pub capacity: usize,
}

/// Sender half of the bus. Only reachable through [`LocationSink`]s.
#[derive(Clone)]
pub struct LocationBusSender {
    tx: mpsc::Sender<LocationSample>,
    seq_counter: Arc<AtomicU64>,
    stats: Arc<SampleStats>,
}

impl LocationBusSender {
    /// Queue a location, dropping it if the bus is full.
    ///
    /// Returns true if queued, false if dropped or the bus is closed.
    fn send(&self, channel: SampleChannel, location: Location) -> bool {
        let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed);
        let sample = LocationSample {
            seq,
            channel,
            location,
        };

        match self.tx.try_send(sample) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // Only log every 10th drop.
                if dropped % 10 == 1 {
                    tracing::warn!(dropped, seq, %channel, "Location bus full, dropping samples");
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!(seq, %channel, "Location bus closed");
                false
            }
        }
    }

    /// A sink bound to one delivery channel, handed to a position provider.
    pub fn sink(&self, channel: SampleChannel) -> LocationSink {
        LocationSink {
            sender: self.clone(),
            channel,
        }
    }
}

/// Producer-side handle for a single delivery channel.
///
/// Position providers only see this; they can push fixes but can't read
/// the stream or forge another channel's samples.
#[derive(Clone)]
pub struct LocationSink {
    sender: LocationBusSender,
    channel: SampleChannel,
}

impl LocationSink {
    pub fn channel(&self) -> SampleChannel {
        self.channel
    }

    /// Push one fix. Returns false if it was dropped or the bus is closed.
    pub fn deliver(&self, location: Location) -> bool {
        self.sender.send(self.channel, location)
    }

    /// Push a batch of fixes in timestamp order.
    ///
    /// Background delivery hands over batches that are not guaranteed to be
    /// sorted. Returns the number of fixes accepted.
    pub fn deliver_batch(&self, mut locations: Vec<Location>) -> usize {
        locations.sort_by_key(|l| l.timestamp);
        locations
            .into_iter()
            .filter(|location| self.deliver(*location))
            .count()
    }

    /// True once the consumer has gone away (monitoring stopped).
    pub fn is_closed(&self) -> bool {
        self.sender.tx.is_closed()
    }
}

/// Receiver half of the bus.
pub struct LocationBusReceiver {
    rx: mpsc::Receiver<LocationSample>,
    last_seq: Option<u64>,
    gaps_detected: u64,
}

impl LocationBusReceiver {
    /// Receive the next sample. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<LocationSample> {
        let sample = self.rx.recv().await?;
        self.track_seq(sample.seq);
        Some(sample)
    }

    /// Stop accepting new samples; already queued ones can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Number of sequence numbers skipped (dropped samples).
    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }

    fn track_seq(&mut self, seq: u64) {
        if let Some(last) = self.last_seq {
            if seq > last + 1 {
                let gap = seq - last - 1;
                self.gaps_detected += gap;
                tracing::debug!(gap, from = last, to = seq, "Location bus gap detected");
            }
        }
        self.last_seq = Some(self.last_seq.map_or(seq, |last| last.max(seq)));
    }
}

/// Create a connected sender/receiver pair reporting into `stats`.
pub fn channel(
    config: LocationBusConfig,
    stats: Arc<SampleStats>,
) -> (LocationBusSender, LocationBusReceiver) {
    let capacity = config.capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);

    tracing::debug!(capacity, "Created location bus");

    (
        LocationBusSender {
            tx,
            seq_counter: Arc::new(AtomicU64::new(0)),
            stats,
        },
        LocationBusReceiver {
            rx,
            last_seq: None,
            gaps_detected: 0,
        },
    )
}

/// Lock-free counters for the classification pipeline.
///
/// Shared as `Arc<SampleStats>` between the bus and the monitor.
#[derive(Debug, Default)]
pub struct SampleStats {
    classified: AtomicU64,
    discarded: AtomicU64,
    location_errors: AtomicU64,
    dropped: AtomicU64,
    transitions: AtomicU64,
}

impl SampleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classified(&self) -> u64 {
        self.classified.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn location_errors(&self) -> u64 {
        self.location_errors.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    pub fn increment_classified(&self) {
        self.classified.fetch_add(1, Ordering::Relaxed);
    }

    /// A sample arrived while monitoring was inactive and was ignored.
    pub fn increment_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_location_errors(&self) {
        self.location_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transitions(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SampleStatsSnapshot {
        SampleStatsSnapshot {
            classified: self.classified(),
            discarded: self.discarded(),
            location_errors: self.location_errors(),
            dropped: self.dropped(),
            transitions: self.transitions(),
        }
    }
}

/// Point-in-time copy of [`SampleStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SampleStatsSnapshot {
    pub classified: u64,
    pub discarded: u64,
    pub location_errors: u64,
    pub dropped: u64,
    pub transitions: u64,
}
