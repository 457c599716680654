//! Geofence monitoring for waypost.
//!
//! Tracks whether a participant is inside the primary boundary of a timed
//! event and fires enter/exit callbacks as they cross it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Domain Layer                             │
//! │  event.rs    - Event and backend boundary types             │
//! │  selector.rs - Primary boundary selection (pure)            │
//! │  status.rs   - Status, transitions, MonitorState            │
//! │  provider.rs - Traits for position sources                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Application Layer                          │
//! │  monitor.rs  - Session lifecycle, classifier task,          │
//! │                callback dispatch                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Foreground and background fixes funnel through a single [`waypost_bus`]
//! channel into one classifier task. One-shot fixes (the start-up check and
//! `check_status_now`) are classified inline. Both paths take the same
//! session lock, so a crossing is detected exactly once whichever path saw
//! it first.
//!
//! # Example
//!
//! ```ignore
//! use waypost_fence::{GeofenceMonitor, MonitorConfig, TransitionCallbacks};
//! use std::sync::Arc;
//!
//! let callbacks = TransitionCallbacks::new()
//!     .on_enter(|e| println!("entered {}", e.boundary_id))
//!     .on_exit(|e| println!("left {}", e.boundary_id));
//!
//! let monitor = GeofenceMonitor::new(MonitorConfig::default(), positions, permissions, callbacks)?;
//! monitor.set_event(&event).await?;
//! monitor.start_monitoring().await?;
//! ```

mod config;
mod error;
mod event;
mod monitor;
mod provider;
mod selector;
mod status;

pub use config::{
    MonitorConfig, DEFAULT_BACKGROUND_TASK_ID, DEFAULT_DISTANCE_INTERVAL_M, DEFAULT_TIME_INTERVAL,
};
pub use error::{MonitorError, Result};
pub use event::{BackendBoundary, BoundaryKind, Event};
pub use monitor::{GeofenceMonitor, TransitionCallback, TransitionCallbacks, TransitionEvent};
pub use provider::{
    Accuracy, BackgroundDelivery, LocationError, NullProvider, PositionSource, Subscription,
    WatchOptions,
};
pub use selector::{select_primary, BOUNDARY_PRIORITY};
pub use status::{Classification, Lifecycle, MonitorState, Status, StatusTracker, Transition};

// Re-export sample types that appear in provider and callback signatures
pub use waypost_bus::{Location, LocationSink, SampleChannel, SampleStatsSnapshot};
