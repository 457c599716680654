//! Bus bridge driven by a real monitor.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use waypost_events::{bus_callbacks, GeofenceEvent, RecordingBus};
use waypost_fence::{
    Accuracy, GeofenceMonitor, Location, LocationError, LocationSink, MonitorConfig,
    PositionSource, Status, Subscription, Transition, WatchOptions,
};
use waypost_geo::{Boundary, Coordinate};
use waypost_permissions::StaticPermissions;

const CENTER: Coordinate = Coordinate::new(52.3676, 4.9041);

struct Fixed(std::sync::Mutex<Location>);

#[async_trait]
impl PositionSource for Fixed {
    async fn current_position(&self, _accuracy: Accuracy) -> Result<Location, LocationError> {
        Ok(*self.0.lock().unwrap())
    }

    async fn watch_position(
        &self,
        _options: WatchOptions,
        _sink: LocationSink,
    ) -> Result<Subscription, LocationError> {
        Ok(Subscription::noop())
    }
}

async fn wait_for_events(bus: &RecordingBus, count: usize) {
    for _ in 0..200 {
        if bus.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} events, got {}", bus.len());
}

#[tokio::test]
async fn test_transitions_published_on_bus() {
    let bus = Arc::new(RecordingBus::new());
    let source = Arc::new(Fixed(std::sync::Mutex::new(Location::new(
        CENTER.lat, CENTER.lon, 10,
    ))));
    let monitor = GeofenceMonitor::new(
        MonitorConfig::default(),
        source.clone(),
        Arc::new(StaticPermissions::granted()),
        bus_callbacks(bus.clone()),
    )
    .unwrap();
    monitor
        .set_boundary(Some(Boundary::circle("start", CENTER, 100.0)))
        .await
        .unwrap();

    assert_eq!(monitor.check_status_now().await, Status::Inside);
    *source.0.lock().unwrap() = Location::new(52.3776, 4.9041, 20);
    assert_eq!(monitor.check_status_now().await, Status::Outside);

    wait_for_events(&bus, 2).await;

    let events = bus.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], GeofenceEvent::Enter(_)));
    let GeofenceEvent::Exit(payload) = &events[1] else {
        panic!("expected exit, got {:?}", events[1]);
    };
    assert_eq!(payload.transition, Transition::Exit);
    assert_eq!(payload.boundary_id, "start");
    assert_eq!(payload.timestamp_ms, 20);
    assert!(payload.distance_m > 1000.0);
}
