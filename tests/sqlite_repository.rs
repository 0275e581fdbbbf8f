//! SQLite integration tests.
//!
//! Uses an on-disk database in a temp dir to check that trips survive a
//! reopen, that an interrupted trip resumes with its distance intact, and
//! that the engine reads the same history back for analysis.
//!
//! Run with: `cargo test --features persistence --test sqlite_repository`

use std::sync::Arc;

use tempfile::TempDir;
use trip_tracker::geo_utils::offset_north;
use trip_tracker::{
    EngineConfig, GpsPoint, LocationSample, ManualClock, SqliteTripRepository, TrackingConfig,
    TripCategory, TripEdit, TripEngine, TripRepository, TripTracker,
};

const T0: i64 = 1_718_409_600_000;

fn temp_db() -> (TempDir, String) {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = tmp_dir.path().join("trips.db");
    let path = db_path.to_str().unwrap().to_string();
    (tmp_dir, path)
}

fn new_tracker(repo: Arc<SqliteTripRepository>, clock: Arc<ManualClock>) -> TripTracker {
    TripTracker::with_config(repo, clock, TrackingConfig::default())
}

fn sample_at(origin: &GpsPoint, meters_north: f64, timestamp: i64) -> LocationSample {
    let p = offset_north(origin, meters_north);
    LocationSample::new(p.latitude, p.longitude, timestamp, 6.0)
}

#[test]
fn test_interrupted_trip_resumes_after_reopen() {
    let (_tmp, path) = temp_db();
    let clock = Arc::new(ManualClock::new(T0));
    let origin = GpsPoint::new(46.0207, 7.7491);

    let trip_id = {
        let repo = Arc::new(SqliteTripRepository::new(&path).unwrap());
        let mut tracker = new_tracker(repo, clock.clone());
        let trip = tracker.start(TripCategory::MultiDay, "Zermatt").unwrap();
        for (i, meters) in [0.0, 200.0, 400.0].into_iter().enumerate() {
            tracker
                .ingest(sample_at(&origin, meters, T0 + i as i64 * 10_000))
                .unwrap();
        }
        trip.id
        // Process dies here without stopping the trip
    };

    let repo = Arc::new(SqliteTripRepository::new(&path).unwrap());
    let mut tracker = new_tracker(repo.clone(), clock.clone());
    assert!(!tracker.is_tracking());

    let resumed = tracker.resume().unwrap().expect("active trip should survive");
    assert_eq!(resumed.id, trip_id);
    let km = tracker.running_distance_km().unwrap();
    assert!((km - 0.4).abs() < 0.001, "resumed distance {}", km);

    // Tracking continues from the last stored point
    tracker
        .ingest(sample_at(&origin, 600.0, T0 + 30_000))
        .unwrap();
    clock.advance(3_600_000);
    let finished = tracker.stop().unwrap();
    assert!((finished.distance_km - 0.6).abs() < 0.001);

    let stored = repo.get_trip_by_id(trip_id).unwrap().unwrap();
    assert_eq!(stored, finished);
    assert_eq!(repo.list_points_for_trip(trip_id).unwrap().len(), 4);
    assert!(repo.find_active_trip().unwrap().is_none());
}

#[test]
fn test_history_persists_across_engines() {
    let (_tmp, path) = temp_db();

    {
        let mut engine = TripEngine::open(&path, EngineConfig::default()).unwrap();
        let trip = engine.start_trip(TripCategory::Day, "Lake").unwrap();
        engine
            .ingest(LocationSample::new(45.0, 9.0, trip.start_time, 5.0))
            .unwrap();
        engine
            .ingest(LocationSample::new(45.01, 9.0, trip.start_time + 60_000, 5.0))
            .unwrap();
        engine.stop_trip().unwrap();
        engine
            .edit_trip(
                trip.id,
                TripEdit {
                    destination: None,
                    notes: Some("Windy".to_string()),
                },
            )
            .unwrap();
    }

    let engine = TripEngine::open(&path, EngineConfig::default()).unwrap();
    assert!(engine.current_trip().is_none());

    let trips: serde_json::Value = serde_json::from_str(&engine.get_trips_json().unwrap()).unwrap();
    assert_eq!(trips.as_array().unwrap().len(), 1);
    assert_eq!(trips[0]["destination"], "Lake");
    assert_eq!(trips[0]["notes"], "Windy");
    assert_eq!(trips[0]["category"], "DAY");

    let stats = engine.statistics().unwrap();
    assert_eq!(stats.completed_trips, 1);
    assert!((stats.total_distance_km - 1.112).abs() < 0.01);
}

#[test]
fn test_delete_cascades_on_disk() {
    let (_tmp, path) = temp_db();
    let clock = Arc::new(ManualClock::new(T0));
    let origin = GpsPoint::new(40.4168, -3.7038);

    let repo = Arc::new(SqliteTripRepository::new(&path).unwrap());
    let mut tracker = new_tracker(repo.clone(), clock);
    let trip = tracker.start(TripCategory::Local, "").unwrap();
    tracker.ingest(sample_at(&origin, 0.0, T0)).unwrap();
    tracker.ingest(sample_at(&origin, 50.0, T0 + 5_000)).unwrap();
    tracker.stop().unwrap();

    repo.delete_trip(trip.id).unwrap();
    drop(repo);

    let reopened = SqliteTripRepository::new(&path).unwrap();
    assert!(reopened.get_trip_by_id(trip.id).unwrap().is_none());
    assert!(reopened.list_points_for_trip(trip.id).unwrap().is_empty());
}
