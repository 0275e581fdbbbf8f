//! # Trip Engine
//!
//! Stateful facade that keeps tracking and analysis state in Rust, so the
//! host app only makes thin calls.
//!
//! ## Architecture
//!
//! The engine bundles over one shared repository:
//! - a [`TripTracker`] owning the active trip (single writer)
//! - a [`PredictionService`] reading completed trips, optionally in the background
//!
//! A process-wide singleton ([`ENGINE`]) lets FFI calls reach the same engine
//! without passing state back and forth.

use std::sync::{Arc, Mutex};

use log::info;
use once_cell::sync::Lazy;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{Result, TripError};
use crate::prediction::{PredictionHandle, PredictionResult, PredictionService};
use crate::repository::{InMemoryTripRepository, TripRepository};
use crate::stats::{compute_statistics, TripStatistics};
use crate::tracker::{IngestOutcome, TripEdit, TripTracker};
use crate::{LocationSample, Trip, TripCategory, TripId, TripPoint};

/// State of a background prediction request.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionPoll {
    Idle,
    Running,
    Complete(PredictionResult),
    Failed(TripError),
}

pub struct TripEngine {
    repository: Arc<dyn TripRepository>,
    tracker: TripTracker,
    prediction: PredictionService,
    pending: Option<PredictionHandle>,
    config: EngineConfig,
}

impl TripEngine {
    /// Create an engine and re-attach to any trip left active in the repository.
    pub fn new(
        repository: Arc<dyn TripRepository>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut tracker =
            TripTracker::with_config(repository.clone(), clock.clone(), config.tracking.clone());
        tracker.resume()?;
        let prediction =
            PredictionService::with_config(repository.clone(), clock, config.analysis.clone());

        Ok(Self {
            repository,
            tracker,
            prediction,
            pending: None,
            config,
        })
    }

    /// Engine over an in-memory repository with the system clock.
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Self::new(Arc::new(InMemoryTripRepository::new()), Arc::new(SystemClock), config)
    }

    /// Engine over a SQLite database at `db_path`.
    #[cfg(feature = "persistence")]
    pub fn open(db_path: &str, config: EngineConfig) -> Result<Self> {
        let repository = crate::persistence::SqliteTripRepository::new(db_path)?;
        Self::new(Arc::new(repository), Arc::new(SystemClock), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &TripTracker {
        &self.tracker
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    pub fn start_trip(&mut self, category: TripCategory, destination: &str) -> Result<Trip> {
        self.tracker.start(category, destination)
    }

    pub fn ingest(&mut self, sample: LocationSample) -> Result<IngestOutcome> {
        self.tracker.ingest(sample)
    }

    pub fn stop_trip(&mut self) -> Result<Trip> {
        self.tracker.stop()
    }

    pub fn edit_trip(&mut self, trip_id: TripId, edit: TripEdit) -> Result<Trip> {
        self.tracker.edit_trip(trip_id, edit)
    }

    pub fn current_trip(&self) -> Option<Trip> {
        self.tracker.current_trip()
    }

    pub fn trail(&self, trip_id: TripId) -> Result<Vec<TripPoint>> {
        self.tracker.trail(trip_id)
    }

    /// Delete a completed trip and its trail. The active trip cannot be deleted.
    pub fn delete_trip(&mut self, trip_id: TripId) -> Result<()> {
        if self.current_trip().map(|t| t.id) == Some(trip_id) {
            return Err(TripError::AlreadyActive { trip_id });
        }
        self.repository.delete_trip(trip_id)?;
        info!("[TripEngine] Deleted trip {}", trip_id);
        Ok(())
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Detached handle on the analysis pipeline. Running it does not borrow
    /// the engine, so callers holding the engine behind a lock can release
    /// the lock before analysing.
    pub fn prediction_service(&self) -> PredictionService {
        self.prediction.clone()
    }

    /// Run the prediction pipeline synchronously.
    pub fn generate_complete_prediction(&self) -> Result<PredictionResult> {
        self.prediction.generate_complete_prediction()
    }

    /// Start a background prediction, superseding any request in flight.
    pub fn request_prediction(&mut self) {
        self.pending = Some(self.prediction.spawn_prediction());
    }

    /// Poll the background prediction started by `request_prediction`.
    pub fn poll_prediction(&mut self) -> PredictionPoll {
        let Some(handle) = &self.pending else {
            return PredictionPoll::Idle;
        };
        let outcome = match handle.try_recv() {
            None => return PredictionPoll::Running,
            Some(Ok(result)) => PredictionPoll::Complete(result),
            Some(Err(err)) => PredictionPoll::Failed(err),
        };
        self.pending = None;
        outcome
    }

    /// Drop the background request, if any.
    pub fn cancel_prediction(&mut self) {
        if self.pending.take().is_some() {
            self.prediction.cancel_pending();
            info!("[TripEngine] Prediction cancelled");
        }
    }

    pub fn statistics(&self) -> Result<TripStatistics> {
        Ok(compute_statistics(&self.repository.list_all_trips()?))
    }

    // ========================================================================
    // JSON accessors
    // ========================================================================

    pub fn get_trips_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.repository.list_all_trips()?)?)
    }

    pub fn get_prediction_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.generate_complete_prediction()?)?)
    }

    pub fn get_statistics_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.statistics()?)?)
    }
}

// ============================================================================
// Global Singleton for FFI
// ============================================================================

/// Global engine instance.
pub static ENGINE: Lazy<Mutex<Option<TripEngine>>> = Lazy::new(|| Mutex::new(None));

/// Install `engine` as the global instance, replacing any previous one.
pub fn install_engine(engine: TripEngine) {
    let mut guard = ENGINE.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(engine);
}

/// Get a lock on the global engine.
pub fn with_engine<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut TripEngine) -> R,
{
    let mut guard = ENGINE.lock().ok()?;
    guard.as_mut().map(f)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::geo_utils::offset_north;
    use crate::GpsPoint;

    const T0: i64 = 1_718_409_600_000;

    fn engine(clock: Arc<ManualClock>) -> TripEngine {
        TripEngine::new(
            Arc::new(InMemoryTripRepository::new()),
            clock,
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.analysis.window_months = 0;
        assert!(matches!(
            TripEngine::in_memory(config),
            Err(TripError::Config { .. })
        ));
    }

    #[test]
    fn test_trip_then_prediction() {
        let clock = Arc::new(ManualClock::new(T0));
        let mut engine = engine(clock.clone());

        engine.start_trip(TripCategory::Local, "Duomo").unwrap();
        let p0 = GpsPoint::new(45.4642, 9.19);
        for (i, meters) in [0.0, 400.0, 800.0].iter().enumerate() {
            let p = offset_north(&p0, *meters);
            engine
                .ingest(LocationSample::new(p.latitude, p.longitude, T0 + i as i64 * 3_000, 5.0))
                .unwrap();
        }
        clock.advance(1_800_000);
        let trip = engine.stop_trip().unwrap();
        assert!((trip.distance_km - 0.8).abs() < 0.01);

        let result = engine.generate_complete_prediction().unwrap();
        assert_eq!(result.historical_analysis.total_trips, 1);

        let stats = engine.statistics().unwrap();
        assert_eq!(stats.completed_trips, 1);
        assert_eq!(stats.longest_duration_ms, Some(1_800_000));
    }

    #[test]
    fn test_background_prediction_poll() {
        let mut engine = engine(Arc::new(ManualClock::new(T0)));
        assert_eq!(engine.poll_prediction(), PredictionPoll::Idle);

        engine.request_prediction();
        let result = loop {
            match engine.poll_prediction() {
                PredictionPoll::Running => std::thread::yield_now(),
                other => break other,
            }
        };
        assert!(matches!(result, PredictionPoll::Complete(_)));
        assert_eq!(engine.poll_prediction(), PredictionPoll::Idle);
    }

    #[test]
    fn test_detached_prediction_runs_while_tracking() {
        let mut engine = engine(Arc::new(ManualClock::new(T0)));
        let service = engine.prediction_service();
        let worker = std::thread::spawn(move || service.generate_complete_prediction());

        engine.start_trip(TripCategory::Local, "").unwrap();
        let outcome = engine
            .ingest(LocationSample::new(45.0, 9.0, T0 + 1_000, 5.0))
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Accepted(_)));

        let detached = worker.join().unwrap().unwrap();
        assert_eq!(detached.historical_analysis.total_trips, 0);
        assert_eq!(detached, engine.generate_complete_prediction().unwrap());
    }

    #[test]
    fn test_cannot_delete_active_trip() {
        let mut engine = engine(Arc::new(ManualClock::new(T0)));
        let trip = engine.start_trip(TripCategory::Day, "").unwrap();
        assert!(engine.delete_trip(trip.id).is_err());
        engine.stop_trip().unwrap();
        engine.delete_trip(trip.id).unwrap();
        assert_eq!(engine.get_trips_json().unwrap(), "[]");
    }

    #[test]
    fn test_engine_resumes_active_trip() {
        let repo: Arc<dyn TripRepository> = Arc::new(InMemoryTripRepository::new());
        let clock = Arc::new(ManualClock::new(T0));
        let trip = {
            let mut first = TripEngine::new(repo.clone(), clock.clone(), EngineConfig::default()).unwrap();
            first.start_trip(TripCategory::Local, "").unwrap()
        };
        let second = TripEngine::new(repo, clock, EngineConfig::default()).unwrap();
        assert_eq!(second.current_trip().map(|t| t.id), Some(trip.id));
    }

    #[test]
    fn test_prediction_json_shape() {
        let engine = engine(Arc::new(ManualClock::new(T0)));
        let json: serde_json::Value =
            serde_json::from_str(&engine.get_prediction_json().unwrap()).unwrap();
        assert_eq!(json["historicalAnalysis"]["dataQuality"], "INSUFFICIENT");
        assert_eq!(json["forecast"]["predictedTrips"], 0);
        assert!(json["recommendations"].as_array().unwrap().len() >= 1);
    }
}
