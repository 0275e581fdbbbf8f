//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Thin UniFFI exports over the global [`TripEngine`]. Only primitives and
//! JSON strings cross the boundary; failures are logged and reported as
//! `false`, an empty string or a negative number.

use log::{info, warn};

use crate::engine::{install_engine, with_engine, PredictionPoll, ENGINE};
use crate::{init_logging, EngineConfig, IngestOutcome, LocationSample, TripCategory, TripEdit, TripEngine, TripId};

fn config_from_json(config_json: &str) -> Option<EngineConfig> {
    if config_json.trim().is_empty() {
        return Some(EngineConfig::default());
    }
    match EngineConfig::from_json(config_json) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("[TripEngine] Invalid config: {}", e);
            None
        }
    }
}

fn install(result: crate::Result<TripEngine>) -> bool {
    match result {
        Ok(engine) => {
            install_engine(engine);
            info!("[TripEngine] Initialized successfully");
            true
        }
        Err(e) => {
            warn!("[TripEngine] Failed to initialize: {}", e);
            false
        }
    }
}

fn json_or_empty(result: Option<crate::Result<String>>, what: &str) -> String {
    match result {
        Some(Ok(json)) => json,
        Some(Err(e)) => {
            warn!("[TripEngine] {} failed: {}", what, e);
            String::new()
        }
        None => {
            warn!("[TripEngine] {} called before init", what);
            String::new()
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Initialize the engine over the SQLite database at `db_path`.
/// An empty `config_json` uses the defaults.
#[uniffi::export]
pub fn engine_init(db_path: String, config_json: String) -> bool {
    init_logging();
    info!("[TripEngine] Initializing with db: {}", db_path);
    match config_from_json(&config_json) {
        Some(config) => install(TripEngine::open(&db_path, config)),
        None => false,
    }
}

/// Initialize the engine without storage, for previews and tests.
#[uniffi::export]
pub fn engine_init_in_memory() -> bool {
    init_logging();
    install(TripEngine::in_memory(EngineConfig::default()))
}

#[uniffi::export]
pub fn engine_is_initialized() -> bool {
    ENGINE.lock().map(|guard| guard.is_some()).unwrap_or(false)
}

/// Drop the engine. Stored trips are kept.
#[uniffi::export]
pub fn engine_shutdown() {
    if let Ok(mut guard) = ENGINE.lock() {
        *guard = None;
        info!("[TripEngine] Shut down");
    }
}

// ============================================================================
// Tracking
// ============================================================================

/// Start a trip. `category` is `LOCAL`, `DAY` or `MULTI_DAY`.
/// Returns the new trip as JSON, or an empty string on failure.
#[uniffi::export]
pub fn engine_start_trip(category: String, destination: String) -> String {
    init_logging();
    let category: TripCategory = match category.parse() {
        Ok(c) => c,
        Err(e) => {
            warn!("[TripEngine] start_trip: {}", e);
            return String::new();
        }
    };
    let result = with_engine(|engine| -> crate::Result<String> {
        let trip = engine.start_trip(category, &destination)?;
        Ok(serde_json::to_string(&trip)?)
    });
    json_or_empty(result, "start_trip")
}

/// Feed one location fix. Returns the running distance in km,
/// or -1.0 when no trip is active or the sample was invalid.
#[uniffi::export]
pub fn engine_ingest(latitude: f64, longitude: f64, timestamp: i64, accuracy: f64) -> f64 {
    let sample = LocationSample::new(latitude, longitude, timestamp, accuracy);
    let outcome = with_engine(|engine| engine.ingest(sample));
    match outcome {
        Some(Ok(outcome)) => outcome.running_distance_km().unwrap_or(-1.0),
        Some(Err(e)) => {
            warn!("[TripEngine] ingest rejected: {}", e);
            -1.0
        }
        None => -1.0,
    }
}

/// Whether a sample was accepted into the trail. Convenience for callers
/// that need to tell filtered jitter from accepted movement.
#[uniffi::export]
pub fn engine_ingest_accepted(latitude: f64, longitude: f64, timestamp: i64, accuracy: f64) -> bool {
    let sample = LocationSample::new(latitude, longitude, timestamp, accuracy);
    matches!(
        with_engine(|engine| engine.ingest(sample)),
        Some(Ok(IngestOutcome::Accepted(_)))
    )
}

/// Stop the active trip. Returns the finished trip as JSON.
#[uniffi::export]
pub fn engine_stop_trip() -> String {
    let result = with_engine(|engine| -> crate::Result<String> {
        Ok(serde_json::to_string(&engine.stop_trip()?)?)
    });
    json_or_empty(result, "stop_trip")
}

/// The active trip as JSON, or an empty string when idle.
#[uniffi::export]
pub fn engine_get_current_trip_json() -> String {
    with_engine(|engine| engine.current_trip())
        .flatten()
        .and_then(|trip| serde_json::to_string(&trip).ok())
        .unwrap_or_default()
}

/// Apply a `{"destination": .., "notes": ..}` edit. Returns the updated trip as JSON.
#[uniffi::export]
pub fn engine_edit_trip(trip_id: i64, edit_json: String) -> String {
    let result = with_engine(|engine| -> crate::Result<String> {
        let edit: TripEdit = serde_json::from_str(&edit_json)?;
        Ok(serde_json::to_string(&engine.edit_trip(TripId(trip_id), edit)?)?)
    });
    json_or_empty(result, "edit_trip")
}

#[uniffi::export]
pub fn engine_delete_trip(trip_id: i64) -> bool {
    matches!(with_engine(|engine| engine.delete_trip(TripId(trip_id))), Some(Ok(())))
}

/// Trail points of a trip as JSON.
#[uniffi::export]
pub fn engine_get_trail_json(trip_id: i64) -> String {
    let result = with_engine(|engine| -> crate::Result<String> {
        Ok(serde_json::to_string(&engine.trail(TripId(trip_id))?)?)
    });
    json_or_empty(result, "get_trail")
}

#[uniffi::export]
pub fn engine_get_trips_json() -> String {
    json_or_empty(with_engine(|engine| engine.get_trips_json()), "get_trips")
}

// ============================================================================
// Analysis
// ============================================================================

/// Run the prediction pipeline synchronously and return it as JSON.
///
/// The engine lock is only held to take a detached service, so ingestion
/// from another thread proceeds while the analysis runs.
#[uniffi::export]
pub fn engine_get_prediction_json() -> String {
    let service = with_engine(|engine| engine.prediction_service());
    let result = service.map(|service| -> crate::Result<String> {
        let prediction = service.generate_complete_prediction()?;
        Ok(serde_json::to_string(&prediction)?)
    });
    json_or_empty(result, "get_prediction")
}

/// Start a background prediction. Poll with `engine_poll_prediction_json`.
#[uniffi::export]
pub fn engine_request_prediction() -> bool {
    with_engine(|engine| engine.request_prediction()).is_some()
}

/// The finished background prediction as JSON, or an empty string while
/// it is still running, after it failed, or when none was requested.
#[uniffi::export]
pub fn engine_poll_prediction_json() -> String {
    match with_engine(|engine| engine.poll_prediction()) {
        Some(PredictionPoll::Complete(result)) => serde_json::to_string(&result).unwrap_or_default(),
        Some(PredictionPoll::Failed(e)) => {
            warn!("[TripEngine] Background prediction failed: {}", e);
            String::new()
        }
        _ => String::new(),
    }
}

#[uniffi::export]
pub fn engine_cancel_prediction() {
    with_engine(|engine| engine.cancel_prediction());
}

#[uniffi::export]
pub fn engine_get_statistics_json() -> String {
    json_or_empty(with_engine(|engine| engine.get_statistics_json()), "get_statistics")
}
