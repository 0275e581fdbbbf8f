//! # Trip Tracker
//!
//! GPS trip tracking with distance aggregation, plus historical analysis and
//! forecasting over completed trips.
//!
//! This library provides:
//! - Noise filtering of raw location samples (5 m jitter threshold)
//! - A single-active-trip state machine that accumulates distance and trail points
//! - Historical analysis, trend detection, monthly forecast and recommendations
//!
//! ## Features
//!
//! - **`persistence`** - SQLite-backed trip repository
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use trip_tracker::{InMemoryTripRepository, LocationSample, TripCategory, TripTracker};
//!
//! let repo = Arc::new(InMemoryTripRepository::new());
//! let mut tracker = TripTracker::new(repo);
//!
//! let trip = tracker.start(TripCategory::Local, "Park").unwrap();
//! assert!(trip.is_active);
//!
//! tracker.ingest(LocationSample::new(45.4642, 9.1900, trip.start_time + 3_000, 8.0)).unwrap();
//! tracker.ingest(LocationSample::new(45.4651, 9.1900, trip.start_time + 6_000, 8.0)).unwrap();
//!
//! let finished = tracker.stop().unwrap();
//! assert!(!finished.is_active);
//! println!("Walked {:.2} km", finished.distance_km);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TripError};

// Configuration
pub mod config;
pub use config::{AnalysisConfig, EngineConfig, TrackingConfig};

// Time source
pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

// Geographic utilities (distance, unit conversion)
pub mod geo_utils;

// Storage boundary
pub mod repository;
pub use repository::{InMemoryTripRepository, TripRepository};

#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteTripRepository;

// Tracking pipeline
pub mod filter;
pub use filter::{FilterDecision, LocationFilter};

pub mod aggregator;
pub use aggregator::{IngestUpdate, TripAggregator, TripState};

pub mod tracker;
pub use tracker::{IngestOutcome, TripEdit, TripTracker};

// Analysis pipeline
pub mod analysis;
pub use analysis::{
    detect_trend, AnalysisWindow, DataQuality, HistoricalAnalysis, HistoricalAnalyzer, Trend,
};

pub mod forecast;
pub use forecast::{Forecaster, MonthlyForecast};

pub mod recommendations;
pub use recommendations::{Priority, Recommendation, RecommendationEngine, RecommendationType};

pub mod prediction;
pub use prediction::{PredictionHandle, PredictionResult, PredictionService};

pub mod stats;
pub use stats::{compute_statistics, CategoryStats, TripStatistics};

// Stateful engine (singleton bundling tracker and prediction)
pub mod engine;
pub use engine::{install_engine, with_engine, PredictionPoll, TripEngine, ENGINE};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TripTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One raw position fix pushed by the host's location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Horizontal accuracy in meters (informational)
    pub accuracy: f64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: i64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy,
        }
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Reject malformed coordinates and timestamps.
    ///
    /// Accuracy is not checked: zero or negative values pass through.
    pub fn validate(&self) -> Result<()> {
        if !self.point().is_valid() {
            return Err(TripError::invalid_sample(format!(
                "coordinates ({}, {}) are outside WGS84 range",
                self.latitude, self.longitude
            )));
        }
        if self.timestamp < 0 {
            return Err(TripError::invalid_sample(format!(
                "negative timestamp {}",
                self.timestamp
            )));
        }
        Ok(())
    }
}

/// Opaque trip identifier assigned by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(pub i64);

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripCategory {
    /// In-town outing
    Local,
    /// Day trip
    Day,
    /// Journey spanning several days
    MultiDay,
}

impl TripCategory {
    pub const ALL: [TripCategory; 3] = [TripCategory::Local, TripCategory::Day, TripCategory::MultiDay];

    pub fn as_str(&self) -> &'static str {
        match self {
            TripCategory::Local => "LOCAL",
            TripCategory::Day => "DAY",
            TripCategory::MultiDay => "MULTI_DAY",
        }
    }
}

impl fmt::Display for TripCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripCategory {
    type Err = TripError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(TripCategory::Local),
            "DAY" => Ok(TripCategory::Day),
            "MULTI_DAY" | "MULTIDAY" => Ok(TripCategory::MultiDay),
            other => Err(TripError::Config {
                message: format!("unknown trip category '{}'", other),
            }),
        }
    }
}

/// One tracked journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub category: TripCategory,
    pub destination: String,
    /// Epoch milliseconds, immutable after creation
    pub start_time: i64,
    /// Set exactly once, on completion
    pub end_time: Option<i64>,
    /// Cumulative distance in kilometers
    pub distance_km: f64,
    pub is_active: bool,
    pub notes: String,
}

impl Trip {
    /// Elapsed milliseconds between start and end. `None` while active.
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time.map(|end| (end - self.start_time).max(0))
    }
}

/// Fields needed to create a trip; the repository assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    pub category: TripCategory,
    pub destination: String,
    pub start_time: i64,
    pub notes: String,
}

/// One accepted location sample on a trip's trail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPoint {
    pub id: i64,
    pub trip_id: TripId,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: i64,
    pub accuracy: f64,
}

impl TripPoint {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A trail point before the repository assigns its id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewTripPoint {
    pub trip_id: TripId,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: i64,
    pub accuracy: f64,
}

impl NewTripPoint {
    pub fn from_sample(trip_id: TripId, sample: &LocationSample) -> Self {
        Self {
            trip_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp: sample.timestamp,
            accuracy: sample.accuracy,
        }
    }
}
