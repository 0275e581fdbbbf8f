//! Unified error handling for the trip-tracker library.
//!
//! Tracking-path errors (`AlreadyActive`, `NoActiveTrip`, `InvalidSample`) are
//! local and recoverable: a rejected sample never aborts the active trip.
//! Analysis-path errors propagate to the caller so no partial result escapes.

use thiserror::Error;

use crate::TripId;

/// Unified error type for trip-tracker operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TripError {
    /// `start` was called while another trip is still being tracked
    #[error("Trip {trip_id} is already active, stop it before starting a new one")]
    AlreadyActive { trip_id: TripId },

    /// `ingest`/`stop` was called with no trip being tracked
    #[error("No active trip")]
    NoActiveTrip,

    /// Malformed coordinate or timestamp; the sample is dropped
    #[error("Invalid sample: {reason}")]
    InvalidSample { reason: String },

    /// Trip lookup by id found nothing
    #[error("Trip {trip_id} not found")]
    TripNotFound { trip_id: TripId },

    /// Storage failure reported by a repository
    #[error("Repository error: {message}")]
    Repository { message: String },

    /// Configuration could not be parsed or is out of range
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON input or output at the host boundary was malformed
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A background analysis was overtaken by a newer request
    #[error("Analysis request {generation} was superseded")]
    Superseded { generation: u64 },
}

impl TripError {
    /// Shorthand for an invalid-sample error.
    pub fn invalid_sample(reason: impl Into<String>) -> Self {
        TripError::InvalidSample {
            reason: reason.into(),
        }
    }

    /// Shorthand for a repository error.
    pub fn repository(message: impl Into<String>) -> Self {
        TripError::Repository {
            message: message.into(),
        }
    }

    /// Whether the tracking stream can simply carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TripError::AlreadyActive { .. }
                | TripError::NoActiveTrip
                | TripError::InvalidSample { .. }
                | TripError::Superseded { .. }
        )
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TripError {
    fn from(err: rusqlite::Error) -> Self {
        TripError::Repository {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TripError {
    fn from(err: serde_json::Error) -> Self {
        TripError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for trip-tracker operations.
pub type Result<T> = std::result::Result<T, TripError>;

/// Extension trait for converting Option to TripError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a trip-not-found error.
    fn ok_or_not_found(self, trip_id: TripId) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, trip_id: TripId) -> Result<T> {
        self.ok_or(TripError::TripNotFound { trip_id })
    }
}
