//! # Trip Tracker
//!
//! The host-facing side of tracking. Position fixes arrive from whatever the
//! host uses (OS callback, timer, queue) and are handed over one at a time
//! through [`TripTracker::ingest`]. The tracker runs them through the filter
//! and aggregator and returns the updated running distance for display.
//!
//! Ingestion is single-writer: one tracker owns the active trip.

use std::sync::Arc;

use log::{info, warn};

use crate::aggregator::{IngestUpdate, TripAggregator};
use crate::clock::Clock;
use crate::config::TrackingConfig;
use crate::error::{Result, TripError};
use crate::geo_utils::{meters_to_km, polyline_length};
use crate::repository::TripRepository;
use crate::{GpsPoint, LocationSample, Trip, TripCategory, TripId, TripPoint};

pub use crate::aggregator::TripEdit;

/// What happened to one ingested sample.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Movement recorded: a point was appended and distance grew
    Accepted(IngestUpdate),
    /// Jitter: nothing changed
    Filtered(IngestUpdate),
    /// No trip is being tracked; the sample was dropped
    Idle,
}

impl IngestOutcome {
    /// Running distance in kilometers, when a trip is active.
    pub fn running_distance_km(&self) -> Option<f64> {
        match self {
            IngestOutcome::Accepted(update) | IngestOutcome::Filtered(update) => {
                Some(update.distance_km)
            }
            IngestOutcome::Idle => None,
        }
    }
}

/// Orchestrates tracking for one device.
pub struct TripTracker {
    aggregator: TripAggregator,
    repository: Arc<dyn TripRepository>,
}

impl TripTracker {
    /// Tracker with the system clock and default filter settings.
    pub fn new(repository: Arc<dyn TripRepository>) -> Self {
        Self {
            aggregator: TripAggregator::new(repository.clone()),
            repository,
        }
    }

    pub fn with_config(
        repository: Arc<dyn TripRepository>,
        clock: Arc<dyn Clock>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            aggregator: TripAggregator::with_config(repository.clone(), clock, config),
            repository,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.aggregator.is_active()
    }

    /// Snapshot of the active trip.
    pub fn current_trip(&self) -> Option<Trip> {
        self.aggregator.active_trip().cloned()
    }

    /// Running distance of the active trip in kilometers.
    pub fn running_distance_km(&self) -> Option<f64> {
        self.aggregator.running_distance_meters().map(meters_to_km)
    }

    /// Start tracking a new trip.
    pub fn start(&mut self, category: TripCategory, destination: impl Into<String>) -> Result<Trip> {
        self.aggregator.start(category, destination)
    }

    /// Pick up a trip left active by a previous run.
    pub fn resume(&mut self) -> Result<Option<Trip>> {
        let resumed = self.aggregator.resume()?;
        if let Some(trip) = &resumed {
            info!("[Tracker] Tracking resumed for trip {}", trip.id);
        }
        Ok(resumed)
    }

    /// Ingest one position fix.
    ///
    /// With no active trip the sample is dropped and `Idle` comes back.
    /// Invalid samples fail with `InvalidSample`; the trip keeps going.
    pub fn ingest(&mut self, sample: LocationSample) -> Result<IngestOutcome> {
        match self.aggregator.ingest(&sample) {
            Ok(update) if update.decision.is_accepted() => Ok(IngestOutcome::Accepted(update)),
            Ok(update) => Ok(IngestOutcome::Filtered(update)),
            Err(TripError::NoActiveTrip) => Ok(IngestOutcome::Idle),
            Err(err @ TripError::InvalidSample { .. }) => {
                warn!("[Tracker] Dropping sample: {}", err);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Ingest a batch of fixes delivered together. Invalid samples are
    /// skipped; storage errors stop the batch. Returns the accepted count.
    pub fn ingest_batch(&mut self, samples: &[LocationSample]) -> Result<usize> {
        let mut accepted = 0;
        for sample in samples {
            match self.ingest(*sample) {
                Ok(IngestOutcome::Accepted(_)) => accepted += 1,
                Ok(_) => {}
                Err(err) if err.is_recoverable() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(accepted)
    }

    /// Stop tracking and return the finalized trip.
    pub fn stop(&mut self) -> Result<Trip> {
        self.aggregator.stop()
    }

    /// Change destination and/or notes of a trip.
    pub fn edit_trip(&mut self, trip_id: TripId, edit: TripEdit) -> Result<Trip> {
        self.aggregator.edit(trip_id, &edit)
    }

    /// The stored trail of a trip, oldest point first.
    pub fn trail(&self, trip_id: TripId) -> Result<Vec<TripPoint>> {
        self.repository.list_points_for_trip(trip_id)
    }

    /// Length of a stored trail in kilometers, recomputed from its points.
    pub fn trail_length_km(&self, trip_id: TripId) -> Result<f64> {
        let coords: Vec<GpsPoint> = self.trail(trip_id)?.iter().map(TripPoint::point).collect();
        Ok(meters_to_km(polyline_length(&coords)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::geo_utils::offset_north;
    use crate::repository::InMemoryTripRepository;

    const T0: i64 = 1_700_000_000_000;

    fn tracker() -> TripTracker {
        TripTracker::with_config(
            Arc::new(InMemoryTripRepository::new()),
            Arc::new(ManualClock::new(T0)),
            TrackingConfig::default(),
        )
    }

    fn fix(point: GpsPoint, timestamp: i64) -> LocationSample {
        LocationSample::new(point.latitude, point.longitude, timestamp, 4.0)
    }

    #[test]
    fn test_ingest_without_trip_is_idle() {
        let mut tracker = tracker();
        let outcome = tracker.ingest(fix(GpsPoint::new(45.0, 9.0), T0)).unwrap();
        assert_eq!(outcome, IngestOutcome::Idle);
        assert_eq!(outcome.running_distance_km(), None);
    }

    #[test]
    fn test_stop_without_start_fails() {
        let mut tracker = tracker();
        assert_eq!(tracker.stop(), Err(TripError::NoActiveTrip));
    }

    #[test]
    fn test_outcomes_report_running_distance() {
        let mut tracker = tracker();
        tracker.start(TripCategory::Local, "").unwrap();
        let p0 = GpsPoint::new(45.0, 9.0);

        let first = tracker.ingest(fix(p0, T0 + 1)).unwrap();
        assert!(matches!(first, IngestOutcome::Accepted(_)));
        let second = tracker.ingest(fix(offset_north(&p0, 200.0), T0 + 2)).unwrap();
        let km = second.running_distance_km().unwrap();
        assert!((km - 0.2).abs() < 0.002);

        let jitter = tracker.ingest(fix(offset_north(&p0, 201.0), T0 + 3)).unwrap();
        assert!(matches!(jitter, IngestOutcome::Filtered(_)));
        assert_eq!(jitter.running_distance_km(), Some(km));
    }

    #[test]
    fn test_batch_skips_invalid_samples() {
        let mut tracker = tracker();
        let trip = tracker.start(TripCategory::Day, "").unwrap();
        let p0 = GpsPoint::new(45.0, 9.0);
        let batch = vec![
            fix(p0, T0 + 1),
            LocationSample::new(f64::NAN, 9.0, T0 + 2, 4.0),
            fix(offset_north(&p0, 30.0), T0 + 3),
            fix(offset_north(&p0, 31.0), T0 + 4),
        ];
        assert_eq!(tracker.ingest_batch(&batch).unwrap(), 2);
        assert_eq!(tracker.trail(trip.id).unwrap().len(), 2);
        assert!((tracker.trail_length_km(trip.id).unwrap() - 0.03).abs() < 0.001);
    }

    #[test]
    fn test_current_trip_snapshot() {
        let mut tracker = tracker();
        assert!(tracker.current_trip().is_none());
        let trip = tracker.start(TripCategory::MultiDay, "Sicilia").unwrap();
        assert_eq!(tracker.current_trip().unwrap().id, trip.id);
        assert!(tracker.is_tracking());
        tracker.stop().unwrap();
        assert!(!tracker.is_tracking());
        assert!(tracker.running_distance_km().is_none());
    }
}
