//! # Trip Aggregator
//!
//! Owns the lifecycle of the trip being tracked:
//!
//! ```text
//! Idle --start--> Active --stop--> Completed --start--> Active ...
//! ```
//!
//! Distance is accumulated in meters for the whole life of the trip and only
//! converted to kilometers when the trip is written to the repository, so no
//! rounding compounds across samples.
//!
//! At most one trip is active. The aggregator checks both its own state and
//! the repository before starting, so a trip left active by a previous process
//! is reported as a conflict instead of silently duplicated.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::TrackingConfig;
use crate::error::{OptionExt, Result, TripError};
use crate::filter::{FilterDecision, LocationFilter};
use crate::geo_utils::{meters_to_km, polyline_length};
use crate::repository::TripRepository;
use crate::{GpsPoint, LocationSample, NewTrip, NewTripPoint, Trip, TripCategory, TripId, TripPoint};

/// Bookkeeping for the trip currently being tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTrip {
    pub trip: Trip,
    /// Running distance in meters
    pub distance_meters: f64,
    pub last_accepted: Option<GpsPoint>,
    pub last_timestamp: Option<i64>,
    pub point_count: usize,
}

/// Where the aggregator is in the trip lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TripState {
    Idle,
    Active(ActiveTrip),
    Completed(Trip),
}

/// Result of one `ingest` call, handed back for display.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestUpdate {
    pub trip_id: TripId,
    pub decision: FilterDecision,
    /// The stored point when the sample was accepted
    pub point: Option<TripPoint>,
    pub distance_meters: f64,
    pub distance_km: f64,
    pub point_count: usize,
}

/// User-editable trip fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TripEdit {
    pub destination: Option<String>,
    pub notes: Option<String>,
}

impl TripEdit {
    fn apply(&self, trip: &mut Trip) {
        if let Some(destination) = &self.destination {
            trip.destination = destination.clone();
        }
        if let Some(notes) = &self.notes {
            trip.notes = notes.clone();
        }
    }
}

/// State machine for the single active trip.
pub struct TripAggregator {
    repository: Arc<dyn TripRepository>,
    clock: Arc<dyn Clock>,
    filter: LocationFilter,
    state: TripState,
}

impl TripAggregator {
    /// Create an aggregator with the system clock and default filter.
    pub fn new(repository: Arc<dyn TripRepository>) -> Self {
        Self::with_config(repository, Arc::new(SystemClock), TrackingConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn TripRepository>,
        clock: Arc<dyn Clock>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            repository,
            clock,
            filter: LocationFilter::new(config),
            state: TripState::Idle,
        }
    }

    pub fn state(&self) -> &TripState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TripState::Active(_))
    }

    /// Snapshot of the trip being tracked, if any.
    pub fn active_trip(&self) -> Option<&Trip> {
        match &self.state {
            TripState::Active(active) => Some(&active.trip),
            _ => None,
        }
    }

    /// Running distance of the active trip in meters.
    pub fn running_distance_meters(&self) -> Option<f64> {
        match &self.state {
            TripState::Active(active) => Some(active.distance_meters),
            _ => None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a new active trip starting now.
    pub fn start(&mut self, category: TripCategory, destination: impl Into<String>) -> Result<Trip> {
        if let TripState::Active(active) = &self.state {
            return Err(TripError::AlreadyActive {
                trip_id: active.trip.id,
            });
        }
        if let Some(existing) = self.repository.find_active_trip()? {
            warn!(
                "[Aggregator] Repository still holds active trip {}, refusing to start",
                existing.id
            );
            return Err(TripError::AlreadyActive {
                trip_id: existing.id,
            });
        }

        let trip = self.repository.create_trip(NewTrip {
            category,
            destination: destination.into(),
            start_time: self.clock.now_millis(),
            notes: String::new(),
        })?;
        info!(
            "[Aggregator] Started trip {} ({}) at {}",
            trip.id, trip.category, trip.start_time
        );

        self.state = TripState::Active(ActiveTrip {
            trip: trip.clone(),
            distance_meters: 0.0,
            last_accepted: None,
            last_timestamp: None,
            point_count: 0,
        });
        Ok(trip)
    }

    /// Re-attach to a trip the repository still marks active.
    ///
    /// Rebuilds the running distance and last accepted point from the stored
    /// trail. Returns `None` when nothing was left active.
    pub fn resume(&mut self) -> Result<Option<Trip>> {
        if let TripState::Active(active) = &self.state {
            return Ok(Some(active.trip.clone()));
        }
        let Some(trip) = self.repository.find_active_trip()? else {
            return Ok(None);
        };

        let trail = self.repository.list_points_for_trip(trip.id)?;
        let coords: Vec<GpsPoint> = trail.iter().map(TripPoint::point).collect();
        let distance_meters = polyline_length(&coords);
        info!(
            "[Aggregator] Resumed trip {} with {} points, {:.0}m",
            trip.id,
            trail.len(),
            distance_meters
        );

        self.state = TripState::Active(ActiveTrip {
            trip: trip.clone(),
            distance_meters,
            last_accepted: coords.last().copied(),
            last_timestamp: trail.last().map(|p| p.timestamp),
            point_count: trail.len(),
        });
        Ok(Some(trip))
    }

    /// Feed one sample into the active trip.
    ///
    /// Rejected samples (jitter) are not errors: they come back as an update
    /// with a `Reject` decision and leave the trip untouched. Invalid samples
    /// fail with `InvalidSample` and also leave the trip untouched.
    pub fn ingest(&mut self, sample: &LocationSample) -> Result<IngestUpdate> {
        let TripState::Active(active) = &mut self.state else {
            return Err(TripError::NoActiveTrip);
        };

        sample.validate()?;
        if let Some(last_ts) = active.last_timestamp {
            if sample.timestamp < last_ts {
                return Err(TripError::invalid_sample(format!(
                    "timestamp {} precedes last accepted point at {}",
                    sample.timestamp, last_ts
                )));
            }
        }

        let decision = self.filter.evaluate(active.last_accepted.as_ref(), sample);
        let increment = match decision {
            FilterDecision::Accept { increment_meters } => increment_meters,
            FilterDecision::Reject { distance_meters } => {
                debug!(
                    "[Aggregator] Trip {}: sample rejected ({:?}m)",
                    active.trip.id, distance_meters
                );
                return Ok(IngestUpdate {
                    trip_id: active.trip.id,
                    decision,
                    point: None,
                    distance_meters: active.distance_meters,
                    distance_km: active.trip.distance_km,
                    point_count: active.point_count,
                });
            }
        };

        let point = self
            .repository
            .append_point(NewTripPoint::from_sample(active.trip.id, sample))?;

        // The point is stored, so the in-memory trail advances with it
        active.distance_meters += increment;
        active.last_accepted = Some(sample.point());
        active.last_timestamp = Some(sample.timestamp);
        active.point_count += 1;
        active.trip.distance_km = meters_to_km(active.distance_meters);

        debug!(
            "[Aggregator] Trip {}: +{:.1}m, total {:.1}m over {} points",
            active.trip.id, increment, active.distance_meters, active.point_count
        );

        self.repository.update_trip(&active.trip)?;

        Ok(IngestUpdate {
            trip_id: active.trip.id,
            decision,
            point: Some(point),
            distance_meters: active.distance_meters,
            distance_km: active.trip.distance_km,
            point_count: active.point_count,
        })
    }

    /// Finalize the active trip and return it.
    pub fn stop(&mut self) -> Result<Trip> {
        let TripState::Active(active) = &self.state else {
            return Err(TripError::NoActiveTrip);
        };

        let mut trip = active.trip.clone();
        trip.end_time = Some(self.clock.now_millis().max(trip.start_time));
        trip.is_active = false;
        trip.distance_km = meters_to_km(active.distance_meters);
        self.repository.update_trip(&trip)?;

        info!(
            "[Aggregator] Stopped trip {}: {:.3} km, {} points",
            trip.id, trip.distance_km, active.point_count
        );
        self.state = TripState::Completed(trip.clone());
        Ok(trip)
    }

    /// Apply a user edit to any trip. Edits to the active trip are also folded
    /// into the in-memory copy so later distance updates keep them.
    pub fn edit(&mut self, trip_id: TripId, edit: &TripEdit) -> Result<Trip> {
        if let TripState::Active(active) = &mut self.state {
            if active.trip.id == trip_id {
                let mut updated = active.trip.clone();
                edit.apply(&mut updated);
                self.repository.update_trip(&updated)?;
                active.trip = updated.clone();
                return Ok(updated);
            }
        }

        let mut trip = self.repository.get_trip_by_id(trip_id)?.ok_or_not_found(trip_id)?;
        edit.apply(&mut trip);
        self.repository.update_trip(&trip)?;
        if let TripState::Completed(done) = &mut self.state {
            if done.id == trip_id {
                *done = trip.clone();
            }
        }
        Ok(trip)
    }
}
