//! # Trip Repository
//!
//! The storage boundary the core talks to. The tracking and analysis code only
//! sees the [`TripRepository`] trait; how trips are stored is up to the
//! implementation.
//!
//! - [`InMemoryTripRepository`] keeps everything in process memory
//! - `SqliteTripRepository` (feature `persistence`) stores trips in SQLite
//!
//! Implementations take `&self` and must be `Send + Sync`: the tracker writes
//! the active trip while a background analysis reads completed trips.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{OptionExt, Result, TripError};
use crate::{NewTrip, NewTripPoint, Trip, TripId, TripPoint};

/// Storage operations the core depends on.
pub trait TripRepository: Send + Sync {
    /// Insert a new trip and return it with its assigned id.
    fn create_trip(&self, trip: NewTrip) -> Result<Trip>;

    /// Overwrite the stored trip with the same id.
    fn update_trip(&self, trip: &Trip) -> Result<()>;

    fn get_trip_by_id(&self, id: TripId) -> Result<Option<Trip>>;

    /// Trips whose start time lies in `[start, end]`, both inclusive.
    fn list_trips_in_range(&self, start: i64, end: i64) -> Result<Vec<Trip>>;

    /// Every stored trip, most recent start first.
    fn list_all_trips(&self) -> Result<Vec<Trip>>;

    /// The trip still flagged active, if any.
    fn find_active_trip(&self) -> Result<Option<Trip>>;

    /// Append one point to a trip's trail.
    fn append_point(&self, point: NewTripPoint) -> Result<TripPoint>;

    /// A trip's trail ordered by timestamp ascending.
    fn list_points_for_trip(&self, trip_id: TripId) -> Result<Vec<TripPoint>>;

    /// Delete a trip together with its trail.
    fn delete_trip(&self, id: TripId) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    trips: BTreeMap<TripId, Trip>,
    points: BTreeMap<TripId, Vec<TripPoint>>,
    next_trip_id: i64,
    next_point_id: i64,
}

/// Process-local repository backed by ordered maps.
#[derive(Debug, Default)]
pub struct InMemoryTripRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryTripRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository pre-filled with trips (ids are kept as given).
    pub fn with_trips(trips: impl IntoIterator<Item = Trip>) -> Self {
        let repo = Self::new();
        {
            let mut state = repo.state.lock().unwrap_or_else(|e| e.into_inner());
            for trip in trips {
                state.next_trip_id = state.next_trip_id.max(trip.id.0);
                state.trips.insert(trip.id, trip);
            }
        }
        repo
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| TripError::repository("in-memory repository lock poisoned"))
    }
}

impl TripRepository for InMemoryTripRepository {
    fn create_trip(&self, trip: NewTrip) -> Result<Trip> {
        let mut state = self.lock()?;
        state.next_trip_id += 1;
        let stored = Trip {
            id: TripId(state.next_trip_id),
            category: trip.category,
            destination: trip.destination,
            start_time: trip.start_time,
            end_time: None,
            distance_km: 0.0,
            is_active: true,
            notes: trip.notes,
        };
        state.trips.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn update_trip(&self, trip: &Trip) -> Result<()> {
        let mut state = self.lock()?;
        let slot = state.trips.get_mut(&trip.id).ok_or_not_found(trip.id)?;
        *slot = trip.clone();
        Ok(())
    }

    fn get_trip_by_id(&self, id: TripId) -> Result<Option<Trip>> {
        Ok(self.lock()?.trips.get(&id).cloned())
    }

    fn list_trips_in_range(&self, start: i64, end: i64) -> Result<Vec<Trip>> {
        Ok(self
            .lock()?
            .trips
            .values()
            .filter(|t| t.start_time >= start && t.start_time <= end)
            .cloned()
            .collect())
    }

    fn list_all_trips(&self) -> Result<Vec<Trip>> {
        let mut trips: Vec<Trip> = self.lock()?.trips.values().cloned().collect();
        trips.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(trips)
    }

    fn find_active_trip(&self) -> Result<Option<Trip>> {
        Ok(self.lock()?.trips.values().find(|t| t.is_active).cloned())
    }

    fn append_point(&self, point: NewTripPoint) -> Result<TripPoint> {
        let mut state = self.lock()?;
        if !state.trips.contains_key(&point.trip_id) {
            return Err(TripError::TripNotFound {
                trip_id: point.trip_id,
            });
        }
        state.next_point_id += 1;
        let stored = TripPoint {
            id: state.next_point_id,
            trip_id: point.trip_id,
            latitude: point.latitude,
            longitude: point.longitude,
            timestamp: point.timestamp,
            accuracy: point.accuracy,
        };
        state.points.entry(point.trip_id).or_default().push(stored);
        Ok(stored)
    }

    fn list_points_for_trip(&self, trip_id: TripId) -> Result<Vec<TripPoint>> {
        let mut points = self
            .lock()?
            .points
            .get(&trip_id)
            .cloned()
            .unwrap_or_default();
        points.sort_by_key(|p| (p.timestamp, p.id));
        Ok(points)
    }

    fn delete_trip(&self, id: TripId) -> Result<()> {
        let mut state = self.lock()?;
        state.trips.remove(&id).ok_or_not_found(id)?;
        state.points.remove(&id);
        Ok(())
    }
}
