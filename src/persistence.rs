//! # SQLite Trip Repository
//!
//! Stores trips and their trails in SQLite.
//!
//! ## Schema
//!
//! - `trips`: one row per trip, distance stored in kilometers
//! - `trip_points`: the trail, cascade-deleted with the parent trip
//!
//! A partial unique index on `trips(is_active) WHERE is_active = 1` keeps the
//! single-active-trip invariant at the storage level too.

use std::sync::{Mutex, MutexGuard};

use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, TripError};
use crate::repository::TripRepository;
use crate::{NewTrip, NewTripPoint, Trip, TripCategory, TripId, TripPoint};

const TRIP_COLUMNS: &str =
    "id, category, destination, start_time, end_time, distance_km, is_active, notes";

/// Trip repository backed by a SQLite database.
pub struct SqliteTripRepository {
    /// Database connection
    db: Mutex<Connection>,

    /// Database path (":memory:" for in-memory databases)
    db_path: String,
}

impl SqliteTripRepository {
    /// Open (or create) the database at the given path.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        info!("[SqliteRepo] Opened trip database at {}", db_path);

        Ok(Self {
            db: Mutex::new(db),
            db_path: db_path.to_string(),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Initialize the database schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS trips (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                destination TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                distance_km REAL NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                notes TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_trips_start_time ON trips(start_time);

            CREATE UNIQUE INDEX IF NOT EXISTS idx_trips_single_active
                ON trips(is_active) WHERE is_active = 1;

            CREATE TABLE IF NOT EXISTS trip_points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trip_id INTEGER NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                timestamp INTEGER NOT NULL,
                accuracy REAL NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_trip_points_trip
                ON trip_points(trip_id, timestamp);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| TripError::repository("sqlite connection lock poisoned"))
    }

    fn query_trips(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Trip>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, read_trip_row)?;

        let mut trips = Vec::new();
        for row in rows {
            trips.push(row??);
        }
        Ok(trips)
    }
}

/// Map a `trips` row. The outer result is SQLite's, the inner one covers
/// values SQLite accepts but the domain does not (unknown category).
fn read_trip_row(row: &Row<'_>) -> rusqlite::Result<Result<Trip>> {
    let category: String = row.get(1)?;
    let category = match category.parse::<TripCategory>() {
        Ok(c) => c,
        Err(_) => {
            return Ok(Err(TripError::repository(format!(
                "unknown category '{}' in trips table",
                category
            ))))
        }
    };
    let is_active: i64 = row.get(6)?;

    Ok(Ok(Trip {
        id: TripId(row.get(0)?),
        category,
        destination: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        distance_km: row.get(5)?,
        is_active: is_active != 0,
        notes: row.get(7)?,
    }))
}

fn read_point_row(row: &Row<'_>) -> rusqlite::Result<TripPoint> {
    Ok(TripPoint {
        id: row.get(0)?,
        trip_id: TripId(row.get(1)?),
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        timestamp: row.get(4)?,
        accuracy: row.get(5)?,
    })
}

impl TripRepository for SqliteTripRepository {
    fn create_trip(&self, trip: NewTrip) -> Result<Trip> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trips (category, destination, start_time, end_time, distance_km, is_active, notes)
             VALUES (?, ?, ?, NULL, 0, 1, ?)",
            params![
                trip.category.as_str(),
                trip.destination,
                trip.start_time,
                trip.notes
            ],
        )?;
        let id = TripId(conn.last_insert_rowid());

        Ok(Trip {
            id,
            category: trip.category,
            destination: trip.destination,
            start_time: trip.start_time,
            end_time: None,
            distance_km: 0.0,
            is_active: true,
            notes: trip.notes,
        })
    }

    fn update_trip(&self, trip: &Trip) -> Result<()> {
        let changed = self.conn()?.execute(
            "UPDATE trips SET category = ?, destination = ?, start_time = ?, end_time = ?,
                    distance_km = ?, is_active = ?, notes = ?
             WHERE id = ?",
            params![
                trip.category.as_str(),
                trip.destination,
                trip.start_time,
                trip.end_time,
                trip.distance_km,
                trip.is_active as i64,
                trip.notes,
                trip.id.0
            ],
        )?;
        if changed == 0 {
            return Err(TripError::TripNotFound { trip_id: trip.id });
        }
        Ok(())
    }

    fn get_trip_by_id(&self, id: TripId) -> Result<Option<Trip>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM trips WHERE id = ?", TRIP_COLUMNS);
        let row = conn
            .query_row(&sql, params![id.0], |row| read_trip_row(row))
            .optional()?;
        row.transpose()
    }

    fn list_trips_in_range(&self, start: i64, end: i64) -> Result<Vec<Trip>> {
        let sql = format!(
            "SELECT {} FROM trips WHERE start_time >= ? AND start_time <= ? ORDER BY start_time",
            TRIP_COLUMNS
        );
        self.query_trips(&sql, &[&start, &end])
    }

    fn list_all_trips(&self) -> Result<Vec<Trip>> {
        let sql = format!("SELECT {} FROM trips ORDER BY start_time DESC", TRIP_COLUMNS);
        self.query_trips(&sql, &[])
    }

    fn find_active_trip(&self) -> Result<Option<Trip>> {
        let sql = format!("SELECT {} FROM trips WHERE is_active = 1 LIMIT 1", TRIP_COLUMNS);
        Ok(self.query_trips(&sql, &[])?.into_iter().next())
    }

    fn append_point(&self, point: NewTripPoint) -> Result<TripPoint> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO trip_points (trip_id, latitude, longitude, timestamp, accuracy)
             VALUES (?, ?, ?, ?, ?)",
            params![
                point.trip_id.0,
                point.latitude,
                point.longitude,
                point.timestamp,
                point.accuracy
            ],
        );
        match inserted {
            Ok(_) => {}
            // Foreign key violation: the parent trip does not exist
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(TripError::TripNotFound {
                    trip_id: point.trip_id,
                })
            }
            Err(e) => return Err(e.into()),
        }

        Ok(TripPoint {
            id: conn.last_insert_rowid(),
            trip_id: point.trip_id,
            latitude: point.latitude,
            longitude: point.longitude,
            timestamp: point.timestamp,
            accuracy: point.accuracy,
        })
    }

    fn list_points_for_trip(&self, trip_id: TripId) -> Result<Vec<TripPoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, trip_id, latitude, longitude, timestamp, accuracy
             FROM trip_points WHERE trip_id = ? ORDER BY timestamp ASC, id ASC",
        )?;
        let points = stmt
            .query_map(params![trip_id.0], read_point_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    fn delete_trip(&self, id: TripId) -> Result<()> {
        // Cascade removes the trail
        let deleted = self
            .conn()?
            .execute("DELETE FROM trips WHERE id = ?", params![id.0])?;
        if deleted == 0 {
            return Err(TripError::TripNotFound { trip_id: id });
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
