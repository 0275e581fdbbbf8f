//! All-time trip statistics: totals, per-category breakdown and records.

use serde::{Deserialize, Serialize};

use crate::{Trip, TripCategory, TripId};

/// Count and distance for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: TripCategory,
    pub count: u32,
    pub distance_km: f64,
}

/// Summary over every stored trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStatistics {
    pub total_trips: u32,
    pub completed_trips: u32,
    pub active_trips: u32,
    pub total_distance_km: f64,
    pub average_distance_km: f64,
    /// One entry per category, in declaration order, including empty ones
    pub by_category: Vec<CategoryStats>,
    /// Trip with the greatest distance
    pub longest_trip: Option<TripId>,
    /// Completed trip with the greatest duration
    pub longest_duration: Option<TripId>,
    pub longest_duration_ms: Option<i64>,
}

pub fn compute_statistics(trips: &[Trip]) -> TripStatistics {
    let total_distance_km: f64 = trips.iter().map(|t| t.distance_km).sum();
    let completed_trips = trips.iter().filter(|t| !t.is_active).count() as u32;

    let by_category = TripCategory::ALL
        .iter()
        .map(|&category| {
            let of_category = trips.iter().filter(|t| t.category == category);
            CategoryStats {
                category,
                count: of_category.clone().count() as u32,
                distance_km: of_category.map(|t| t.distance_km).sum(),
            }
        })
        .collect();

    let longest_trip = trips
        .iter()
        .filter(|t| t.distance_km > 0.0)
        .max_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
        .map(|t| t.id);

    let longest = trips
        .iter()
        .filter_map(|t| t.duration_ms().map(|d| (t.id, d)))
        .max_by_key(|&(_, d)| d);

    TripStatistics {
        total_trips: trips.len() as u32,
        completed_trips,
        active_trips: trips.len() as u32 - completed_trips,
        total_distance_km,
        average_distance_km: if trips.is_empty() {
            0.0
        } else {
            total_distance_km / trips.len() as f64
        },
        by_category,
        longest_trip,
        longest_duration: longest.map(|(id, _)| id),
        longest_duration_ms: longest.map(|(_, d)| d),
    }
}
