//! # Historical Analysis
//!
//! Aggregate statistics and trend classification over completed trips in a
//! trailing window (three calendar months by default).
//!
//! ## Trend detection
//!
//! The window is cut into equal-width time slots and trips are counted per
//! slot. The summed count of the first third of the slots is compared with the
//! summed count of the last third:
//!
//! ```text
//! change = (last - first) / first * 100
//! change >  20  -> Increasing
//! change < -20  -> Decreasing
//! otherwise     -> Stable
//! ```
//!
//! An empty first third would divide by zero; that case is classified as
//! stable rather than guessed at.

use std::collections::BTreeMap;

use chrono::{DateTime, Months, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::repository::TripRepository;
use crate::{Trip, TripCategory};

/// Percent change used by [`detect_trend`].
pub const DEFAULT_TREND_CHANGE_PERCENT: f64 = 20.0;

/// Average month length used when calendar arithmetic is out of range.
const AVERAGE_MONTH_MS: i64 = 2_629_746_000;

/// Direction of recent activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Confidence tier derived from the number of trips analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQuality {
    /// No trips
    Insufficient,
    /// 1-2 trips
    Low,
    /// 3-9 trips
    Medium,
    /// 10 or more trips
    High,
}

impl DataQuality {
    pub fn from_trip_count(count: usize) -> Self {
        match count {
            0 => DataQuality::Insufficient,
            1..=2 => DataQuality::Low,
            3..=9 => DataQuality::Medium,
            _ => DataQuality::High,
        }
    }
}

/// Time range analysed, both ends inclusive, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisWindow {
    pub start_ms: i64,
    pub end_ms: i64,
    /// Number of periods (months) the window spans
    pub periods: u32,
}

impl AnalysisWindow {
    /// The `months` calendar months (UTC) ending at `now_ms`.
    pub fn trailing_months(now_ms: i64, months: u32) -> Self {
        let start_ms = DateTime::<Utc>::from_timestamp_millis(now_ms)
            .and_then(|now| now.checked_sub_months(Months::new(months)))
            .map(|start| start.timestamp_millis())
            .unwrap_or_else(|| now_ms.saturating_sub(AVERAGE_MONTH_MS.saturating_mul(months as i64)));

        Self {
            start_ms,
            end_ms: now_ms,
            periods: months,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start_ms && timestamp <= self.end_ms
    }

    /// Count timestamps per equal-width slot across the window.
    pub fn bucket_counts(&self, timestamps: impl IntoIterator<Item = i64>, buckets: usize) -> Vec<u32> {
        let mut counts = vec![0u32; buckets];
        if buckets == 0 {
            return counts;
        }
        let span = (self.end_ms - self.start_ms).max(1) as i128;
        for ts in timestamps {
            if !self.contains(ts) {
                continue;
            }
            let offset = (ts - self.start_ms) as i128;
            let index = ((offset * buckets as i128) / span) as usize;
            counts[index.min(buckets - 1)] += 1;
        }
        counts
    }
}

/// Summary of completed trips in the analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalAnalysis {
    pub total_trips: u32,
    /// Kilometers
    pub total_distance: f64,
    pub avg_trips_per_period: f64,
    /// Kilometers per period
    pub avg_distance_per_period: f64,
    pub trips_by_category: BTreeMap<TripCategory, u32>,
    pub trend: Trend,
    pub data_quality: DataQuality,
}

impl HistoricalAnalysis {
    /// Zero-valued analysis for an empty history.
    pub fn empty() -> Self {
        Self {
            total_trips: 0,
            total_distance: 0.0,
            avg_trips_per_period: 0.0,
            avg_distance_per_period: 0.0,
            trips_by_category: BTreeMap::new(),
            trend: Trend::Stable,
            data_quality: DataQuality::Insufficient,
        }
    }

    /// The category with the most trips. Ties go to the category declared first.
    pub fn most_frequent_category(&self) -> Option<TripCategory> {
        let mut best: Option<(TripCategory, u32)> = None;
        for (&category, &count) in &self.trips_by_category {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((category, count));
            }
        }
        best.map(|(category, _)| category)
    }
}

/// Classify a chronological series of activity counts using the default threshold.
///
/// ```rust
/// use trip_tracker::{detect_trend, Trend};
///
/// assert_eq!(detect_trend(&[1, 1, 1, 5, 5, 5]), Trend::Increasing);
/// assert_eq!(detect_trend(&[4, 4, 4, 4, 4, 4]), Trend::Stable);
/// ```
pub fn detect_trend(series: &[u32]) -> Trend {
    detect_trend_with_threshold(series, DEFAULT_TREND_CHANGE_PERCENT)
}

/// Classify a chronological series by comparing its first and last thirds.
pub fn detect_trend_with_threshold(series: &[u32], change_percent: f64) -> Trend {
    let third = series.len() / 3;
    if third == 0 {
        return Trend::Stable;
    }

    let first: u32 = series[..third].iter().sum();
    let last: u32 = series[series.len() - third..].iter().sum();
    if first == 0 {
        debug!(
            "[Analyzer] First third is empty (last third = {}), trend guarded to stable",
            last
        );
        return Trend::Stable;
    }

    let change = (last as f64 - first as f64) / first as f64 * 100.0;
    if change > change_percent {
        Trend::Increasing
    } else if change < -change_percent {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Computes [`HistoricalAnalysis`] from stored trips.
#[derive(Debug, Clone, Default)]
pub struct HistoricalAnalyzer {
    config: AnalysisConfig,
}

impl HistoricalAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The window ending at `now_ms`.
    pub fn window(&self, now_ms: i64) -> AnalysisWindow {
        AnalysisWindow::trailing_months(now_ms, self.config.window_months)
    }

    /// Read the window's trips from the repository and analyse them.
    pub fn analyze(&self, repository: &dyn TripRepository, now_ms: i64) -> Result<HistoricalAnalysis> {
        let window = self.window(now_ms);
        let trips = repository.list_trips_in_range(window.start_ms, window.end_ms)?;
        let analysis = self.analyze_trips(&trips, &window);
        info!(
            "[Analyzer] {} trips, {:.1} km, trend {:?}, quality {:?}",
            analysis.total_trips, analysis.total_distance, analysis.trend, analysis.data_quality
        );
        Ok(analysis)
    }

    /// Analyse the completed trips of `trips` that start inside `window`.
    pub fn analyze_trips(&self, trips: &[Trip], window: &AnalysisWindow) -> HistoricalAnalysis {
        let completed: Vec<&Trip> = trips
            .iter()
            .filter(|t| !t.is_active && window.contains(t.start_time))
            .collect();

        if completed.is_empty() {
            return HistoricalAnalysis::empty();
        }

        let periods = window.periods.max(1) as f64;
        let total_distance: f64 = completed.iter().map(|t| t.distance_km).sum();

        let mut trips_by_category = BTreeMap::new();
        for trip in &completed {
            *trips_by_category.entry(trip.category).or_insert(0u32) += 1;
        }

        HistoricalAnalysis {
            total_trips: completed.len() as u32,
            total_distance,
            avg_trips_per_period: completed.len() as f64 / periods,
            avg_distance_per_period: total_distance / periods,
            trips_by_category,
            trend: self.trend(&completed, window),
            data_quality: DataQuality::from_trip_count(completed.len()),
        }
    }

    fn trend(&self, trips: &[&Trip], window: &AnalysisWindow) -> Trend {
        if trips.len() < self.config.min_trips_for_trend {
            return Trend::Stable;
        }
        let series = window.bucket_counts(trips.iter().map(|t| t.start_time), self.config.trend_buckets);
        debug!("[Analyzer] Trips per slot: {:?}", series);
        detect_trend_with_threshold(&series, self.config.trend_change_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryTripRepository;
    use crate::TripId;

    const DAY_MS: i64 = 86_400_000;
    // 2024-06-15T00:00:00Z
    const NOW: i64 = 1_718_409_600_000;

    fn completed_trip(id: i64, category: TripCategory, start_time: i64, distance_km: f64) -> Trip {
        Trip {
            id: TripId(id),
            category,
            destination: String::new(),
            start_time,
            end_time: Some(start_time + 3_600_000),
            distance_km,
            is_active: false,
            notes: String::new(),
        }
    }

    #[test]
    fn test_window_uses_calendar_months() {
        let window = AnalysisWindow::trailing_months(NOW, 3);
        // 2024-03-15T00:00:00Z
        assert_eq!(window.start_ms, 1_710_460_800_000);
        assert_eq!(window.end_ms, NOW);
        assert_eq!(window.periods, 3);
    }

    #[test]
    fn test_window_beyond_calendar_range_saturates() {
        let window = AnalysisWindow::trailing_months(NOW, u32::MAX);
        assert!(window.start_ms < NOW);
        assert!(window.contains(0));
        assert_eq!(window.bucket_counts([NOW], 6), vec![0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_empty_history() {
        let analyzer = HistoricalAnalyzer::default();
        let analysis = analyzer.analyze_trips(&[], &analyzer.window(NOW));
        assert_eq!(analysis, HistoricalAnalysis::empty());
        assert_eq!(analysis.data_quality, DataQuality::Insufficient);
        assert_eq!(analysis.trend, Trend::Stable);
        assert_eq!(analysis.total_distance, 0.0);
    }

    #[test]
    fn test_data_quality_tiers() {
        assert_eq!(DataQuality::from_trip_count(0), DataQuality::Insufficient);
        assert_eq!(DataQuality::from_trip_count(1), DataQuality::Low);
        assert_eq!(DataQuality::from_trip_count(2), DataQuality::Low);
        assert_eq!(DataQuality::from_trip_count(3), DataQuality::Medium);
        assert_eq!(DataQuality::from_trip_count(9), DataQuality::Medium);
        assert_eq!(DataQuality::from_trip_count(10), DataQuality::High);
    }

    #[test]
    fn test_trend_thirds() {
        assert_eq!(detect_trend(&[1, 1, 1, 5, 5, 5]), Trend::Increasing);
        assert_eq!(detect_trend(&[5, 5, 1, 1, 1, 1]), Trend::Decreasing);
        assert_eq!(detect_trend(&[5, 5, 0, 0, 5, 6]), Trend::Stable); // +10%
        assert_eq!(detect_trend(&[1, 1]), Trend::Stable);
    }

    #[test]
    fn test_trend_zero_first_third_is_stable() {
        assert_eq!(detect_trend(&[0, 0, 3, 3, 9, 9]), Trend::Stable);
    }

    #[test]
    fn test_active_and_out_of_window_trips_ignored() {
        let analyzer = HistoricalAnalyzer::default();
        let mut active = completed_trip(1, TripCategory::Local, NOW - DAY_MS, 5.0);
        active.is_active = true;
        active.end_time = None;
        let old = completed_trip(2, TripCategory::Local, NOW - 200 * DAY_MS, 5.0);
        let recent = completed_trip(3, TripCategory::Day, NOW - 2 * DAY_MS, 42.0);

        let analysis = analyzer.analyze_trips(&[active, old, recent], &analyzer.window(NOW));
        assert_eq!(analysis.total_trips, 1);
        assert_eq!(analysis.total_distance, 42.0);
        assert_eq!(analysis.avg_trips_per_period, 1.0 / 3.0);
        assert_eq!(analysis.avg_distance_per_period, 14.0);
        assert_eq!(analysis.data_quality, DataQuality::Low);
    }

    #[test]
    fn test_increasing_trend_from_late_trips() {
        let analyzer = HistoricalAnalyzer::default();
        let window = analyzer.window(NOW);
        let slot = (window.end_ms - window.start_ms) / 6;
        // Slot counts [1, 0, 0, 0, 2, 3]
        let slots = [0, 4, 4, 5, 5, 5];
        let trips: Vec<Trip> = slots
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                completed_trip(i as i64, TripCategory::Local, window.start_ms + s * slot + slot / 2, 10.0)
            })
            .collect();

        let analysis = analyzer.analyze_trips(&trips, &window);
        assert_eq!(analysis.trend, Trend::Increasing);
        assert_eq!(analysis.trips_by_category.get(&TripCategory::Local), Some(&6));
    }

    #[test]
    fn test_fewer_than_six_trips_always_stable() {
        let analyzer = HistoricalAnalyzer::default();
        let window = analyzer.window(NOW);
        let trips: Vec<Trip> = (0..5)
            .map(|i| completed_trip(i, TripCategory::Day, NOW - DAY_MS - i, 1.0))
            .collect();
        assert_eq!(analyzer.analyze_trips(&trips, &window).trend, Trend::Stable);
    }

    #[test]
    fn test_most_frequent_category_tie_breaks_by_declaration_order() {
        let mut analysis = HistoricalAnalysis::empty();
        assert_eq!(analysis.most_frequent_category(), None);
        analysis.trips_by_category.insert(TripCategory::Day, 2);
        analysis.trips_by_category.insert(TripCategory::Local, 2);
        analysis.trips_by_category.insert(TripCategory::MultiDay, 1);
        assert_eq!(analysis.most_frequent_category(), Some(TripCategory::Local));
    }

    #[test]
    fn test_analyze_reads_repository_window() {
        let repo = InMemoryTripRepository::with_trips(vec![
            completed_trip(1, TripCategory::Local, NOW - 10 * DAY_MS, 3.0),
            completed_trip(2, TripCategory::Local, NOW - 120 * DAY_MS, 3.0),
        ]);
        let analysis = HistoricalAnalyzer::default().analyze(&repo, NOW).unwrap();
        assert_eq!(analysis.total_trips, 1);
    }

    #[test]
    fn test_bucket_counts_edges() {
        let window = AnalysisWindow {
            start_ms: 0,
            end_ms: 600,
            periods: 1,
        };
        let counts = window.bucket_counts([0, 99, 100, 599, 600, 601], 6);
        assert_eq!(counts, vec![2, 1, 0, 0, 0, 2]);
    }
}
