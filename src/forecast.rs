//! Next-period forecast from a historical analysis.
//!
//! The forecast scales the per-period averages by a trend multiplier and
//! attaches a confidence looked up from the data quality tier.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analysis::{DataQuality, HistoricalAnalysis, Trend};

/// Point forecast for the next period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyForecast {
    pub predicted_trips: u32,
    /// Kilometers
    pub predicted_distance: f64,
    /// In [0, 1]
    pub confidence: f64,
    pub message: String,
}

pub const INSUFFICIENT_DATA_MESSAGE: &str = "Not enough data to generate a forecast";

/// Stateless forecaster.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forecaster;

impl Forecaster {
    pub fn new() -> Self {
        Self
    }

    pub fn trend_multiplier(trend: Trend) -> f64 {
        match trend {
            Trend::Increasing => 1.15,
            Trend::Decreasing => 0.85,
            Trend::Stable => 1.0,
        }
    }

    pub fn confidence(quality: DataQuality) -> f64 {
        match quality {
            DataQuality::High => 0.85,
            DataQuality::Medium => 0.65,
            DataQuality::Low => 0.40,
            DataQuality::Insufficient => 0.0,
        }
    }

    pub fn message(trend: Trend) -> &'static str {
        match trend {
            Trend::Increasing => "Your activity is trending up, keep it going!",
            Trend::Decreasing => "Activity is down compared to previous months",
            Trend::Stable => "Activity is steady, keep up the pace",
        }
    }

    pub fn forecast(&self, analysis: &HistoricalAnalysis) -> MonthlyForecast {
        if analysis.data_quality == DataQuality::Insufficient {
            return MonthlyForecast {
                predicted_trips: 0,
                predicted_distance: 0.0,
                confidence: 0.0,
                message: INSUFFICIENT_DATA_MESSAGE.to_string(),
            };
        }

        let multiplier = Self::trend_multiplier(analysis.trend);
        let predicted_trips = (analysis.avg_trips_per_period * multiplier).floor().max(0.0) as u32;
        let predicted_distance = analysis.avg_distance_per_period * multiplier;

        debug!(
            "[Forecaster] x{:.2}: {} trips, {:.1} km",
            multiplier, predicted_trips, predicted_distance
        );

        MonthlyForecast {
            predicted_trips,
            predicted_distance,
            confidence: Self::confidence(analysis.data_quality),
            message: Self::message(analysis.trend).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn analysis(avg_trips: f64, avg_distance: f64, trend: Trend, quality: DataQuality) -> HistoricalAnalysis {
        HistoricalAnalysis {
            total_trips: (avg_trips * 3.0) as u32,
            total_distance: avg_distance * 3.0,
            avg_trips_per_period: avg_trips,
            avg_distance_per_period: avg_distance,
            trips_by_category: BTreeMap::new(),
            trend,
            data_quality: quality,
        }
    }

    #[test]
    fn test_insufficient_data() {
        let forecast = Forecaster::new().forecast(&HistoricalAnalysis::empty());
        assert_eq!(forecast.predicted_trips, 0);
        assert_eq!(forecast.predicted_distance, 0.0);
        assert_eq!(forecast.confidence, 0.0);
        assert_eq!(forecast.message, INSUFFICIENT_DATA_MESSAGE);
    }

    #[test]
    fn test_trend_multipliers() {
        let f = Forecaster::new();
        let up = f.forecast(&analysis(4.0, 100.0, Trend::Increasing, DataQuality::High));
        assert_eq!(up.predicted_trips, 4); // floor(4.6)
        assert!((up.predicted_distance - 115.0).abs() < 1e-9);

        let down = f.forecast(&analysis(4.0, 100.0, Trend::Decreasing, DataQuality::Medium));
        assert_eq!(down.predicted_trips, 3); // floor(3.4)
        assert!((down.predicted_distance - 85.0).abs() < 1e-9);
        assert_eq!(down.confidence, 0.65);

        let flat = f.forecast(&analysis(4.0, 100.0, Trend::Stable, DataQuality::Low));
        assert_eq!(flat.predicted_trips, 4);
        assert_eq!(flat.predicted_distance, 100.0);
        assert_eq!(flat.confidence, 0.40);
    }

    #[test]
    fn test_confidence_table_is_total() {
        assert_eq!(Forecaster::confidence(DataQuality::High), 0.85);
        assert_eq!(Forecaster::confidence(DataQuality::Medium), 0.65);
        assert_eq!(Forecaster::confidence(DataQuality::Low), 0.40);
        assert_eq!(Forecaster::confidence(DataQuality::Insufficient), 0.0);
    }

    #[test]
    fn test_forecast_is_idempotent() {
        let input = analysis(2.34, 57.1, Trend::Increasing, DataQuality::Medium);
        let f = Forecaster::new();
        assert_eq!(f.forecast(&input), f.forecast(&input));
    }

    #[test]
    fn test_messages_follow_trend() {
        let f = Forecaster::new();
        for trend in [Trend::Increasing, Trend::Decreasing, Trend::Stable] {
            let forecast = f.forecast(&analysis(1.0, 1.0, trend, DataQuality::Low));
            assert_eq!(forecast.message, Forecaster::message(trend));
        }
    }
}
