//! Tunable parameters for tracking and analysis.
//!
//! Every config struct has a `Default` carrying the production values, and the
//! whole set can be loaded from JSON handed over by the host app.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TripError};

/// Configuration for the location filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackingConfig {
    /// Minimum displacement in meters for a sample to count as movement.
    /// Anything closer to the last accepted point is GPS jitter.
    pub noise_threshold_meters: f64,
    /// Optional accuracy gate in meters. `None` keeps accuracy informational.
    pub max_accuracy_meters: Option<f64>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            noise_threshold_meters: 5.0,
            max_accuracy_meters: None,
        }
    }
}

/// Configuration for historical analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Length of the trailing look-back window, in months. Also the number of
    /// periods used to average counts and distances.
    pub window_months: u32,
    /// Number of equal-width time slots the window is cut into for trend detection
    pub trend_buckets: usize,
    /// Below this many trips the trend is always stable
    pub min_trips_for_trend: usize,
    /// Percent change between first and last third that counts as a trend
    pub trend_change_percent: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_months: 3,
            trend_buckets: 6,
            min_trips_for_trend: 6,
            trend_change_percent: 20.0,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub tracking: TrackingConfig,
    pub analysis: AnalysisConfig,
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.tracking.noise_threshold_meters;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(config_error(format!(
                "noiseThresholdMeters must be a non-negative number, got {}",
                threshold
            )));
        }
        if let Some(max_accuracy) = self.tracking.max_accuracy_meters {
            if !max_accuracy.is_finite() || max_accuracy <= 0.0 {
                return Err(config_error(format!(
                    "maxAccuracyMeters must be positive, got {}",
                    max_accuracy
                )));
            }
        }
        if self.analysis.window_months == 0 || self.analysis.window_months > MAX_WINDOW_MONTHS {
            return Err(config_error(format!(
                "windowMonths must be between 1 and {}, got {}",
                MAX_WINDOW_MONTHS, self.analysis.window_months
            )));
        }
        if self.analysis.trend_buckets < 3 {
            return Err(config_error(format!(
                "trendBuckets must be at least 3, got {}",
                self.analysis.trend_buckets
            )));
        }
        if !self.analysis.trend_change_percent.is_finite()
            || self.analysis.trend_change_percent < 0.0
        {
            return Err(config_error("trendChangePercent must be non-negative"));
        }
        Ok(())
    }
}

/// Longest analysis window accepted, in months.
pub const MAX_WINDOW_MONTHS: u32 = 1_200;

fn config_error(message: impl Into<String>) -> TripError {
    TripError::Config {
        message: message.into(),
    }
}
