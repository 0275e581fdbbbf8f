//! Jitter filter for raw location samples.
//!
//! A sample is real movement only if it lies strictly farther than the noise
//! threshold (5 m by default) from the last accepted point. The filter itself is
//! pure: the caller owns the last accepted point and the running distance.

use crate::config::TrackingConfig;
use crate::geo_utils::haversine_distance;
use crate::{GpsPoint, LocationSample};

/// Outcome of running one sample through the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterDecision {
    /// Real movement. `increment_meters` is the distance to add to the trip.
    Accept { increment_meters: f64 },
    /// Jitter or an untrusted fix. `distance_meters` is the measured
    /// displacement, `None` when the sample was rejected on accuracy.
    Reject { distance_meters: Option<f64> },
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterDecision::Accept { .. })
    }
}

/// Decides whether a sample is movement or noise.
#[derive(Debug, Clone, Default)]
pub struct LocationFilter {
    config: TrackingConfig,
}

impl LocationFilter {
    pub fn new(config: TrackingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Evaluate `sample` against the last accepted point.
    ///
    /// The first sample of a trip is always accepted with zero increment.
    pub fn evaluate(&self, last_accepted: Option<&GpsPoint>, sample: &LocationSample) -> FilterDecision {
        if let Some(max_accuracy) = self.config.max_accuracy_meters {
            // Non-positive accuracy means "unknown" and is never gated
            if sample.accuracy > max_accuracy {
                return FilterDecision::Reject {
                    distance_meters: None,
                };
            }
        }

        let Some(last) = last_accepted else {
            return FilterDecision::Accept {
                increment_meters: 0.0,
            };
        };

        let distance = haversine_distance(last, &sample.point());
        if distance <= self.config.noise_threshold_meters {
            FilterDecision::Reject {
                distance_meters: Some(distance),
            }
        } else {
            FilterDecision::Accept {
                increment_meters: distance,
            }
        }
    }
}
