//! Rule-based recommendations from a forecast and its analysis.
//!
//! Rules run in a fixed order and each adds at most one recommendation. The
//! list is then sorted by priority (stable, so equal priorities keep rule
//! order). A fallback guarantees the list is never empty.

use serde::{Deserialize, Serialize};

use crate::analysis::{HistoricalAnalysis, Trend};
use crate::forecast::MonthlyForecast;
use crate::TripCategory;

/// Predicted distance (km) below which exploring is suggested.
pub const LOW_DISTANCE_KM: f64 = 50.0;
/// Predicted trip count below which a goal is suggested.
pub const LOW_TRIP_COUNT: u32 = 3;
/// Local-heavy histories above this many trips get a variety nudge.
pub const VARIETY_MIN_TRIPS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    ActivityBoost,
    Exploration,
    GoalSetting,
    Variety,
    PositiveFeedback,
    General,
}

/// Declared lowest to highest so `Ord` ranks `High` first when sorting descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

impl Recommendation {
    fn new(kind: RecommendationType, title: &str, description: &str, priority: Priority) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description: description.to_string(),
            priority,
        }
    }
}

/// Stateless recommendation generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn recommend(&self, forecast: &MonthlyForecast, analysis: &HistoricalAnalysis) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        if analysis.trend == Trend::Decreasing {
            recommendations.push(Recommendation::new(
                RecommendationType::ActivityBoost,
                "Boost your activity",
                "You have travelled less in recent months. Try planning a local outing this weekend!",
                Priority::High,
            ));
        }

        if forecast.predicted_distance < LOW_DISTANCE_KM {
            recommendations.push(Recommendation::new(
                RecommendationType::Exploration,
                "Explore new destinations",
                "Most of your trips stay close to home. How about a trip out of town?",
                Priority::Medium,
            ));
        }

        if forecast.predicted_trips < LOW_TRIP_COUNT {
            recommendations.push(Recommendation::new(
                RecommendationType::GoalSetting,
                "Set a goal",
                "Aim for at least one trip a week. Even a walk counts!",
                Priority::Medium,
            ));
        }

        if analysis.most_frequent_category() == Some(TripCategory::Local)
            && analysis.total_trips > VARIETY_MIN_TRIPS
        {
            recommendations.push(Recommendation::new(
                RecommendationType::Variety,
                "Add some variety",
                "You mostly take local trips. Try a multi-day journey!",
                Priority::Low,
            ));
        }

        if analysis.trend == Trend::Increasing {
            recommendations.push(Recommendation::new(
                RecommendationType::PositiveFeedback,
                "Great work!",
                "Your activity is growing. Keep it up!",
                Priority::Low,
            ));
        }

        if recommendations.is_empty() {
            recommendations.push(Recommendation::new(
                RecommendationType::General,
                "Keep the pace",
                "You are doing well. Keep recording your trips!",
                Priority::Low,
            ));
        }

        recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DataQuality;

    fn forecast(trips: u32, distance: f64) -> MonthlyForecast {
        MonthlyForecast {
            predicted_trips: trips,
            predicted_distance: distance,
            confidence: 0.85,
            message: String::new(),
        }
    }

    fn analysis(trend: Trend, local: u32, day: u32) -> HistoricalAnalysis {
        let mut analysis = HistoricalAnalysis::empty();
        analysis.trend = trend;
        analysis.data_quality = DataQuality::High;
        analysis.total_trips = local + day;
        if local > 0 {
            analysis.trips_by_category.insert(TripCategory::Local, local);
        }
        if day > 0 {
            analysis.trips_by_category.insert(TripCategory::Day, day);
        }
        analysis
    }

    fn kinds(recs: &[Recommendation]) -> Vec<RecommendationType> {
        recs.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_fallback_when_no_rule_fires() {
        let recs = RecommendationEngine::new().recommend(&forecast(5, 120.0), &analysis(Trend::Stable, 2, 8));
        assert_eq!(kinds(&recs), vec![RecommendationType::General]);
        assert_eq!(recs[0].priority, Priority::Low);
    }

    #[test]
    fn test_empty_history_gets_exploration_and_goal() {
        let recs = RecommendationEngine::new().recommend(&forecast(0, 0.0), &HistoricalAnalysis::empty());
        assert_eq!(
            kinds(&recs),
            vec![RecommendationType::Exploration, RecommendationType::GoalSetting]
        );
    }

    #[test]
    fn test_all_rules_sorted_by_priority() {
        // Decreasing with low numbers and a local-heavy history
        let recs = RecommendationEngine::new().recommend(&forecast(2, 10.0), &analysis(Trend::Decreasing, 6, 1));
        assert_eq!(
            kinds(&recs),
            vec![
                RecommendationType::ActivityBoost,
                RecommendationType::Exploration,
                RecommendationType::GoalSetting,
                RecommendationType::Variety,
            ]
        );
    }

    #[test]
    fn test_increasing_trend_praised_after_variety() {
        let recs = RecommendationEngine::new().recommend(&forecast(8, 200.0), &analysis(Trend::Increasing, 7, 0));
        assert_eq!(
            kinds(&recs),
            vec![RecommendationType::Variety, RecommendationType::PositiveFeedback]
        );
    }

    #[test]
    fn test_variety_needs_more_than_five_trips() {
        let recs = RecommendationEngine::new().recommend(&forecast(5, 120.0), &analysis(Trend::Stable, 5, 0));
        assert_eq!(kinds(&recs), vec![RecommendationType::General]);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_serialized_type_field() {
        let rec = Recommendation::new(RecommendationType::GoalSetting, "t", "d", Priority::Medium);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "GOAL_SETTING");
        assert_eq!(json["priority"], "MEDIUM");
    }
}
