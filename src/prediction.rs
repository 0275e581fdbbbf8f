//! # Prediction Service
//!
//! Runs the analysis pipeline (analyzer, forecaster, recommendation engine)
//! over the trip history and returns one combined result.
//!
//! Analysis only reads completed trips, so it can run on a background thread
//! while tracking keeps writing the active trip. Background requests follow
//! latest-request-wins: every spawn bumps a generation counter, and a result
//! from an older generation is discarded rather than returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::analysis::{HistoricalAnalysis, HistoricalAnalyzer};
use crate::clock::{Clock, SystemClock};
use crate::config::AnalysisConfig;
use crate::error::{Result, TripError};
use crate::forecast::{Forecaster, MonthlyForecast};
use crate::recommendations::{Recommendation, RecommendationEngine};
use crate::repository::TripRepository;

/// Combined output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub historical_analysis: HistoricalAnalysis,
    pub forecast: MonthlyForecast,
    pub recommendations: Vec<Recommendation>,
    /// Epoch milliseconds the window ended at
    pub generated_at: i64,
}

/// Handle for a background prediction.
pub struct PredictionHandle {
    generation: u64,
    latest: Arc<AtomicU64>,
    receiver: mpsc::Receiver<Result<PredictionResult>>,
}

impl PredictionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer request has been made since this one.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    /// Check if the prediction is complete (non-blocking).
    pub fn try_recv(&self) -> Option<Result<PredictionResult>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(self.discard_if_stale(result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_gone())),
        }
    }

    /// Wait for the prediction to complete (blocking).
    pub fn recv(self) -> Result<PredictionResult> {
        let result = self.receiver.recv().map_err(|_| worker_gone())?;
        self.discard_if_stale(result)
    }

    fn discard_if_stale(&self, result: Result<PredictionResult>) -> Result<PredictionResult> {
        if self.is_current() {
            result
        } else {
            Err(TripError::Superseded {
                generation: self.generation,
            })
        }
    }
}

fn worker_gone() -> TripError {
    TripError::repository("prediction worker exited without a result")
}

/// Wires the analysis pipeline to a repository.
///
/// Clones share the repository and the request generation, so a clone can
/// run analysis away from whatever owns the original.
#[derive(Clone)]
pub struct PredictionService {
    repository: Arc<dyn TripRepository>,
    clock: Arc<dyn Clock>,
    analyzer: HistoricalAnalyzer,
    forecaster: Forecaster,
    recommender: RecommendationEngine,
    generation: Arc<AtomicU64>,
}

impl PredictionService {
    pub fn new(repository: Arc<dyn TripRepository>) -> Self {
        Self::with_config(repository, Arc::new(SystemClock), AnalysisConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn TripRepository>,
        clock: Arc<dyn Clock>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            repository,
            clock,
            analyzer: HistoricalAnalyzer::new(config),
            forecaster: Forecaster::new(),
            recommender: RecommendationEngine::new(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Analyse the history, forecast the next period and build recommendations.
    pub fn generate_complete_prediction(&self) -> Result<PredictionResult> {
        let now = self.clock.now_millis();
        let analysis = self.analyzer.analyze(self.repository.as_ref(), now)?;
        Ok(self.finish(analysis, now))
    }

    fn finish(&self, analysis: HistoricalAnalysis, now: i64) -> PredictionResult {
        let forecast = self.forecaster.forecast(&analysis);
        let recommendations = self.recommender.recommend(&forecast, &analysis);
        info!(
            "[Prediction] Forecast {} trips / {:.1} km (confidence {:.2}), {} recommendations",
            forecast.predicted_trips,
            forecast.predicted_distance,
            forecast.confidence,
            recommendations.len()
        );
        PredictionResult {
            historical_analysis: analysis,
            forecast,
            recommendations,
            generated_at: now,
        }
    }

    /// Run the pipeline on a background thread.
    ///
    /// Any earlier handle still in flight becomes stale and will yield
    /// `Superseded` instead of its result.
    pub fn spawn_prediction(&self) -> PredictionHandle {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel();

        let latest = self.generation.clone();
        let repository = self.repository.clone();
        let analyzer = self.analyzer.clone();
        let forecaster = self.forecaster;
        let recommender = self.recommender;
        let now = self.clock.now_millis();

        thread::spawn(move || {
            let superseded = || {
                let stale = latest.load(Ordering::SeqCst) != generation;
                if stale {
                    debug!("[Prediction] Request {} superseded, dropping work", generation);
                }
                stale
            };

            if superseded() {
                tx.send(Err(TripError::Superseded { generation })).ok();
                return;
            }

            let analysis = match analyzer.analyze(repository.as_ref(), now) {
                Ok(a) => a,
                Err(e) => {
                    tx.send(Err(e)).ok();
                    return;
                }
            };

            if superseded() {
                tx.send(Err(TripError::Superseded { generation })).ok();
                return;
            }

            let forecast = forecaster.forecast(&analysis);
            let recommendations = recommender.recommend(&forecast, &analysis);
            tx.send(Ok(PredictionResult {
                historical_analysis: analysis,
                forecast,
                recommendations,
                generated_at: now,
            }))
            .ok();
        });

        PredictionHandle {
            generation,
            latest: self.generation.clone(),
            receiver: rx,
        }
    }

    /// Invalidate every in-flight background request.
    pub fn cancel_pending(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("[Prediction] Pending requests cancelled (now at {})", generation);
    }
}
