//! Owned, versioned trained-model storage
//!
//! Model state lives here instead of in free-floating singletons: the
//! registry is shared by handle (`Arc<ModelRegistry>`), slots are guarded by
//! `RwLock`s, and every (re)train stamps a fresh version. Predictors and
//! detectors are fitted per user on that user's own history; the categorizer
//! is global since its training set is bundled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

use super::categorizer::Categorizer;
use super::detector::{AnomalyDetector, DetectorMetrics};
use super::predictor::{PredictorMetrics, SpendingPredictor};
use crate::error::{Error, Result};
use crate::models::Transaction;

/// A fitted model plus its registry bookkeeping
#[derive(Debug)]
pub struct TrainedModel<T> {
    pub model: T,
    /// Monotonic across the whole registry; bumps on every (re)train
    pub version: u64,
    pub trained_at: DateTime<Utc>,
}

/// Process-lifetime store for trained model state
#[derive(Default)]
pub struct ModelRegistry {
    categorizer: RwLock<Option<Arc<TrainedModel<Categorizer>>>>,
    predictors: RwLock<HashMap<String, Arc<TrainedModel<SpendingPredictor>>>>,
    detectors: RwLock<HashMap<String, Arc<TrainedModel<AnomalyDetector>>>>,
    next_version: AtomicU64,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn stamp<T>(&self, model: T) -> Arc<TrainedModel<T>> {
        Arc::new(TrainedModel {
            model,
            version: self.next_version.fetch_add(1, Ordering::SeqCst) + 1,
            trained_at: Utc::now(),
        })
    }

    /// Get the categorizer, training it on the bundled set on first use
    pub fn categorizer(&self) -> Result<Arc<TrainedModel<Categorizer>>> {
        if let Some(model) = self
            .categorizer
            .read()
            .map_err(|_| Error::Training("categorizer lock poisoned".into()))?
            .clone()
        {
            return Ok(model);
        }

        let mut slot = self
            .categorizer
            .write()
            .map_err(|_| Error::Training("categorizer lock poisoned".into()))?;
        // Another request may have trained while we waited for the lock
        if let Some(model) = slot.clone() {
            return Ok(model);
        }

        let trained = self.stamp(Categorizer::train()?);
        info!(version = trained.version, "Categorizer trained");
        *slot = Some(trained.clone());
        Ok(trained)
    }

    /// Get a user's predictor if one has been trained this process
    pub fn predictor(&self, user_id: &str) -> Option<Arc<TrainedModel<SpendingPredictor>>> {
        self.predictors.read().ok()?.get(user_id).cloned()
    }

    /// Train (or retrain) a user's predictor and store it
    pub fn train_predictor(
        &self,
        user_id: &str,
        transactions: &[Transaction],
    ) -> Result<(Arc<TrainedModel<SpendingPredictor>>, PredictorMetrics)> {
        let (predictor, metrics) = SpendingPredictor::train(transactions)?;
        let trained = self.stamp(predictor);
        info!(
            user = user_id,
            version = trained.version,
            mae = metrics.mae,
            "Spending predictor trained"
        );
        self.predictors
            .write()
            .map_err(|_| Error::Training("predictor lock poisoned".into()))?
            .insert(user_id.to_string(), trained.clone());
        Ok((trained, metrics))
    }

    /// Get a user's predictor, training it lazily from the given history
    pub fn predictor_or_train(
        &self,
        user_id: &str,
        transactions: &[Transaction],
    ) -> Result<Arc<TrainedModel<SpendingPredictor>>> {
        if let Some(model) = self.predictor(user_id) {
            return Ok(model);
        }
        let (trained, _) = self.train_predictor(user_id, transactions)?;
        Ok(trained)
    }

    /// Get a user's predictor or fail; for callers that must not train
    pub fn require_predictor(&self, user_id: &str) -> Result<Arc<TrainedModel<SpendingPredictor>>> {
        self.predictor(user_id).ok_or_else(|| {
            Error::ModelNotTrained(format!("no spending predictor trained for {}", user_id))
        })
    }

    /// Get a user's detector if one has been trained this process
    pub fn detector(&self, user_id: &str) -> Option<Arc<TrainedModel<AnomalyDetector>>> {
        self.detectors.read().ok()?.get(user_id).cloned()
    }

    /// Train (or retrain) a user's detector and store it
    pub fn train_detector(
        &self,
        user_id: &str,
        transactions: &[Transaction],
    ) -> Result<(Arc<TrainedModel<AnomalyDetector>>, DetectorMetrics)> {
        let (detector, metrics) = AnomalyDetector::train(transactions)?;
        let trained = self.stamp(detector);
        info!(
            user = user_id,
            version = trained.version,
            anomalies = metrics.detected_anomalies,
            "Anomaly detector trained"
        );
        self.detectors
            .write()
            .map_err(|_| Error::Training("detector lock poisoned".into()))?
            .insert(user_id.to_string(), trained.clone());
        Ok((trained, metrics))
    }

    /// Get a user's detector, training it lazily from the given history
    pub fn detector_or_train(
        &self,
        user_id: &str,
        transactions: &[Transaction],
    ) -> Result<Arc<TrainedModel<AnomalyDetector>>> {
        if let Some(model) = self.detector(user_id) {
            return Ok(model);
        }
        let (trained, _) = self.train_detector(user_id, transactions)?;
        Ok(trained)
    }

    /// Get a user's detector or fail; for callers that must not train
    pub fn require_detector(&self, user_id: &str) -> Result<Arc<TrainedModel<AnomalyDetector>>> {
        self.detector(user_id).ok_or_else(|| {
            Error::ModelNotTrained(format!("no anomaly detector trained for {}", user_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::{Duration, TimeZone};

    fn history() -> Vec<Transaction> {
        (0..25)
            .map(|i| {
                let date = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
                    + Duration::days(i as i64 * 3);
                Transaction {
                    id: i,
                    user_id: "u1".into(),
                    amount: 20.0 + (i % 4) as f64 * 8.0,
                    description: "tx".into(),
                    category: Some(Category::FoodDining),
                    predicted_category: None,
                    confidence_score: None,
                    date,
                    is_income: false,
                    is_anomaly: false,
                    content_hash: String::new(),
                    created_at: date,
                }
            })
            .collect()
    }

    #[test]
    fn categorizer_is_trained_once() {
        let registry = ModelRegistry::new();
        let first = registry.categorizer().unwrap();
        let second = registry.categorizer().unwrap();
        assert_eq!(first.version, second.version);
    }

    #[test]
    fn retraining_bumps_version() {
        let registry = ModelRegistry::new();
        let history = history();

        let (first, _) = registry.train_predictor("u1", &history).unwrap();
        let (second, _) = registry.train_predictor("u1", &history).unwrap();
        assert!(second.version > first.version);
    }

    #[test]
    fn models_are_per_user() {
        let registry = ModelRegistry::new();
        let history = history();

        registry.train_detector("u1", &history).unwrap();
        assert!(registry.detector("u1").is_some());
        assert!(registry.detector("u2").is_none());
    }

    #[test]
    fn require_before_training_is_a_state_error() {
        let registry = ModelRegistry::new();
        match registry.require_predictor("u1") {
            Err(Error::ModelNotTrained(_)) => {}
            other => panic!("expected ModelNotTrained, got {:?}", other.map(|_| ())),
        }
        match registry.require_detector("u1") {
            Err(Error::ModelNotTrained(_)) => {}
            other => panic!("expected ModelNotTrained, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn lazy_path_reuses_existing_model() {
        let registry = ModelRegistry::new();
        let history = history();

        let first = registry.predictor_or_train("u1", &history).unwrap();
        let second = registry.predictor_or_train("u1", &history).unwrap();
        assert_eq!(first.version, second.version);
    }
}
