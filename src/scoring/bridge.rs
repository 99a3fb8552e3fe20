//! Scoring bridge
//!
//! Turns raw classifier verdicts into `Prediction`s. The bridge owns the
//! probability → class and probability → tier mappings; whatever the
//! classifier reports for those is only used for diagnostics.

use serde::Serialize;
use std::sync::Arc;

use super::classifier::{Classifier, ClassifierError, RawVerdict};
use super::features::FeatureVector;
use super::risk::{predicted_class, RiskLevel};

/// Model name reported when the classifier does not name itself
pub const UNKNOWN_MODEL: &str = "unknown";

/// Normalized classifier result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: i32,
    pub is_fraud: bool,
    pub fraud_probability: f64,
    pub risk_level: RiskLevel,
    pub model: String,
}

#[derive(Clone)]
pub struct ScoringBridge {
    classifier: Arc<dyn Classifier>,
}

impl ScoringBridge {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Score one transaction; any failure is a single error.
    pub async fn score(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        let verdict = self.classifier.score(features).await?;
        normalize(verdict)
    }

    /// Score many transactions in one classifier call.
    ///
    /// The call itself is all-or-nothing; a verdict that fails validation
    /// only nulls its own slot.
    pub async fn score_batch(
        &self,
        batch: &[FeatureVector],
    ) -> Result<Vec<Option<Prediction>>, ClassifierError> {
        let verdicts = self.classifier.score_batch(batch).await?;

        if verdicts.len() != batch.len() {
            return Err(ClassifierError::BatchLengthMismatch {
                expected: batch.len(),
                got: verdicts.len(),
            });
        }

        Ok(verdicts
            .into_iter()
            .enumerate()
            .map(|(idx, verdict)| match normalize(verdict) {
                Ok(prediction) => Some(prediction),
                Err(e) => {
                    tracing::warn!(row = idx, error = %e, "Discarding invalid verdict");
                    None
                }
            })
            .collect())
    }

    /// Batch scoring for ingestion: a failed call yields an unscored chunk.
    pub async fn score_batch_or_unscored(&self, batch: &[FeatureVector]) -> Vec<Option<Prediction>> {
        match self.score_batch(batch).await {
            Ok(predictions) => predictions,
            Err(e) => {
                tracing::warn!(rows = batch.len(), error = %e, "Batch scoring failed, storing rows unscored");
                vec![None; batch.len()]
            }
        }
    }
}

fn normalize(verdict: RawVerdict) -> Result<Prediction, ClassifierError> {
    let probability = verdict
        .fraud_probability
        .ok_or_else(|| ClassifierError::InvalidVerdict("missing fraud_probability".to_string()))?;

    if !(0.0..=1.0).contains(&probability) {
        return Err(ClassifierError::InvalidVerdict(format!(
            "fraud_probability {probability} outside [0, 1]"
        )));
    }

    let class = predicted_class(probability);
    let risk_level = RiskLevel::from_probability(probability);

    if let Some(reported) = verdict.prediction {
        if reported != i64::from(class) {
            tracing::debug!(reported, derived = class, probability, "Classifier label differs from derived class");
        }
    }
    if let Some(reported) = verdict.risk_level.as_deref() {
        if reported != risk_level.as_str() {
            tracing::debug!(reported, derived = %risk_level, probability, "Classifier tier differs from derived tier");
        }
    }

    Ok(Prediction {
        prediction: class,
        is_fraud: class == 1,
        fraud_probability: probability,
        risk_level,
        model: verdict
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Replays canned verdicts
    struct Canned {
        single: Result<RawVerdict, String>,
        batch: Result<Vec<RawVerdict>, String>,
    }

    #[async_trait]
    impl Classifier for Canned {
        async fn score(&self, _: &FeatureVector) -> Result<RawVerdict, ClassifierError> {
            self.single.clone().map_err(ClassifierError::InvalidOutput)
        }

        async fn score_batch(&self, _: &[FeatureVector]) -> Result<Vec<RawVerdict>, ClassifierError> {
            self.batch.clone().map_err(ClassifierError::InvalidOutput)
        }
    }

    fn verdict(probability: f64) -> RawVerdict {
        RawVerdict {
            prediction: Some(i64::from(probability >= 0.5)),
            fraud_probability: Some(probability),
            risk_level: Some("LOW".to_string()),
            model: Some("random_forest".to_string()),
        }
    }

    fn bridge(single: Result<RawVerdict, String>, batch: Result<Vec<RawVerdict>, String>) -> ScoringBridge {
        ScoringBridge::new(Arc::new(Canned { single, batch }))
    }

    fn vector() -> FeatureVector {
        FeatureVector::new([0.0; 28], 1.0)
    }

    #[tokio::test]
    async fn bridge_owns_tier_mapping() {
        // Classifier claims LOW, probability says HIGH
        let bridge = bridge(Ok(verdict(0.85)), Ok(vec![]));
        let prediction = bridge.score(&vector()).await.unwrap();

        assert_eq!(prediction.risk_level, RiskLevel::High);
        assert_eq!(prediction.prediction, 1);
        assert!(prediction.is_fraud);
        assert_eq!(prediction.model, "random_forest");
    }

    #[tokio::test]
    async fn class_derived_from_probability() {
        // 0.5 is not above the decision threshold even if the model says fraud
        let bridge = bridge(Ok(verdict(0.5)), Ok(vec![]));
        let prediction = bridge.score(&vector()).await.unwrap();

        assert_eq!(prediction.prediction, 0);
        assert_eq!(prediction.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn out_of_range_probability_fails() {
        let bridge = bridge(Ok(verdict(1.2)), Ok(vec![]));
        let err = bridge.score(&vector()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidVerdict(_)));
    }

    #[tokio::test]
    async fn missing_model_name_defaults() {
        let mut raw = verdict(0.1);
        raw.model = None;
        let bridge = bridge(Ok(raw), Ok(vec![]));
        assert_eq!(bridge.score(&vector()).await.unwrap().model, UNKNOWN_MODEL);
    }

    #[tokio::test]
    async fn classifier_failure_propagates() {
        let bridge = bridge(Err("boom".to_string()), Ok(vec![]));
        assert!(bridge.score(&vector()).await.is_err());
    }

    #[tokio::test]
    async fn bad_batch_item_only_nulls_its_slot() {
        let items = vec![verdict(0.9), RawVerdict::default(), verdict(0.3)];
        let bridge = bridge(Ok(verdict(0.0)), Ok(items));
        let results = bridge.score_batch(&[vector(); 3]).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().map(|p| p.risk_level), Some(RiskLevel::High));
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().map(|p| p.risk_level), Some(RiskLevel::Low));
    }

    #[tokio::test]
    async fn short_batch_is_rejected() {
        let bridge = bridge(Ok(verdict(0.0)), Ok(vec![verdict(0.2)]));
        let err = bridge.score_batch(&[vector(); 2]).await.unwrap_err();
        assert!(matches!(err, ClassifierError::BatchLengthMismatch { expected: 2, got: 1 }));
    }

    #[tokio::test]
    async fn failed_batch_degrades_to_unscored() {
        let bridge = bridge(Ok(verdict(0.0)), Err("process died".to_string()));
        let results = bridge.score_batch_or_unscored(&[vector(); 4]).await;

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(Option::is_none));
    }
}
