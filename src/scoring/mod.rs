//! Scoring bridge between feature vectors and the external classifier

pub mod bridge;
pub mod classifier;
pub mod features;
pub mod risk;

pub use bridge::{Prediction, ScoringBridge};
pub use classifier::{Classifier, ClassifierError, ProcessClassifier, RawVerdict, RetryPolicy};
pub use features::{FeatureError, FeatureVector, FEATURE_COUNT, FEATURE_NAMES, PCA_FEATURE_COUNT};
pub use risk::{predicted_class, RiskLevel};
