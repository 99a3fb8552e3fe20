//! Classifier input vector

use serde::Serialize;

/// Anonymized principal components per transaction
pub const PCA_FEATURE_COUNT: usize = 28;

/// V1..V28 followed by the amount
pub const FEATURE_COUNT: usize = PCA_FEATURE_COUNT + 1;

/// Positional names, in classifier order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10",
    "V11", "V12", "V13", "V14", "V15", "V16", "V17", "V18", "V19", "V20",
    "V21", "V22", "V23", "V24", "V25", "V26", "V27", "V28", "Amount",
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("Expected {FEATURE_COUNT} features (V1-V28 + Amount), got {0}")]
    WrongLength(usize),

    #[error("Feature {name} is not a finite number")]
    NotFinite { name: &'static str },
}

/// Exactly 28 PCA components plus the amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(pca: [f64; PCA_FEATURE_COUNT], amount: f64) -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        values[..PCA_FEATURE_COUNT].copy_from_slice(&pca);
        values[PCA_FEATURE_COUNT] = amount;
        Self(values)
    }

    pub fn pca(&self) -> &[f64] {
        &self.0[..PCA_FEATURE_COUNT]
    }

    pub fn amount(&self) -> f64 {
        self.0[PCA_FEATURE_COUNT]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = FeatureError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let array: [f64; FEATURE_COUNT] = values
            .try_into()
            .map_err(|_| FeatureError::WrongLength(values.len()))?;

        if let Some(idx) = array.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::NotFinite { name: FEATURE_NAMES[idx] });
        }

        Ok(Self(array))
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = FeatureError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::try_from(values.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exactly_29_values() {
        let values: Vec<f64> = (0..29).map(|i| i as f64).collect();
        let vector = FeatureVector::try_from(values).unwrap();
        assert_eq!(vector.pca().len(), 28);
        assert_eq!(vector.amount(), 28.0);
    }

    #[test]
    fn rejects_other_lengths() {
        let short = vec![0.0; 28];
        let err = FeatureVector::try_from(short).unwrap_err();
        assert_eq!(err, FeatureError::WrongLength(28));
        assert!(err.to_string().contains("Expected 29 features"));

        assert!(FeatureVector::try_from(vec![0.0; 30]).is_err());
        assert!(FeatureVector::try_from(Vec::<f64>::new()).is_err());
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut values = vec![0.0; 29];
        values[28] = f64::NAN;
        let err = FeatureVector::try_from(values).unwrap_err();
        assert_eq!(err, FeatureError::NotFinite { name: "Amount" });
    }

    #[test]
    fn serializes_as_flat_array() {
        let vector = FeatureVector::new([1.5; 28], 10.0);
        let json = serde_json::to_value(vector).unwrap();
        let array = json.as_array().unwrap();
        assert_eq!(array.len(), 29);
        assert_eq!(array[28], 10.0);
    }
}
