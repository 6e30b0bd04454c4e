//! Fitted normalization loaded once at startup.
//!
//! The on-disk format carries the fitted parameters of the usual min-max and
//! standard scalers, one entry per feature:
//!
//! ```json
//! {"kind": "min_max", "data_min": [3.1], "data_max": [88.0], "feature_range": [0.0, 1.0]}
//! {"kind": "standard", "mean": [41.7], "scale": [12.9]}
//! ```

use crate::domain::errors::ScalerError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    MinMax {
        data_min: Vec<f64>,
        data_max: Vec<f64>,
        #[serde(default = "default_feature_range")]
        feature_range: [f64; 2],
    },
    Standard {
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
}

fn default_feature_range() -> [f64; 2] {
    [0.0, 1.0]
}

impl Scaler {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let scaler: Scaler = serde_json::from_str(content)?;
        scaler.validate()?;
        Ok(scaler)
    }

    /// Load the scaler if the file exists. A missing or unreadable file means
    /// the service runs unscaled.
    pub fn load_optional(path: &Path) -> Option<Self> {
        if !path.exists() {
            warn!("Scaler file not found at {:?}. Inputs will not be scaled.", path);
            return None;
        }

        match Self::load(path) {
            Ok(scaler) => {
                info!("Loaded {} scaler from {:?}", scaler.kind(), path);
                Some(scaler)
            }
            Err(e) => {
                warn!("Failed to load scaler from {:?}: {:#}", path, e);
                None
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler file {:?}", path))?;
        Self::from_json_str(&content)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scaler::MinMax { .. } => "min_max",
            Scaler::Standard { .. } => "standard",
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Scaler::MinMax { data_min, .. } => data_min.len(),
            Scaler::Standard { mean, .. } => mean.len(),
        }
    }

    fn validate(&self) -> Result<(), ScalerError> {
        let consistent = match self {
            Scaler::MinMax {
                data_min,
                data_max,
                feature_range,
            } => {
                if feature_range[0] >= feature_range[1] {
                    return Err(ScalerError::InvalidParameters {
                        reason: format!("feature_range {:?} is not increasing", feature_range),
                    });
                }
                data_min.len() == data_max.len()
            }
            Scaler::Standard { mean, scale } => mean.len() == scale.len(),
        };

        if !consistent || self.n_features() == 0 {
            return Err(ScalerError::InvalidParameters {
                reason: "parameter vectors are empty or of different lengths".to_string(),
            });
        }
        Ok(())
    }

    /// (offset, factor) such that `scaled = (x - offset) * factor + shift`
    fn coefficients(&self) -> Result<(f64, f64, f64), ScalerError> {
        if self.n_features() != 1 {
            return Err(ScalerError::FeatureMismatch {
                expected: self.n_features(),
                actual: 1,
            });
        }

        Ok(match self {
            Scaler::MinMax {
                data_min,
                data_max,
                feature_range,
            } => {
                let range = non_zero(data_max[0] - data_min[0]);
                let factor = (feature_range[1] - feature_range[0]) / range;
                (data_min[0], factor, feature_range[0])
            }
            Scaler::Standard { mean, scale } => (mean[0], 1.0 / non_zero(scale[0]), 0.0),
        })
    }

    /// Forward transform of a single-feature column
    pub fn transform(&self, column: &[f64]) -> Result<Vec<f64>, ScalerError> {
        let (offset, factor, shift) = self.coefficients()?;
        Ok(column.iter().map(|x| (x - offset) * factor + shift).collect())
    }

    /// Inverse transform of a single-feature column
    pub fn inverse_transform(&self, column: &[f64]) -> Result<Vec<f64>, ScalerError> {
        let (offset, factor, shift) = self.coefficients()?;
        Ok(column.iter().map(|y| (y - shift) / factor + offset).collect())
    }
}

// Constant features are left unscaled.
fn non_zero(value: f64) -> f64 {
    if value == 0.0 { 1.0 } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-12, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_min_max_scaling() {
        let scaler = Scaler::from_json_str(
            r#"{"kind": "min_max", "data_min": [10.0], "data_max": [20.0]}"#,
        )
        .unwrap();

        let scaled = scaler.transform(&[10.0, 15.0, 20.0]).unwrap();
        assert_close(&scaled, &[0.0, 0.5, 1.0]);
        assert_close(&scaler.inverse_transform(&scaled).unwrap(), &[10.0, 15.0, 20.0]);
    }

    #[test]
    fn test_min_max_custom_range() {
        let scaler = Scaler::MinMax {
            data_min: vec![0.0],
            data_max: vec![4.0],
            feature_range: [-1.0, 1.0],
        };
        assert_close(&scaler.transform(&[0.0, 2.0, 4.0]).unwrap(), &[-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_standard_scaling() {
        let scaler =
            Scaler::from_json_str(r#"{"kind": "standard", "mean": [5.0], "scale": [2.0]}"#)
                .unwrap();
        let scaled = scaler.transform(&[1.0, 5.0, 9.0]).unwrap();
        assert_close(&scaled, &[-2.0, 0.0, 2.0]);
        assert_close(&scaler.inverse_transform(&[-2.0]).unwrap(), &[1.0]);
    }

    #[test]
    fn test_zero_scale_is_treated_as_one() {
        let scaler = Scaler::Standard {
            mean: vec![3.0],
            scale: vec![0.0],
        };
        assert_close(&scaler.transform(&[4.0]).unwrap(), &[1.0]);
    }

    #[test]
    fn test_multi_feature_scaler_rejects_column() {
        let scaler = Scaler::Standard {
            mean: vec![0.0, 1.0],
            scale: vec![1.0, 1.0],
        };
        let err = scaler.transform(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            ScalerError::FeatureMismatch {
                expected: 2,
                actual: 1
            }
        );
        assert!(scaler.inverse_transform(&[1.0]).is_err());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(Scaler::from_json_str(r#"{"kind": "standard", "mean": [], "scale": []}"#).is_err());
        assert!(
            Scaler::from_json_str(
                r#"{"kind": "min_max", "data_min": [0.0], "data_max": [1.0], "feature_range": [1.0, 0.0]}"#
            )
            .is_err()
        );
        assert!(Scaler::from_json_str(r#"{"kind": "robust"}"#).is_err());
    }

    #[test]
    fn test_missing_file_means_no_scaler() {
        assert!(Scaler::load_optional(Path::new("/nonexistent/scaler.json")).is_none());
    }
}
