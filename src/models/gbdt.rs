use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use std::path::Path;
use tracing::debug;

use super::traits::Predictor;
use crate::config::ModelParams;
use crate::error::{MonitorError, Result};

/// Gradient boosted trees saved with `GBDT::save_model`.
pub struct GbdtPredictor {
    version: String,
    model: GBDT,
}

impl GbdtPredictor {
    pub fn load(params: &ModelParams) -> Result<Self> {
        let load_error = |reason: String| MonitorError::ModelLoad {
            version: params.version.clone(),
            path: params.path.clone(),
            reason,
        };
        let path = params
            .path
            .to_str()
            .ok_or_else(|| load_error("path is not valid UTF-8".to_string()))?;
        if !Path::new(path).is_file() {
            return Err(load_error("model file not found".to_string()));
        }
        let model = GBDT::load_model(path).map_err(|e| load_error(e.to_string()))?;
        debug!(version = %params.version, path, "gbdt model loaded");
        Ok(Self {
            version: params.version.clone(),
            model,
        })
    }
}

impl Predictor for GbdtPredictor {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        let feature: Vec<ValueType> = features.iter().map(|v| *v as ValueType).collect();
        let batch: DataVec = vec![Data::new_test_data(feature, None)];
        self.model
            .predict(&batch)
            .first()
            .map(|v| f64::from(*v))
            .ok_or_else(|| MonitorError::Inference {
                version: self.version.clone(),
                reason: "model produced no output".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_engineering::FeatureLayout;

    #[test]
    fn test_missing_model_file_is_load_error() {
        let params = ModelParams {
            version: "v1".to_string(),
            path: std::env::temp_dir().join(format!("missing-{}.gbdt", uuid::Uuid::new_v4())),
            features: FeatureLayout::Numeric,
        };
        let err = GbdtPredictor::load(&params).err().unwrap();
        assert!(matches!(err, MonitorError::ModelLoad { .. }));
    }
}
