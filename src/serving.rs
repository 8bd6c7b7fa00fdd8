use tracing::{info, instrument, warn};

use crate::config::ModelParams;
use crate::error::Result;
use crate::feature_engineering::{FeatureLayout, SalesInput};
use crate::models::{timed_predict, GbdtPredictor, Predictor};
use crate::record::{EventDraft, EventRecord};
use crate::store::LogStore;

/// One model version behind the forecast form.
pub struct ServedModel {
    pub version: String,
    pub layout: FeatureLayout,
    pub predictor: Box<dyn Predictor>,
}

/// Output of one model for one input.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub model_version: String,
    pub units_sold: f64,
    pub latency_ms: f64,
}

/// Optional outcome a user attaches when submitting predictions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feedback {
    pub score: Option<i64>,
    pub text: Option<String>,
    pub actual_units_sold: Option<f64>,
}

pub struct PredictionService {
    models: Vec<ServedModel>,
}

impl PredictionService {
    pub fn new(models: Vec<ServedModel>) -> Self {
        Self { models }
    }

    /// Loads every configured gbdt model.
    pub fn from_params(params: &[ModelParams]) -> Result<Self> {
        let models = params
            .iter()
            .map(|p| -> Result<ServedModel> {
                Ok(ServedModel {
                    version: p.version.clone(),
                    layout: p.features,
                    predictor: Box::new(GbdtPredictor::load(p)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(models))
    }

    /// Runs every model on `input`. Fails as soon as one model fails, so a
    /// failed forecast never reaches the log.
    #[instrument(skip(self))]
    pub fn predict_all(&self, input: &SalesInput) -> Result<Vec<Prediction>> {
        self.models
            .iter()
            .map(|model| -> Result<Prediction> {
                let features = input.to_features(model.layout);
                let timed = timed_predict(&model.version, &model.predictor, &features)
                    .inspect_err(|e| warn!(version = %model.version, error = %e, "prediction failed"))?;
                Ok(Prediction {
                    model_version: model.version.clone(),
                    units_sold: timed.value,
                    latency_ms: timed.latency_ms,
                })
            })
            .collect()
    }

    /// Logs one event per prediction, sharing the input and feedback.
    /// All records are validated before the first append; the store stamps
    /// each one with its write time.
    pub fn submit(
        &self,
        store: &LogStore,
        input: &SalesInput,
        predictions: &[Prediction],
        feedback: &Feedback,
    ) -> Result<Vec<EventRecord>> {
        let records = predictions
            .iter()
            .map(|prediction| {
                EventDraft {
                    model_version: prediction.model_version.clone(),
                    price: input.price,
                    discount_pct: input.discount_pct,
                    product_category: input.product_category.clone(),
                    customer_segment: input.customer_segment.clone(),
                    units_sold_pred: prediction.units_sold,
                    actual_units_sold: feedback.actual_units_sold,
                    latency_ms: Some(prediction.latency_ms),
                    feedback_score: feedback.score,
                    feedback_text: feedback.text.clone(),
                }
                .build()
            })
            .collect::<Result<Vec<_>>>()?;

        let written = records
            .iter()
            .map(|record| store.append(record))
            .collect::<Result<Vec<_>>>()?;
        info!(events = written.len(), "predictions logged");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::compare_models;
    use crate::error::MonitorError;

    struct NetPriceShare(f64);

    impl Predictor for NetPriceShare {
        fn predict(&self, features: &[f64]) -> Result<f64> {
            Ok(features[features.len() - 2] * self.0)
        }
    }

    struct Broken;

    impl Predictor for Broken {
        fn predict(&self, _features: &[f64]) -> Result<f64> {
            Err(MonitorError::Inference {
                version: "v2".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    fn temp_store() -> LogStore {
        LogStore::new(
            std::env::temp_dir()
                .join(format!("units-monitor-{}", uuid::Uuid::new_v4()))
                .join("monitoring_logs.csv"),
        )
    }

    fn service(second: Box<dyn Predictor>) -> PredictionService {
        PredictionService::new(vec![
            ServedModel {
                version: "v1".to_string(),
                layout: FeatureLayout::Numeric,
                predictor: Box::new(NetPriceShare(0.1)),
            },
            ServedModel {
                version: "v2".to_string(),
                layout: FeatureLayout::OneHot,
                predictor: second,
            },
        ])
    }

    #[test]
    fn test_predict_and_submit() {
        let service = service(Box::new(NetPriceShare(0.2)));
        let input = SalesInput::new(100.0, 50.0, "Toys", "Regular").unwrap();
        let predictions = service.predict_all(&input).unwrap();
        assert_eq!(predictions.len(), 2);
        assert!((predictions[0].units_sold - 5.0).abs() < 1e-9);
        assert!((predictions[1].units_sold - 10.0).abs() < 1e-9);

        let store = temp_store();
        let feedback = Feedback {
            score: Some(5),
            text: Some("spot on".to_string()),
            actual_units_sold: Some(8.0),
        };
        service.submit(&store, &input, &predictions, &feedback).unwrap();

        let rows = store.load().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.latency_ms.is_some()));
        let table = compare_models(&rows).unwrap();
        assert!((table[0].mae.unwrap() - 3.0).abs() < 1e-9);
        assert!((table[1].mae.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_prediction_logs_nothing() {
        let service = service(Box::new(Broken));
        let input = SalesInput::new(100.0, 0.0, "Toys", "Regular").unwrap();
        let err = service.predict_all(&input).unwrap_err();
        assert!(matches!(err, MonitorError::Inference { .. }));
    }

    #[test]
    fn test_invalid_feedback_writes_nothing() {
        let service = service(Box::new(NetPriceShare(0.2)));
        let input = SalesInput::new(100.0, 0.0, "Toys", "Regular").unwrap();
        let predictions = service.predict_all(&input).unwrap();
        let store = temp_store();
        let feedback = Feedback {
            score: Some(9),
            ..Default::default()
        };
        assert!(service.submit(&store, &input, &predictions, &feedback).is_err());
        assert!(store.reload().unwrap().is_empty());
    }
}
