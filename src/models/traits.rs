use std::time::Instant;

use crate::error::{MonitorError, Result};

/// A trained units-sold model.
pub trait Predictor {
    fn predict(&self, features: &[f64]) -> Result<f64>;
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        (**self).predict(features)
    }
}

/// A prediction together with the wall-clock time it took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedPrediction {
    pub value: f64,
    pub latency_ms: f64,
}

/// Runs `predictor` and measures the call. Non-finite outputs are treated as failures.
pub fn timed_predict<P: Predictor + ?Sized>(
    version: &str,
    predictor: &P,
    features: &[f64],
) -> Result<TimedPrediction> {
    let started = Instant::now();
    let value = predictor.predict(features)?;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    if !value.is_finite() {
        return Err(MonitorError::Inference {
            version: version.to_string(),
            reason: format!("model returned {value}"),
        });
    }
    Ok(TimedPrediction { value, latency_ms })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f64);

    impl Predictor for Constant {
        fn predict(&self, _features: &[f64]) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_timed_predict_measures_latency() {
        let timed = timed_predict("v1", &Constant(4.5), &[1.0, 2.0]).unwrap();
        assert_eq!(timed.value, 4.5);
        assert!(timed.latency_ms >= 0.0);
    }

    #[test]
    fn test_non_finite_output_is_inference_error() {
        let err = timed_predict("v1", &Constant(f64::NAN), &[]).unwrap_err();
        assert!(matches!(err, MonitorError::Inference { .. }));
    }
}
