pub mod gbdt;
pub mod traits;

pub use self::gbdt::GbdtPredictor;
pub use self::traits::{timed_predict, Predictor, TimedPrediction};
