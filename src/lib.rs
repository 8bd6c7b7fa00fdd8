pub mod analytics;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod feature_engineering;
pub mod frame;
pub mod metrics;
pub mod models;
pub mod record;
pub mod schema;
pub mod serving;
pub mod store;

pub use analytics::{compare_models, filter, search, Dimension, Metric, ModelComparison, RowFilter};
pub use config::Config;
pub use error::{MonitorError, Result};
pub use feature_engineering::{FeatureLayout, SalesInput};
pub use models::{GbdtPredictor, Predictor};
pub use record::{EventDraft, EventRecord, LogRow};
pub use serving::{Feedback, PredictionService};
pub use store::LogStore;
