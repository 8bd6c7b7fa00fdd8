//! Typed results of the analytics queries.

/// Count, mean and extrema over the non-null values of one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// One line of the cross-model comparison table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelComparison {
    pub model_version: String,
    pub avg_latency_ms: Option<f64>,
    /// Mean absolute error over rows with ground truth; `None` when there are none.
    pub mae: Option<f64>,
    pub evaluated_rows: usize,
}

/// Headline numbers shown above the dashboard tabs.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMetrics {
    pub total_predictions: usize,
    pub avg_feedback_score: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    pub avg_units_sold_pred: Option<f64>,
}
