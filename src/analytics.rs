//! Read-only queries over loaded log rows, backing the monitoring dashboard.
//! Grouped statistics run as polars lazy queries over the raw-log frame.

use chrono::{DateTime, Utc};
use polars::prelude::{col, len, DataFrame, DataType, Expr, IntoLazy, StringChunked};
use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::frame::{to_dataframe, to_grouping_frame};
use crate::record::{normalize_label, LogRow};
use crate::schema;

pub use crate::metrics::{KeyMetrics, ModelComparison, Stats};

const VALUE: &str = "value";

/// Categorical column rows can be grouped or filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    ModelVersion,
    ProductCategory,
    CustomerSegment,
}

impl Dimension {
    /// Group key of `row`. Category and segment are normalised, model versions are not.
    pub fn key(self, row: &LogRow) -> Option<String> {
        match self {
            Dimension::ModelVersion => row.model_version.clone(),
            Dimension::ProductCategory => row.product_category.as_deref().map(normalize_label),
            Dimension::CustomerSegment => row.customer_segment.as_deref().map(normalize_label),
        }
    }

    fn column(self) -> &'static str {
        match self {
            Dimension::ModelVersion => schema::MODEL_VERSION,
            Dimension::ProductCategory => schema::PRODUCT_CATEGORY,
            Dimension::CustomerSegment => schema::CUSTOMER_SEGMENT,
        }
    }
}

/// Numeric column that can be aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Price,
    DiscountPct,
    UnitsSoldPred,
    ActualUnitsSold,
    AbsError,
    SquaredError,
    LatencyMs,
    FeedbackScore,
}

impl Metric {
    /// Column expression over the raw-log frame, as `Float64`. Errors fall back
    /// to values derived from actual and prediction where the row has none.
    pub fn expr(self) -> Expr {
        match self {
            Metric::Price => col(schema::PRICE),
            Metric::DiscountPct => col(schema::DISCOUNT_PCT),
            Metric::UnitsSoldPred => col(schema::UNITS_SOLD_PRED),
            Metric::ActualUnitsSold => col(schema::ACTUAL_UNITS_SOLD),
            Metric::AbsError => col(schema::ABS_ERROR).fill_null(residual().abs()),
            Metric::SquaredError => col(schema::SQUARED_ERROR).fill_null(residual() * residual()),
            Metric::LatencyMs => col(schema::LATENCY_MS),
            Metric::FeedbackScore => col(schema::FEEDBACK_SCORE).cast(DataType::Float64),
        }
    }
}

fn residual() -> Expr {
    col(schema::ACTUAL_UNITS_SOLD) - col(schema::UNITS_SOLD_PRED)
}

/// Equality filters; `None` leaves that dimension unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    pub model_version: Option<String>,
    pub product_category: Option<String>,
    pub customer_segment: Option<String>,
}

impl RowFilter {
    pub fn model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn product_category(mut self, category: impl Into<String>) -> Self {
        self.product_category = Some(category.into());
        self
    }

    pub fn customer_segment(mut self, segment: impl Into<String>) -> Self {
        self.customer_segment = Some(segment.into());
        self
    }

    pub fn matches(&self, row: &LogRow) -> bool {
        let version_ok = self
            .model_version
            .as_ref()
            .map_or(true, |wanted| row.model_version.as_ref() == Some(wanted));
        version_ok
            && label_matches(self.product_category.as_deref(), Dimension::ProductCategory, row)
            && label_matches(self.customer_segment.as_deref(), Dimension::CustomerSegment, row)
    }
}

fn label_matches(wanted: Option<&str>, dimension: Dimension, row: &LogRow) -> bool {
    match wanted {
        None => true,
        Some(wanted) => dimension.key(row) == Some(normalize_label(wanted)),
    }
}

pub fn filter(rows: &[LogRow], predicate: &RowFilter) -> Vec<LogRow> {
    rows.iter()
        .filter(|row| predicate.matches(row))
        .cloned()
        .collect()
}

/// Stats of `metric` per combination of `group_by` keys. Rows missing a key or
/// the metric are skipped; groups left without values are omitted.
pub fn aggregate(rows: &[LogRow], group_by: &[Dimension], metric: Metric) -> Result<BTreeMap<Vec<String>, Stats>> {
    let keys: Vec<&str> = group_by.iter().map(|dimension| dimension.column()).collect();
    let present = keys
        .iter()
        .fold(col(VALUE).is_not_null(), |acc, key| acc.and(col(*key).is_not_null()));
    let stats = [
        col(VALUE).count().cast(DataType::Int64).alias("count"),
        col(VALUE).mean().alias("mean"),
        col(VALUE).min().alias("min"),
        col(VALUE).max().alias("max"),
    ];

    let lazy = to_grouping_frame(rows)?
        .lazy()
        .with_column(metric.expr().alias(VALUE))
        .filter(present);
    let grouped = if keys.is_empty() {
        lazy.select(stats).collect()?
    } else {
        let by: Vec<Expr> = keys.iter().map(|key| col(*key)).collect();
        lazy.group_by(by).agg(stats).collect()?
    };

    let key_columns = keys
        .iter()
        .map(|key| grouped.column(key)?.str())
        .collect::<std::result::Result<Vec<&StringChunked>, _>>()?;
    let counts = grouped.column("count")?.i64()?;
    let means = grouped.column("mean")?.f64()?;
    let mins = grouped.column("min")?.f64()?;
    let maxs = grouped.column("max")?.f64()?;

    let mut out = BTreeMap::new();
    for i in 0..grouped.height() {
        let count = counts.get(i).unwrap_or(0) as usize;
        let (Some(mean), Some(min), Some(max)) = (means.get(i), mins.get(i), maxs.get(i)) else {
            continue;
        };
        if count == 0 {
            continue;
        }
        let key = key_columns
            .iter()
            .map(|column| column.get(i).unwrap_or_default().to_string())
            .collect();
        out.insert(key, Stats { count, mean, min, max });
    }
    Ok(out)
}

/// Latency and MAE per model version, in ascending version order. MAE only
/// counts rows carrying both ground truth and a prediction.
pub fn compare_models(rows: &[LogRow]) -> Result<Vec<ModelComparison>> {
    let evaluable = col(schema::ACTUAL_UNITS_SOLD)
        .is_not_null()
        .and(col(schema::UNITS_SOLD_PRED).is_not_null());
    let errors = Metric::AbsError.expr().filter(evaluable);

    let table = to_dataframe(rows)?
        .lazy()
        .filter(col(schema::MODEL_VERSION).is_not_null())
        .group_by([col(schema::MODEL_VERSION)])
        .agg([
            col(schema::LATENCY_MS).mean().alias("avg_latency_ms"),
            errors.clone().mean().alias("mae"),
            errors.count().cast(DataType::Int64).alias("evaluated_rows"),
        ])
        .collect()?;

    let versions = table.column(schema::MODEL_VERSION)?.str()?;
    let latencies = table.column("avg_latency_ms")?.f64()?;
    let maes = table.column("mae")?.f64()?;
    let evaluated = table.column("evaluated_rows")?.i64()?;

    let mut lines: Vec<ModelComparison> = (0..table.height())
        .filter_map(|i| {
            Some(ModelComparison {
                model_version: versions.get(i)?.to_string(),
                avg_latency_ms: latencies.get(i),
                mae: maes.get(i),
                evaluated_rows: evaluated.get(i).unwrap_or(0) as usize,
            })
        })
        .collect();
    lines.sort_by(|a, b| a.model_version.cmp(&b.model_version));
    Ok(lines)
}

/// Rows where any column's text contains `query`, ignoring case.
pub fn search(rows: &[LogRow], query: &str) -> Vec<LogRow> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| {
            row.text_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Distinct model versions, sorted.
pub fn model_versions(rows: &[LogRow]) -> Vec<String> {
    let mut versions: Vec<String> = rows
        .iter()
        .filter_map(|row| row.model_version.clone())
        .collect();
    versions.sort();
    versions.dedup();
    versions
}

pub fn summary(rows: &[LogRow]) -> Result<KeyMetrics> {
    let means = to_dataframe(rows)?
        .lazy()
        .select([
            Metric::FeedbackScore.expr().mean().alias(schema::FEEDBACK_SCORE),
            Metric::LatencyMs.expr().mean(),
            Metric::UnitsSoldPred.expr().mean(),
        ])
        .collect()?;
    Ok(KeyMetrics {
        total_predictions: rows.len(),
        avg_feedback_score: first_f64(&means, schema::FEEDBACK_SCORE)?,
        avg_latency_ms: first_f64(&means, schema::LATENCY_MS)?,
        avg_units_sold_pred: first_f64(&means, schema::UNITS_SOLD_PRED)?,
    })
}

fn first_f64(df: &DataFrame, name: &str) -> Result<Option<f64>> {
    Ok(df.column(name)?.f64()?.get(0))
}

/// Rows carrying feedback text, newest first, at most `limit`.
pub fn recent_comments(rows: &[LogRow], limit: usize) -> Vec<&LogRow> {
    let mut comments: Vec<&LogRow> = rows
        .iter()
        .rev()
        .filter(|row| row.feedback_text.as_deref().is_some_and(|t| !t.trim().is_empty()))
        .collect();
    comments.sort_by_key(|row| (row.timestamp.is_none(), Reverse(row.timestamp)));
    comments.truncate(limit);
    comments
}

/// `(timestamp, prediction)` points for rows with both, oldest first.
pub fn prediction_trend(rows: &[LogRow]) -> Vec<(DateTime<Utc>, f64)> {
    let mut points: Vec<_> = rows
        .iter()
        .filter_map(|row| Some((row.timestamp?, row.units_sold_pred?)))
        .collect();
    points.sort_by_key(|(ts, _)| *ts);
    points
}

/// Distinct values of `metric` with their counts, ascending by value, first `limit`.
pub fn value_counts(rows: &[LogRow], metric: Metric, limit: usize) -> Result<Vec<(f64, usize)>> {
    let counted = to_dataframe(rows)?
        .lazy()
        .select([metric.expr().alias(VALUE)])
        .filter(col(VALUE).is_not_null())
        .group_by([col(VALUE)])
        .agg([len().cast(DataType::Int64).alias("count")])
        .collect()?;

    let values = counted.column(VALUE)?.f64()?;
    let counts = counted.column("count")?.i64()?;
    let mut pairs: Vec<(f64, usize)> = values
        .into_iter()
        .zip(counts)
        .filter_map(|(value, count)| Some((value?, count? as usize)))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    pairs.truncate(limit);
    Ok(pairs)
}
