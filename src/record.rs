//! Prediction events as they are written, and log rows as they are read back.

use chrono::{DateTime, Utc};

use crate::error::{MonitorError, Result};

pub const MIN_FEEDBACK_SCORE: i64 = 1;
pub const MAX_FEEDBACK_SCORE: i64 = 5;

/// Everything the request handler knows about one prediction, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub model_version: String,
    pub price: f64,
    pub discount_pct: f64,
    pub product_category: String,
    pub customer_segment: String,
    pub units_sold_pred: f64,
    pub actual_units_sold: Option<f64>,
    pub latency_ms: Option<f64>,
    pub feedback_score: Option<i64>,
    pub feedback_text: Option<String>,
}

impl EventDraft {
    /// Validates the draft and stamps it with the current time. The store
    /// re-stamps the record with its write time when it is appended.
    pub fn build(self) -> Result<EventRecord> {
        self.build_at(Utc::now())
    }

    pub fn build_at(self, timestamp: DateTime<Utc>) -> Result<EventRecord> {
        let model_version = sanitize_text(&self.model_version);
        if model_version.is_empty() {
            return Err(MonitorError::validation("model_version", "must not be blank"));
        }

        let price = require_finite("price", self.price)?;
        if price < 0.0 {
            return Err(MonitorError::validation("price", format!("{price} is negative")));
        }
        let discount_pct = require_finite("discount_pct", self.discount_pct)?;
        if !(0.0..=100.0).contains(&discount_pct) {
            return Err(MonitorError::validation(
                "discount_pct",
                format!("{discount_pct} is outside 0..=100"),
            ));
        }
        let units_sold_pred = require_finite("units_sold_pred", self.units_sold_pred)?;
        let actual_units_sold = self
            .actual_units_sold
            .map(|v| require_finite("actual_units_sold", v))
            .transpose()?;
        let latency_ms = self
            .latency_ms
            .map(|v| require_finite("latency_ms", v))
            .transpose()?;
        if latency_ms.is_some_and(|v| v < 0.0) {
            return Err(MonitorError::validation("latency_ms", "must not be negative"));
        }
        if let Some(score) = self.feedback_score {
            if !(MIN_FEEDBACK_SCORE..=MAX_FEEDBACK_SCORE).contains(&score) {
                return Err(MonitorError::validation(
                    "feedback_score",
                    format!("{score} is outside {MIN_FEEDBACK_SCORE}..={MAX_FEEDBACK_SCORE}"),
                ));
            }
        }

        let residual = actual_units_sold.map(|actual| actual - units_sold_pred);

        Ok(EventRecord {
            timestamp,
            model_version,
            price,
            discount_pct,
            product_category: sanitize_text(&self.product_category),
            customer_segment: sanitize_text(&self.customer_segment),
            units_sold_pred,
            actual_units_sold,
            abs_error: residual.map(f64::abs),
            squared_error: residual.map(|r| r * r),
            latency_ms,
            feedback_score: self.feedback_score,
            feedback_text: self
                .feedback_text
                .as_deref()
                .map(sanitize_text)
                .filter(|text| !text.is_empty()),
        })
    }
}

/// One validated prediction event. Derived error fields are computed once, at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    timestamp: DateTime<Utc>,
    model_version: String,
    price: f64,
    discount_pct: f64,
    product_category: String,
    customer_segment: String,
    units_sold_pred: f64,
    actual_units_sold: Option<f64>,
    abs_error: Option<f64>,
    squared_error: Option<f64>,
    latency_ms: Option<f64>,
    feedback_score: Option<i64>,
    feedback_text: Option<String>,
}

impl EventRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn discount_pct(&self) -> f64 {
        self.discount_pct
    }

    pub fn product_category(&self) -> &str {
        &self.product_category
    }

    pub fn customer_segment(&self) -> &str {
        &self.customer_segment
    }

    pub fn units_sold_pred(&self) -> f64 {
        self.units_sold_pred
    }

    pub fn actual_units_sold(&self) -> Option<f64> {
        self.actual_units_sold
    }

    pub fn abs_error(&self) -> Option<f64> {
        self.abs_error
    }

    pub fn squared_error(&self) -> Option<f64> {
        self.squared_error
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn feedback_score(&self) -> Option<i64> {
        self.feedback_score
    }

    pub fn feedback_text(&self) -> Option<&str> {
        self.feedback_text.as_deref()
    }

    /// Same record carrying a different timestamp. Used by the writer to stamp
    /// the write time.
    pub(crate) fn restamped(&self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

/// One row read back from the store. Every field is optional because older
/// writers did not emit every column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRow {
    /// `None` when the stored timestamp could not be parsed.
    pub timestamp: Option<DateTime<Utc>>,
    pub model_version: Option<String>,
    pub price: Option<f64>,
    pub discount_pct: Option<f64>,
    pub product_category: Option<String>,
    pub customer_segment: Option<String>,
    pub units_sold_pred: Option<f64>,
    pub actual_units_sold: Option<f64>,
    pub abs_error: Option<f64>,
    pub squared_error: Option<f64>,
    pub latency_ms: Option<f64>,
    pub feedback_score: Option<i64>,
    pub feedback_text: Option<String>,
    /// Every stored cell as it was read, `(column, raw text)` in header order.
    /// Columns this reader has no field for are only kept here. Empty for rows
    /// built in memory.
    pub cells: Vec<(String, String)>,
}

impl LogRow {
    /// Stored `abs_error`, or `|actual - pred|` when the row predates that column.
    pub fn effective_abs_error(&self) -> Option<f64> {
        self.abs_error.or_else(|| self.residual().map(f64::abs))
    }

    pub fn effective_squared_error(&self) -> Option<f64> {
        self.squared_error.or_else(|| self.residual().map(|r| r * r))
    }

    /// True when both ground truth and prediction are known.
    pub fn is_evaluable(&self) -> bool {
        self.actual_units_sold.is_some() && self.units_sold_pred.is_some()
    }

    fn residual(&self) -> Option<f64> {
        Some(self.actual_units_sold? - self.units_sold_pred?)
    }

    /// Text of every present column, used by raw-log search. Rows read from the
    /// store give their cells verbatim, so `100.0` matches as written.
    pub fn text_fields(&self) -> Vec<String> {
        if !self.cells.is_empty() {
            return self
                .cells
                .iter()
                .map(|(_, raw)| raw.trim())
                .filter(|raw| !raw.is_empty())
                .map(str::to_string)
                .collect();
        }
        let mut fields = Vec::with_capacity(13);
        if let Some(ts) = self.timestamp {
            fields.push(ts.to_rfc3339());
        }
        fields.extend(
            [
                &self.model_version,
                &self.product_category,
                &self.customer_segment,
                &self.feedback_text,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
        fields.extend(
            [
                self.price,
                self.discount_pct,
                self.units_sold_pred,
                self.actual_units_sold,
                self.abs_error,
                self.squared_error,
                self.latency_ms,
            ]
            .into_iter()
            .flatten()
            .map(|v| v.to_string()),
        );
        if let Some(score) = self.feedback_score {
            fields.push(score.to_string());
        }
        fields
    }
}

impl From<&EventRecord> for LogRow {
    fn from(record: &EventRecord) -> Self {
        Self {
            timestamp: Some(record.timestamp),
            model_version: Some(record.model_version.clone()),
            price: Some(record.price),
            discount_pct: Some(record.discount_pct),
            product_category: Some(record.product_category.clone()),
            customer_segment: Some(record.customer_segment.clone()),
            units_sold_pred: Some(record.units_sold_pred),
            actual_units_sold: record.actual_units_sold,
            abs_error: record.abs_error,
            squared_error: record.squared_error,
            latency_ms: record.latency_ms,
            feedback_score: record.feedback_score,
            feedback_text: record.feedback_text.clone(),
            cells: Vec::new(),
        }
    }
}

/// Parses a numeric form field, failing instead of writing a corrupt value.
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| MonitorError::validation(field, format!("{raw:?} is not a number")))?;
    require_finite(field, value)
}

fn require_finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MonitorError::validation(field, format!("{value} is not a finite number")))
    }
}

/// Replaces line terminators and other control characters with spaces and trims.
/// Delimiters and quotes are left to the CSV writer's quoting.
pub fn sanitize_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Trim, collapse inner whitespace and title-case: `" home  decor "` -> `"Home Decor"`.
pub fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut at_word_start = true;
    for c in raw.split_whitespace().collect::<Vec<_>>().join(" ").chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EventDraft {
        EventDraft {
            model_version: "v1".to_string(),
            price: 100.0,
            discount_pct: 10.0,
            product_category: "Sports".to_string(),
            customer_segment: "Premium".to_string(),
            units_sold_pred: 7.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_derived_errors_present_with_actual() {
        let record = EventDraft {
            actual_units_sold: Some(10.0),
            ..draft()
        }
        .build()
        .unwrap();
        assert_eq!(record.abs_error(), Some(3.0));
        assert_eq!(record.squared_error(), Some(9.0));
    }

    #[test]
    fn test_derived_errors_absent_without_actual() {
        let record = draft().build().unwrap();
        assert_eq!(record.abs_error(), None);
        assert_eq!(record.squared_error(), None);
    }

    #[test]
    fn test_rejects_non_finite_prediction() {
        let err = EventDraft {
            units_sold_pred: f64::NAN,
            ..draft()
        }
        .build()
        .unwrap_err();
        assert!(matches!(err, MonitorError::Validation { field: "units_sold_pred", .. }));
    }

    #[test]
    fn test_rejects_out_of_range_feedback() {
        let err = EventDraft {
            feedback_score: Some(6),
            ..draft()
        }
        .build()
        .unwrap_err();
        assert!(matches!(err, MonitorError::Validation { field: "feedback_score", .. }));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("price", " 12.5 ").unwrap(), 12.5);
        assert!(parse_decimal("price", "twelve").is_err());
        assert!(parse_decimal("price", "inf").is_err());
    }

    #[test]
    fn test_feedback_text_sanitized() {
        let record = EventDraft {
            feedback_text: Some("  good,\r\nbut \"slow\"\n".to_string()),
            ..draft()
        }
        .build()
        .unwrap();
        assert_eq!(record.feedback_text(), Some("good,  but \"slow\""));
    }

    #[test]
    fn test_blank_feedback_text_is_none() {
        let record = EventDraft {
            feedback_text: Some(" \n ".to_string()),
            ..draft()
        }
        .build()
        .unwrap();
        assert_eq!(record.feedback_text(), None);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(" sports "), "Sports");
        assert_eq!(normalize_label("SPORTS"), "Sports");
        assert_eq!(normalize_label("home   decor"), "Home Decor");
    }

    #[test]
    fn test_effective_errors_fall_back_to_residual() {
        let row = LogRow {
            units_sold_pred: Some(7.0),
            actual_units_sold: Some(10.0),
            ..Default::default()
        };
        assert_eq!(row.effective_abs_error(), Some(3.0));
        assert_eq!(row.effective_squared_error(), Some(9.0));

        let stored = LogRow {
            abs_error: Some(2.5),
            ..row
        };
        assert_eq!(stored.effective_abs_error(), Some(2.5));
    }
}
