use polars::prelude::*;

use crate::error::Result;
use crate::record::{normalize_label, LogRow};
use crate::schema;

/// Raw-log view as a DataFrame with one column per current schema column.
/// Nulls are preserved and the timestamp column is `Datetime(ms, UTC-naive)`.
pub fn to_dataframe(rows: &[LogRow]) -> Result<DataFrame> {
    let millis: Vec<Option<i64>> = rows
        .iter()
        .map(|row| row.timestamp.map(|ts| ts.timestamp_millis()))
        .collect();
    let timestamps = Series::new(schema::TIMESTAMP.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    let scores: Vec<Option<i64>> = rows.iter().map(|row| row.feedback_score).collect();

    let df = DataFrame::new(vec![
        timestamps.into(),
        text_column(rows, schema::MODEL_VERSION, |r| r.model_version.as_deref()),
        number_column(rows, schema::PRICE, |r| r.price),
        number_column(rows, schema::DISCOUNT_PCT, |r| r.discount_pct),
        text_column(rows, schema::PRODUCT_CATEGORY, |r| r.product_category.as_deref()),
        text_column(rows, schema::CUSTOMER_SEGMENT, |r| r.customer_segment.as_deref()),
        number_column(rows, schema::UNITS_SOLD_PRED, |r| r.units_sold_pred),
        number_column(rows, schema::ACTUAL_UNITS_SOLD, |r| r.actual_units_sold),
        number_column(rows, schema::ABS_ERROR, |r| r.abs_error),
        number_column(rows, schema::SQUARED_ERROR, |r| r.squared_error),
        number_column(rows, schema::LATENCY_MS, |r| r.latency_ms),
        Series::new(schema::FEEDBACK_SCORE.into(), scores).into(),
        text_column(rows, schema::FEEDBACK_TEXT, |r| r.feedback_text.as_deref()),
    ])?;
    Ok(df)
}

/// Same view with product category and customer segment normalised, which is
/// the form the analytics group on.
pub(crate) fn to_grouping_frame(rows: &[LogRow]) -> Result<DataFrame> {
    let mut df = to_dataframe(rows)?;
    df.with_column(label_column(rows, schema::PRODUCT_CATEGORY, |r| r.product_category.as_deref()))?;
    df.with_column(label_column(rows, schema::CUSTOMER_SEGMENT, |r| r.customer_segment.as_deref()))?;
    Ok(df)
}

fn label_column(rows: &[LogRow], name: &str, get: fn(&LogRow) -> Option<&str>) -> Series {
    let values: Vec<Option<String>> = rows.iter().map(|row| get(row).map(normalize_label)).collect();
    Series::new(name.into(), values)
}

fn text_column(rows: &[LogRow], name: &str, get: fn(&LogRow) -> Option<&str>) -> Column {
    let values: Vec<Option<&str>> = rows.iter().map(get).collect();
    Series::new(name.into(), values).into()
}

fn number_column(rows: &[LogRow], name: &str, get: fn(&LogRow) -> Option<f64>) -> Column {
    let values: Vec<Option<f64>> = rows.iter().map(get).collect();
    Series::new(name.into(), values).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_dataframe_shape_and_nulls() {
        let rows = vec![
            LogRow {
                timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
                model_version: Some("v1".to_string()),
                units_sold_pred: Some(3.0),
                ..Default::default()
            },
            LogRow {
                model_version: Some("v2".to_string()),
                actual_units_sold: Some(4.0),
                ..Default::default()
            },
        ];
        let df = to_dataframe(&rows).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), schema::CURRENT_COLUMNS.len());
        assert_eq!(df.column(schema::TIMESTAMP).unwrap().as_series().unwrap().null_count(), 1);
        assert_eq!(df.column(schema::ACTUAL_UNITS_SOLD).unwrap().as_series().unwrap().null_count(), 1);
        assert_eq!(df.column(schema::FEEDBACK_TEXT).unwrap().as_series().unwrap().null_count(), 2);
    }

    #[test]
    fn test_grouping_frame_normalises_labels() {
        let rows = vec![
            LogRow {
                product_category: Some(" home  decor ".to_string()),
                customer_segment: Some("PREMIUM".to_string()),
                ..Default::default()
            },
            LogRow::default(),
        ];
        let df = to_grouping_frame(&rows).unwrap();
        assert_eq!(df.width(), schema::CURRENT_COLUMNS.len());
        let categories = df.column(schema::PRODUCT_CATEGORY).unwrap().str().unwrap();
        assert_eq!(categories.get(0), Some("Home Decor"));
        assert_eq!(categories.get(1), None);
        let segments = df.column(schema::CUSTOMER_SEGMENT).unwrap().str().unwrap();
        assert_eq!(segments.get(0), Some("Premium"));
    }

    #[test]
    fn test_empty_rows() {
        let df = to_dataframe(&[]).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), schema::CURRENT_COLUMNS.len());
    }
}
