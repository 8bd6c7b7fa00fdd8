use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ByteRecord;
use std::borrow::Cow;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};
use crate::record::LogRow;
use crate::schema::{self, Schema, CURRENT_COLUMNS};

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Reads the whole store at `path`, oldest first. A missing store is an empty log.
pub fn load_rows<P: AsRef<Path>>(path: P) -> Result<Vec<LogRow>> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "log store does not exist yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(MonitorError::read(path, e)),
    };
    let mut rows = parse_rows(file).map_err(|e| MonitorError::read(path, e))?;
    order_chronologically(&mut rows);
    debug!(path = %path.display(), rows = rows.len(), "log store loaded");
    Ok(rows)
}

/// Decodes CSV content into rows, in file order. Invalid UTF-8 is replaced
/// rather than dropping the row; only an I/O failure is an error.
pub fn parse_rows<R: Read>(source: R) -> std::result::Result<Vec<LogRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let header: Vec<String> = decode(reader.byte_headers()?)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();
    let detected = Schema::detect(&header);
    if !detected.is_current() {
        debug!(?detected, ?header, "store header differs from the current schema");
    }

    let mut rows = Vec::new();
    for (index, record) in reader.byte_records().enumerate() {
        let fields = decode(&record?);
        rows.push(map_record(&header, &fields, index));
    }
    Ok(rows)
}

fn decode(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| match String::from_utf8_lossy(field) {
            Cow::Borrowed(text) => text.to_string(),
            Cow::Owned(text) => {
                warn!(field = %text, "invalid UTF-8 in log field, replacing");
                text
            }
        })
        .collect()
}

/// Sorts by timestamp ascending. Unknown timestamps go last; ties keep file order.
pub fn order_chronologically(rows: &mut [LogRow]) {
    rows.sort_by_key(|row| (row.timestamp.is_none(), row.timestamp));
}

fn map_record(header: &[String], fields: &[String], index: usize) -> LogRow {
    let mut row = LogRow::default();
    if fields.len() == header.len() {
        for (column, value) in header.iter().zip(fields) {
            assign(&mut row, column, value);
        }
    } else if fields.len() == CURRENT_COLUMNS.len() {
        // Appended by a newer writer under an older header.
        for (column, value) in CURRENT_COLUMNS.iter().zip(fields) {
            assign(&mut row, column, value);
        }
    } else {
        warn!(
            record = index,
            fields = fields.len(),
            columns = header.len(),
            "ragged log record, mapping overlapping columns only"
        );
        for (column, value) in header.iter().zip(fields) {
            assign(&mut row, column, value);
        }
    }
    row
}

fn assign(row: &mut LogRow, column: &str, raw: &str) {
    if column.is_empty() {
        return;
    }
    row.cells.push((column.to_string(), raw.to_string()));
    let value = raw.trim();
    match column {
        schema::TIMESTAMP => {
            row.timestamp = parse_timestamp(value);
            if row.timestamp.is_none() {
                warn!(value, "unparseable timestamp, ordering row last");
            }
        }
        schema::MODEL_VERSION => row.model_version = parse_text(value),
        schema::PRICE => row.price = parse_number(column, value),
        schema::DISCOUNT_PCT => row.discount_pct = parse_number(column, value),
        schema::PRODUCT_CATEGORY => row.product_category = parse_text(value),
        schema::CUSTOMER_SEGMENT => row.customer_segment = parse_text(value),
        schema::UNITS_SOLD_PRED => row.units_sold_pred = parse_number(column, value),
        schema::ACTUAL_UNITS_SOLD => row.actual_units_sold = parse_number(column, value),
        schema::ABS_ERROR => row.abs_error = parse_number(column, value),
        schema::SQUARED_ERROR => row.squared_error = parse_number(column, value),
        schema::LATENCY_MS => row.latency_ms = parse_number(column, value),
        schema::FEEDBACK_SCORE => row.feedback_score = parse_score(value),
        schema::FEEDBACK_TEXT => row.feedback_text = parse_text(value),
        _ => {}
    }
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

fn parse_text(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_number(column: &str, value: &str) -> Option<f64> {
    if value.is_empty() {
        return None;
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        Ok(_) => None,
        Err(_) => {
            debug!(column, value, "unparseable number, reading as null");
            None
        }
    }
}

// Older writers stored scores through a float column, so "4.0" is valid.
fn parse_score(value: &str) -> Option<i64> {
    if let Ok(score) = value.parse::<i64>() {
        return Some(score);
    }
    let float = parse_number(schema::FEEDBACK_SCORE, value)?;
    (float.fract() == 0.0).then_some(float as i64)
}
