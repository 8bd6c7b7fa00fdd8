use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

use crate::data_loader;
use crate::error::{MonitorError, Result};
use crate::record::{EventRecord, LogRow};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Append-only CSV monitoring log with a short-lived read cache.
///
/// Appends through one `LogStore` are serialised by its writer lock. Appends
/// from other processes are not coordinated.
pub struct LogStore {
    path: PathBuf,
    cache_ttl: Duration,
    cache: Mutex<Option<CachedRows>>,
    writer: Mutex<WriterState>,
}

struct CachedRows {
    loaded_at: Instant,
    rows: Arc<Vec<LogRow>>,
}

#[derive(Default)]
struct WriterState {
    last_timestamp: Option<DateTime<Utc>>,
}

/// Column-for-column image of one stored row. Field order is the header order.
#[derive(Serialize)]
struct StoredRow<'a> {
    timestamp_utc: String,
    model_version: &'a str,
    price: f64,
    discount_pct: f64,
    product_category: &'a str,
    customer_segment: &'a str,
    units_sold_pred: f64,
    actual_units_sold: Option<f64>,
    abs_error: Option<f64>,
    squared_error: Option<f64>,
    latency_ms: Option<f64>,
    feedback_score: Option<i64>,
    feedback_text: Option<&'a str>,
}

impl<'a> From<&'a EventRecord> for StoredRow<'a> {
    fn from(record: &'a EventRecord) -> Self {
        Self {
            timestamp_utc: record
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            model_version: record.model_version(),
            price: record.price(),
            discount_pct: record.discount_pct(),
            product_category: record.product_category(),
            customer_segment: record.customer_segment(),
            units_sold_pred: record.units_sold_pred(),
            actual_units_sold: record.actual_units_sold(),
            abs_error: record.abs_error(),
            squared_error: record.squared_error(),
            latency_ms: record.latency_ms(),
            feedback_score: record.feedback_score(),
            feedback_text: record.feedback_text(),
        }
    }
}

impl LogStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_cache_ttl(path, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl<P: Into<PathBuf>>(path: P, cache_ttl: Duration) -> Self {
        Self {
            path: path.into(),
            cache_ttl,
            cache: Mutex::new(None),
            writer: Mutex::new(WriterState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record, writing the header first when the store is new or empty.
    /// The record is stamped with the write time, raised to the previous append's
    /// if the clock went backwards. Returns the record as written.
    #[instrument(skip(self, record), fields(path = %self.path.display(), model = record.model_version()))]
    pub fn append(&self, record: &EventRecord) -> Result<EventRecord> {
        let mut writer = lock(&self.writer);

        let now = Utc::now();
        let record = match writer.last_timestamp {
            Some(last) if now < last => record.restamped(last),
            _ => record.restamped(now),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MonitorError::write(&self.path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MonitorError::write(&self.path, e))?;
        let is_empty = file
            .metadata()
            .map_err(|e| MonitorError::write(&self.path, e))?
            .len()
            == 0;

        let mut out = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(file);
        out.serialize(StoredRow::from(&record))
            .map_err(|e| MonitorError::write(&self.path, e))?;
        out.flush().map_err(|e| MonitorError::write(&self.path, e))?;

        writer.last_timestamp = Some(record.timestamp());
        drop(writer);
        self.invalidate();

        debug!(header_written = is_empty, "appended event record");
        Ok(record)
    }

    /// All rows, oldest first, served from the cache while it is fresh.
    pub fn load(&self) -> Result<Arc<Vec<LogRow>>> {
        {
            let cache = lock(&self.cache);
            if let Some(cached) = cache.as_ref() {
                if cached.loaded_at.elapsed() < self.cache_ttl {
                    return Ok(Arc::clone(&cached.rows));
                }
            }
        }
        self.reload()
    }

    /// Reads the store bypassing the cache, then refreshes the cache.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn reload(&self) -> Result<Arc<Vec<LogRow>>> {
        let rows = Arc::new(data_loader::load_rows(&self.path)?);
        *lock(&self.cache) = Some(CachedRows {
            loaded_at: Instant::now(),
            rows: Arc::clone(&rows),
        });
        info!(rows = rows.len(), "monitoring log reloaded");
        Ok(rows)
    }

    pub fn invalidate(&self) {
        lock(&self.cache).take();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
