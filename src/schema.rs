//! Column layout of the monitoring log, current and historical.

pub const TIMESTAMP: &str = "timestamp_utc";
pub const MODEL_VERSION: &str = "model_version";
pub const PRICE: &str = "price";
pub const DISCOUNT_PCT: &str = "discount_pct";
pub const PRODUCT_CATEGORY: &str = "product_category";
pub const CUSTOMER_SEGMENT: &str = "customer_segment";
pub const UNITS_SOLD_PRED: &str = "units_sold_pred";
pub const ACTUAL_UNITS_SOLD: &str = "actual_units_sold";
pub const ABS_ERROR: &str = "abs_error";
pub const SQUARED_ERROR: &str = "squared_error";
pub const LATENCY_MS: &str = "latency_ms";
pub const FEEDBACK_SCORE: &str = "feedback_score";
pub const FEEDBACK_TEXT: &str = "feedback_text";

/// Column order written by this crate.
pub const CURRENT_COLUMNS: [&str; 13] = [
    TIMESTAMP,
    MODEL_VERSION,
    PRICE,
    DISCOUNT_PCT,
    PRODUCT_CATEGORY,
    CUSTOMER_SEGMENT,
    UNITS_SOLD_PRED,
    ACTUAL_UNITS_SOLD,
    ABS_ERROR,
    SQUARED_ERROR,
    LATENCY_MS,
    FEEDBACK_SCORE,
    FEEDBACK_TEXT,
];

/// First writer: no ground truth columns.
const V1_COLUMNS: [&str; 10] = [
    TIMESTAMP,
    MODEL_VERSION,
    PRICE,
    DISCOUNT_PCT,
    PRODUCT_CATEGORY,
    CUSTOMER_SEGMENT,
    UNITS_SOLD_PRED,
    LATENCY_MS,
    FEEDBACK_SCORE,
    FEEDBACK_TEXT,
];

/// Second writer: ground truth appended, derived errors not yet stored.
const V2_COLUMNS: [&str; 11] = [
    TIMESTAMP,
    MODEL_VERSION,
    PRICE,
    DISCOUNT_PCT,
    PRODUCT_CATEGORY,
    CUSTOMER_SEGMENT,
    UNITS_SOLD_PRED,
    LATENCY_MS,
    FEEDBACK_SCORE,
    FEEDBACK_TEXT,
    ACTUAL_UNITS_SOLD,
];

/// Columns some early stores carried that no field maps to.
const LEGACY_EXTRA_COLUMNS: [&str; 2] = ["marketing_spend", "input_summary"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    V1,
    V2,
    V3,
    Unknown,
}

impl Schema {
    /// Names the writer generation a header came from. Legacy extra columns are
    /// ignored when matching.
    pub fn detect<S: AsRef<str>>(header: &[S]) -> Self {
        let core: Vec<&str> = header
            .iter()
            .map(|h| h.as_ref().trim())
            .filter(|h| !LEGACY_EXTRA_COLUMNS.contains(h))
            .collect();
        if core == CURRENT_COLUMNS {
            Schema::V3
        } else if core == V2_COLUMNS {
            Schema::V2
        } else if core == V1_COLUMNS {
            Schema::V1
        } else {
            Schema::Unknown
        }
    }

    pub fn is_current(self) -> bool {
        self == Schema::V3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_current() {
        assert_eq!(Schema::detect(&CURRENT_COLUMNS), Schema::V3);
    }

    #[test]
    fn test_detect_legacy_with_extras() {
        let mut header: Vec<&str> = V1_COLUMNS.to_vec();
        header.insert(4, "marketing_spend");
        header.push("input_summary");
        assert_eq!(Schema::detect(&header), Schema::V1);
        assert_eq!(Schema::detect(&V2_COLUMNS), Schema::V2);
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(Schema::detect(&["a", "b"]), Schema::Unknown);
    }
}
