use serde::Deserialize;

use crate::error::{MonitorError, Result};
use crate::record::normalize_label;

/// Category levels in the order the one-hot encoder saw them at training time.
pub const PRODUCT_CATEGORIES: [&str; 5] = ["Electronics", "Fashion", "Home Decor", "Sports", "Toys"];
pub const CUSTOMER_SEGMENTS: [&str; 3] = ["Occasional", "Premium", "Regular"];

/// How a model expects its feature vector to be laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    /// `[net_price, discount_pct]`
    #[default]
    Numeric,
    /// One-hot category, one-hot segment, then `[net_price, discount_pct]`.
    OneHot,
}

/// Raw form inputs for one forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesInput {
    pub price: f64,
    pub discount_pct: f64,
    pub product_category: String,
    pub customer_segment: String,
}

impl SalesInput {
    pub fn new(
        price: f64,
        discount_pct: f64,
        product_category: impl Into<String>,
        customer_segment: impl Into<String>,
    ) -> Result<Self> {
        if !price.is_finite() || price < 0.0 {
            return Err(MonitorError::validation("price", format!("{price} is not a non-negative number")));
        }
        if !discount_pct.is_finite() || !(0.0..=100.0).contains(&discount_pct) {
            return Err(MonitorError::validation(
                "discount_pct",
                format!("{discount_pct} is outside 0..=100"),
            ));
        }
        Ok(Self {
            price,
            discount_pct,
            product_category: product_category.into(),
            customer_segment: customer_segment.into(),
        })
    }

    /// Effective price after the discount is applied.
    pub fn net_price(&self) -> f64 {
        self.price * (1.0 - self.discount_pct / 100.0)
    }

    pub fn to_features(&self, layout: FeatureLayout) -> Vec<f64> {
        match layout {
            FeatureLayout::Numeric => vec![self.net_price(), self.discount_pct],
            FeatureLayout::OneHot => {
                let mut features = Vec::with_capacity(PRODUCT_CATEGORIES.len() + CUSTOMER_SEGMENTS.len() + 2);
                features.extend(one_hot(&self.product_category, &PRODUCT_CATEGORIES));
                features.extend(one_hot(&self.customer_segment, &CUSTOMER_SEGMENTS));
                features.push(self.net_price());
                features.push(self.discount_pct);
                features
            }
        }
    }
}

// Unknown labels encode as all zeros, like an encoder fitted with handle_unknown=ignore.
fn one_hot<'a>(value: &str, levels: &'a [&'a str]) -> impl Iterator<Item = f64> + 'a {
    let value = normalize_label(value);
    levels
        .iter()
        .map(move |level| if *level == value { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_price() {
        let input = SalesInput::new(100.0, 10.0, "Sports", "Premium").unwrap();
        assert!((input.net_price() - 90.0).abs() < 1e-9);
        assert_eq!(input.to_features(FeatureLayout::Numeric), vec![input.net_price(), 10.0]);
    }

    #[test]
    fn test_one_hot_layout() {
        let input = SalesInput::new(50.0, 0.0, " home decor ", "regular").unwrap();
        let features = input.to_features(FeatureLayout::OneHot);
        assert_eq!(
            features,
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 50.0, 0.0]
        );
    }

    #[test]
    fn test_unknown_category_encodes_zeros() {
        let input = SalesInput::new(10.0, 5.0, "Garden", "Premium").unwrap();
        let features = input.to_features(FeatureLayout::OneHot);
        assert!(features[..5].iter().all(|v| *v == 0.0));
        assert_eq!(features[6], 1.0);
    }

    #[test]
    fn test_rejects_bad_discount() {
        assert!(SalesInput::new(10.0, 120.0, "Toys", "Regular").is_err());
        assert!(SalesInput::new(f64::NAN, 10.0, "Toys", "Regular").is_err());
    }
}
