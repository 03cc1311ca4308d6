//! Shared fixtures for other crates' tests. Gated behind the
//! `test-utils` feature so it never ships in a release build.

use chrono::Utc;

use crate::SourceProduct;

/// A minimal, valid `SourceProduct` callers mutate field-by-field for
/// their own scenarios (`struct update syntax`: `SourceProduct { provider: ..., ..sample_product() }`).
pub fn sample_product() -> SourceProduct {
    SourceProduct {
        source_id: 1,
        external_id: "X1".into(),
        name: "widget".into(),
        description: None,
        platform_name: "dropi".into(),
        country_code: "CO".into(),
        sale_price: 1.0,
        suggested_price: 1.0,
        stock: 1,
        variations_amount: 1,
        score: 1.0,
        sold_units_last_7_days: 0,
        sold_units_last_30_days: 0,
        total_sold_units: 0,
        billing_last_7_days: 0.0,
        billing_last_30_days: 0.0,
        total_billing: 0.0,
        visible: true,
        categories: vec![],
        provider: None,
        gallery: serde_json::Value::Array(vec![]),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
