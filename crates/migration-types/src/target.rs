use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `Product.status` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn from_visible(visible: bool) -> Self {
        if visible {
            ProductStatus::Active
        } else {
            ProductStatus::Inactive
        }
    }
}

/// `Multimedia.type` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformCountry {
    pub id: i64,
    pub platform_id: i64,
    pub country_id: i64,
}

/// The real `platforms(id, name)` lookup table `platform_countries.platform_id`
/// references. `resolvePlatformCountry` (spec §4.4) needs this to translate a
/// normalized platform name into the actual id the target DB assigned it,
/// rather than assuming one.
#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    pub id: i64,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseCategory {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformCategory {
    pub platform_id: i64,
    pub name: String,
    pub base_category_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub external_id: String,
    pub verified: bool,
    pub platform_country_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub sale_price: f64,
    pub suggested_price: f64,
    pub stock: i32,
    pub variations_amount: i32,
    pub score: f64,
    pub sold_units_last_7_days: i64,
    pub sold_units_last_30_days: i64,
    pub total_sold_units: i64,
    pub billing_last_7_days: f64,
    pub billing_last_30_days: f64,
    pub total_billing: f64,
    pub status: ProductStatus,
    pub platform_country_id: i64,
    pub provider_id: i64,
    pub base_category_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub id: i64,
    pub date: String,
    pub product_id: i64,
    pub stock: i32,
    pub sale_price: f64,
    pub sold_units: i32,
    pub sold_units_last_7_days: i64,
    pub sold_units_last_30_days: i64,
    pub total_sold_units: i64,
    pub billing_last_7_days: f64,
    pub billing_last_30_days: f64,
    pub total_billing: f64,
    pub suggested_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Multimedia {
    pub id: i64,
    pub product_id: i64,
    pub url: String,
    pub original_url: String,
    pub media_type: MediaType,
    pub extracted: bool,
}
