//! Row shapes for the target schema and their conversions to/from the
//! semantic entities in `migration_types::target`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use migration_types::{
    BaseCategory, Country, History, MediaType, Multimedia, Platform, PlatformCategory,
    PlatformCountry, Product, ProductStatus, Provider,
};

use crate::schema::{
    base_categories, countries, histories, multimedia, platform_categories, platform_countries,
    platforms, products, providers,
};

#[derive(Debug, Clone, Queryable)]
pub struct CountryRow {
    pub id: i64,
    pub code: String,
}

impl From<CountryRow> for Country {
    fn from(r: CountryRow) -> Self {
        Country { id: r.id, code: r.code }
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct PlatformRow {
    pub id: i64,
    pub name: String,
}

impl From<PlatformRow> for Platform {
    fn from(r: PlatformRow) -> Self {
        Platform { id: r.id, name: r.name }
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct PlatformCountryRow {
    pub id: i64,
    pub platform_id: i64,
    pub country_id: i64,
}

impl From<PlatformCountryRow> for PlatformCountry {
    fn from(r: PlatformCountryRow) -> Self {
        PlatformCountry {
            id: r.id,
            platform_id: r.platform_id,
            country_id: r.country_id,
        }
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct BaseCategoryRow {
    pub id: i64,
    pub name: String,
}

impl From<BaseCategoryRow> for BaseCategory {
    fn from(r: BaseCategoryRow) -> Self {
        BaseCategory { id: r.id, name: r.name }
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct PlatformCategoryRow {
    pub platform_id: i64,
    pub name: String,
    pub base_category_id: i64,
}

impl From<PlatformCategoryRow> for PlatformCategory {
    fn from(r: PlatformCategoryRow) -> Self {
        PlatformCategory {
            platform_id: r.platform_id,
            name: r.name,
            base_category_id: r.base_category_id,
        }
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct ProviderRow {
    pub id: i64,
    pub name: String,
    pub external_id: String,
    pub verified: bool,
    pub platform_country_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProviderRow> for Provider {
    fn from(r: ProviderRow) -> Self {
        Provider {
            id: r.id,
            name: r.name,
            external_id: r.external_id,
            verified: r.verified,
            platform_country_id: r.platform_country_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = providers)]
pub struct NewProvider {
    pub id: i64,
    pub name: String,
    pub external_id: String,
    pub verified: bool,
    pub platform_country_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable)]
pub struct ProductRow {
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
    pub status: String,
    pub platform_country_id: i64,
    pub provider_id: i64,
    pub base_category_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product {
            id: r.id,
            external_id: r.external_id,
            name: r.name,
            sale_price: r.sale_price,
            suggested_price: r.suggested_price,
            stock: r.stock,
            variations_amount: r.variations_amount,
            score: r.score,
            sold_units_last_7_days: r.sold_units_last_7_days,
            sold_units_last_30_days: r.sold_units_last_30_days,
            total_sold_units: r.total_sold_units,
            billing_last_7_days: r.billing_last_7_days,
            billing_last_30_days: r.billing_last_30_days,
            total_billing: r.total_billing,
            status: status_from_str(&r.status),
            platform_country_id: r.platform_country_id,
            provider_id: r.provider_id,
            base_category_id: r.base_category_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub fn status_from_str(s: &str) -> ProductStatus {
    match s {
        "ACTIVE" => ProductStatus::Active,
        _ => ProductStatus::Inactive,
    }
}

pub fn status_to_str(s: ProductStatus) -> &'static str {
    match s {
        ProductStatus::Active => "ACTIVE",
        ProductStatus::Inactive => "INACTIVE",
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = products)]
pub struct NewProduct {
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
    pub status: String,
    pub platform_country_id: i64,
    pub provider_id: i64,
    pub base_category_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable)]
pub struct HistoryRow {
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

impl From<HistoryRow> for History {
    fn from(r: HistoryRow) -> Self {
        History {
            id: r.id,
            date: r.date,
            product_id: r.product_id,
            stock: r.stock,
            sale_price: r.sale_price,
            sold_units: r.sold_units,
            sold_units_last_7_days: r.sold_units_last_7_days,
            sold_units_last_30_days: r.sold_units_last_30_days,
            total_sold_units: r.total_sold_units,
            billing_last_7_days: r.billing_last_7_days,
            billing_last_30_days: r.billing_last_30_days,
            total_billing: r.total_billing,
            suggested_price: r.suggested_price,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = histories)]
pub struct NewHistory {
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

#[derive(Debug, Clone, Queryable)]
pub struct MultimediaRow {
    pub id: i64,
    pub product_id: i64,
    pub url: String,
    pub original_url: String,
    pub media_type: String,
    pub extracted: bool,
}

impl From<MultimediaRow> for Multimedia {
    fn from(r: MultimediaRow) -> Self {
        Multimedia {
            id: r.id,
            product_id: r.product_id,
            url: r.url,
            original_url: r.original_url,
            media_type: media_type_from_str(&r.media_type),
            extracted: r.extracted,
        }
    }
}

pub fn media_type_from_str(s: &str) -> MediaType {
    match s {
        "video" => MediaType::Video,
        _ => MediaType::Image,
    }
}

pub fn media_type_to_str(t: MediaType) -> &'static str {
    match t {
        MediaType::Image => "image",
        MediaType::Video => "video",
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = multimedia)]
pub struct NewMultimedia {
    pub product_id: i64,
    pub url: String,
    pub original_url: String,
    pub media_type: String,
    pub extracted: bool,
}
