use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use migration_types::{MigrationError, MigrationResult, SourceProduct};

use crate::schema::legacy_products;
use crate::SourceReader;

pub type LegacyPool = bb8::Pool<AsyncPgConnection>;
pub type LegacyPoolError = diesel_async::pooled_connection::PoolError;

/// The platform excluded from every migration run (spec §4.3).
const EXCLUDED_PLATFORM: &str = "rocketfy";

pub async fn build_legacy_pool(database_url: &str) -> MigrationResult<LegacyPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    bb8::Pool::builder()
        .max_size(5)
        .build(manager)
        .await
        .map_err(|e| MigrationError::Configuration(format!("failed to build legacy pool: {e}")))
}

#[derive(Queryable)]
struct LegacyProductRow {
    id: i64,
    external_id: String,
    name: String,
    description: Option<String>,
    platform_name: String,
    country_code: String,
    sale_price: f64,
    suggested_price: f64,
    stock: i32,
    variations_amount: i32,
    score: f64,
    sold_units_last_7_days: i64,
    sold_units_last_30_days: i64,
    total_sold_units: i64,
    billing_last_7_days: f64,
    billing_last_30_days: f64,
    total_billing: f64,
    visible: bool,
    categories: serde_json::Value,
    provider: Option<serde_json::Value>,
    gallery: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LegacyProductRow> for SourceProduct {
    fn from(row: LegacyProductRow) -> Self {
        let categories = serde_json::from_value(row.categories).unwrap_or_else(|e| {
            tracing::warn!(external_id = %row.external_id, error = %e, "malformed categories array; treating as empty");
            Vec::new()
        });
        SourceProduct {
            source_id: row.id,
            external_id: row.external_id,
            name: row.name,
            description: row.description,
            platform_name: row.platform_name,
            country_code: row.country_code,
            sale_price: row.sale_price,
            suggested_price: row.suggested_price,
            stock: row.stock,
            variations_amount: row.variations_amount,
            score: row.score,
            sold_units_last_7_days: row.sold_units_last_7_days,
            sold_units_last_30_days: row.sold_units_last_30_days,
            total_sold_units: row.total_sold_units,
            billing_last_7_days: row.billing_last_7_days,
            billing_last_30_days: row.billing_last_30_days,
            total_billing: row.total_billing,
            visible: row.visible,
            categories,
            provider: row.provider,
            gallery: row.gallery,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Reads products directly from the legacy relational store (spec §4.3
/// "Store backend").
pub struct StoreSourceReader {
    pool: LegacyPool,
}

impl StoreSourceReader {
    pub fn new(pool: LegacyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceReader for StoreSourceReader {
    async fn count(&self) -> MigrationResult<u64> {
        use legacy_products::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        let total: i64 = legacy_products
            .filter(platform_name.ne(EXCLUDED_PLATFORM))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(total as u64)
    }

    async fn read(&self, skip: u64, take: u64) -> MigrationResult<Vec<SourceProduct>> {
        use legacy_products::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        let rows: Vec<LegacyProductRow> = legacy_products
            .filter(platform_name.ne(EXCLUDED_PLATFORM))
            .order((created_at.asc(), id.asc()))
            .offset(skip as i64)
            .limit(take as i64)
            .load(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(rows.into_iter().map(SourceProduct::from).collect())
    }
}
