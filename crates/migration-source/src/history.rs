use std::collections::HashSet;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use migration_types::{MigrationError, MigrationResult, SourceHistory};

use crate::schema::legacy_product_history;
use crate::store::LegacyPool;

/// The legacy-store half of the History Gap Filler (spec §4.7, steps
/// 2 and 4): reading the set of source dates, and reading full rows for
/// a bounded set of missing dates.
#[async_trait]
pub trait LegacySourceHistoryStore: Send + Sync {
    async fn history_dates(
        &self,
        external_product_id: &str,
        platform_name: &str,
        country_code: &str,
    ) -> MigrationResult<HashSet<String>>;

    async fn history_rows_for_dates(
        &self,
        external_product_id: &str,
        platform_name: &str,
        country_code: &str,
        dates: &[String],
    ) -> MigrationResult<Vec<SourceHistory>>;
}

#[derive(Queryable)]
#[allow(dead_code)]
struct LegacyHistoryRow {
    id: i64,
    external_product_id: String,
    platform_name: String,
    country_code: String,
    date: String,
    stock: i32,
    sale_price: f64,
    sold_units: i32,
    sales_amount: f64,
    stock_adjustment: bool,
    stock_adjustment_reason: Option<String>,
}

impl From<LegacyHistoryRow> for SourceHistory {
    fn from(row: LegacyHistoryRow) -> Self {
        SourceHistory {
            external_product_id: row.external_product_id,
            platform_name: row.platform_name,
            country_code: row.country_code,
            date: row.date,
            stock: row.stock,
            sale_price: row.sale_price,
            sold_units: row.sold_units,
            sales_amount: row.sales_amount,
            stock_adjustment: row.stock_adjustment,
            stock_adjustment_reason: row.stock_adjustment_reason,
        }
    }
}

pub struct PgSourceHistoryStore {
    pool: LegacyPool,
}

impl PgSourceHistoryStore {
    pub fn new(pool: LegacyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LegacySourceHistoryStore for PgSourceHistoryStore {
    async fn history_dates(
        &self,
        ext_product_id: &str,
        platform: &str,
        country: &str,
    ) -> MigrationResult<HashSet<String>> {
        use legacy_product_history::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        let dates: Vec<String> = legacy_product_history
            .filter(external_product_id.eq(ext_product_id))
            .filter(platform_name.eq(platform))
            .filter(country_code.eq(country))
            .select(date)
            .load(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(dates.into_iter().collect())
    }

    async fn history_rows_for_dates(
        &self,
        ext_product_id: &str,
        platform: &str,
        country: &str,
        dates_wanted: &[String],
    ) -> MigrationResult<Vec<SourceHistory>> {
        if dates_wanted.is_empty() {
            return Ok(Vec::new());
        }
        use legacy_product_history::dsl::*;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        let rows: Vec<LegacyHistoryRow> = legacy_product_history
            .filter(external_product_id.eq(ext_product_id))
            .filter(platform_name.eq(platform))
            .filter(country_code.eq(country))
            .filter(date.eq_any(dates_wanted))
            .load(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(rows.into_iter().map(SourceHistory::from).collect())
    }
}
