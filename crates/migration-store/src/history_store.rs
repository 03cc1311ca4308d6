use std::collections::HashSet;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use migration_types::{MigrationError, MigrationResult};

use crate::models::NewHistory;
use crate::retry::retry_transient;
use crate::schema::histories;
use crate::PgTargetStore;

/// Sub-batch size for gap-fill inserts (spec §4.7 step 6).
const HISTORY_BATCH_SIZE: usize = 50;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn existing_dates(&self, product_id: i64) -> MigrationResult<HashSet<String>>;

    /// Inserts `rows` in bounded sub-batches, falling back to row-by-row
    /// inserts within a batch that fails so a single bad row doesn't
    /// sink its neighbors (spec §4.7 step 6). Returns the number of rows
    /// successfully inserted.
    async fn insert_batch(&self, rows: Vec<NewHistory>) -> MigrationResult<u64>;
}

#[async_trait]
impl HistoryStore for PgTargetStore {
    async fn existing_dates(&self, wanted_product_id: i64) -> MigrationResult<HashSet<String>> {
        retry_transient(|| async {
            use histories::dsl::*;
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let dates: Vec<String> = histories
                .filter(product_id.eq(wanted_product_id))
                .select(date)
                .load(&mut conn)
                .await
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(dates.into_iter().collect())
        })
        .await
    }

    async fn insert_batch(&self, rows: Vec<NewHistory>) -> MigrationResult<u64> {
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        let mut inserted = 0u64;
        for chunk in rows.chunks(HISTORY_BATCH_SIZE) {
            let result = diesel::insert_into(histories::table)
                .values(chunk)
                .execute(&mut conn)
                .await;
            match result {
                Ok(n) => inserted += n as u64,
                Err(e) => {
                    tracing::warn!(error = %e, batch_len = chunk.len(), "history batch insert failed, falling back to row-by-row");
                    for row in chunk {
                        match diesel::insert_into(histories::table).values(row).execute(&mut conn).await {
                            Ok(n) => inserted += n as u64,
                            Err(row_err) => {
                                tracing::warn!(error = %row_err, date = %row.date, product_id = row.product_id, "dropping unwritable history row");
                            }
                        }
                    }
                }
            }
        }
        Ok(inserted)
    }
}
