use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use migration_types::{MigrationError, MigrationResult, Multimedia};

use crate::models::{MultimediaRow, NewMultimedia};
use crate::retry::retry_transient;
use crate::schema::multimedia;
use crate::PgTargetStore;

/// Sub-batch size for multimedia inserts (spec §4.8 step 5).
const MULTIMEDIA_BATCH_SIZE: usize = 20;

#[async_trait]
pub trait MultimediaStore: Send + Sync {
    /// Existing rows for a product, in a stable order (ascending `id`,
    /// i.e. insertion order) so the Multimedia Reconciler can pair them
    /// positionally against the freshly parsed gallery (spec §4.8 step 5).
    async fn existing_for_product(&self, product_id: i64) -> MigrationResult<Vec<Multimedia>>;

    async fn update_url(&self, id: i64, original_url: &str) -> MigrationResult<()>;

    /// Inserts `rows` in bounded sub-batches, falling back to row-by-row
    /// on batch failure, mirroring the history batch-insert policy.
    async fn insert_batch(&self, rows: Vec<NewMultimedia>) -> MigrationResult<u64>;
}

#[async_trait]
impl MultimediaStore for PgTargetStore {
    async fn existing_for_product(&self, wanted_product_id: i64) -> MigrationResult<Vec<Multimedia>> {
        retry_transient(|| async {
            use multimedia::dsl::*;
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let rows: Vec<MultimediaRow> = multimedia
                .filter(product_id.eq(wanted_product_id))
                .order(id.asc())
                .load(&mut conn)
                .await
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(rows.into_iter().map(Multimedia::from).collect())
        })
        .await
    }

    async fn update_url(&self, target_id: i64, new_original_url: &str) -> MigrationResult<()> {
        // `url` is populated by the external extraction service (spec
        // §4.8's state machine, `absent -> present(extracted=false) ->
        // present(extracted=true)`); only `originalUrl` is this engine's
        // to write on the existing-row path.
        use multimedia::dsl::*;
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        diesel::update(multimedia.filter(id.eq(target_id)))
            .set(original_url.eq(new_original_url))
            .execute(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(())
    }

    async fn insert_batch(&self, rows: Vec<NewMultimedia>) -> MigrationResult<u64> {
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        let mut inserted = 0u64;
        for chunk in rows.chunks(MULTIMEDIA_BATCH_SIZE) {
            let result = diesel::insert_into(multimedia::table)
                .values(chunk)
                .execute(&mut conn)
                .await;
            match result {
                Ok(n) => inserted += n as u64,
                Err(e) => {
                    tracing::warn!(error = %e, batch_len = chunk.len(), "multimedia batch insert failed, falling back to row-by-row");
                    for row in chunk {
                        match diesel::insert_into(multimedia::table).values(row).execute(&mut conn).await {
                            Ok(n) => inserted += n as u64,
                            Err(row_err) => {
                                tracing::warn!(error = %row_err, product_id = row.product_id, "dropping unwritable multimedia row");
                            }
                        }
                    }
                }
            }
        }
        Ok(inserted)
    }
}
