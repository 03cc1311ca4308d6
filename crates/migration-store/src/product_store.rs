use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use migration_types::{MigrationError, MigrationResult, Product};

use crate::models::{NewProduct, ProductRow};
use crate::retry::retry_transient;
use crate::schema::products;
use crate::PgTargetStore;

/// Persistence primitives for the Product Upserter (spec §4.6). `id`
/// here is always `SourceProduct.sourceId` (invariant I1) — there is no
/// independent surrogate key to resolve first.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get(&self, id: i64) -> MigrationResult<Option<Product>>;
    async fn insert(&self, new_product: NewProduct) -> MigrationResult<Product>;
    async fn update(&self, new_product: NewProduct) -> MigrationResult<Product>;
}

#[async_trait]
impl ProductStore for PgTargetStore {
    async fn get(&self, wanted_id: i64) -> MigrationResult<Option<Product>> {
        retry_transient(|| async {
            use products::dsl::*;
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let row: Option<ProductRow> = products
                .filter(id.eq(wanted_id))
                .first(&mut conn)
                .await
                .optional()
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(row.map(Product::from))
        })
        .await
    }

    async fn insert(&self, new_product: NewProduct) -> MigrationResult<Product> {
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        let row: ProductRow = diesel::insert_into(products::table)
            .values(&new_product)
            .get_result(&mut conn)
            .await
            .map_err(|e| MigrationError::TargetWriteConflict(e.to_string()))?;
        Ok(Product::from(row))
    }

    async fn update(&self, new_product: NewProduct) -> MigrationResult<Product> {
        use products::dsl::*;
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        // createdAt, externalId, platformCountryId, id are immutable on
        // update (spec §4.6); only the mutable fields are reassigned here.
        let row: ProductRow = diesel::update(products.filter(id.eq(new_product.id)))
            .set((
                name.eq(new_product.name),
                sale_price.eq(new_product.sale_price),
                suggested_price.eq(new_product.suggested_price),
                stock.eq(new_product.stock),
                variations_amount.eq(new_product.variations_amount),
                score.eq(new_product.score),
                sold_units_last_7_days.eq(new_product.sold_units_last_7_days),
                sold_units_last_30_days.eq(new_product.sold_units_last_30_days),
                total_sold_units.eq(new_product.total_sold_units),
                billing_last_7_days.eq(new_product.billing_last_7_days),
                billing_last_30_days.eq(new_product.billing_last_30_days),
                total_billing.eq(new_product.total_billing),
                status.eq(new_product.status),
                provider_id.eq(new_product.provider_id),
                base_category_id.eq(new_product.base_category_id),
                updated_at.eq(new_product.updated_at),
            ))
            .get_result(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(Product::from(row))
    }
}
