use std::sync::Arc;

use chrono::Utc;
use migration_types::{MigrationResult, SourceProduct};
use migration_store::{status_to_str, NewProduct, ProductStore};

use crate::provider::ProviderReconciler;
use crate::reference::ReferenceResolver;

const DEFAULT_PRODUCT_NAME: &str = "Sin nombre";

pub struct ProductUpsertOutcome {
    pub product_id: i64,
    pub created: bool,
}

/// The Product Upserter (spec §4.6): resolves `platformCountryId` and
/// `baseCategoryId`, then inserts or updates the target product keyed
/// by `id == sourceProduct.sourceId` (invariant I1).
pub struct ProductUpserter<
    P: ProductStore + ?Sized,
    Prov: migration_store::ProviderStore + ?Sized,
    Ref: migration_store::ReferenceStore + ?Sized,
> {
    store: Arc<P>,
    reference: Arc<ReferenceResolver<Ref>>,
    _provider: std::marker::PhantomData<Prov>,
}

impl<
        P: ProductStore + ?Sized,
        Prov: migration_store::ProviderStore + ?Sized,
        Ref: migration_store::ReferenceStore + ?Sized,
    > ProductUpserter<P, Prov, Ref>
{
    pub fn new(store: Arc<P>, reference: Arc<ReferenceResolver<Ref>>) -> Self {
        Self {
            store,
            reference,
            _provider: std::marker::PhantomData,
        }
    }

    /// `provider_id` has already been resolved by [`ProviderReconciler`]
    /// (spec §5: provider before product, fixed order within a record).
    pub async fn upsert(&self, product: &SourceProduct, provider_id: i64) -> MigrationResult<ProductUpsertOutcome> {
        let platform_country_id = self
            .reference
            .resolve_platform_country(&product.platform_name, &product.country_code)
            .await?;
        let base_category_id = self
            .reference
            .resolve_valid_base_category_id(
                None,
                product.primary_category().map(|c| c.name.as_str()),
                Some(&product.platform_name),
            )
            .await?;

        let name = if product.name.trim().is_empty() {
            DEFAULT_PRODUCT_NAME.to_string()
        } else {
            product.name.clone()
        };
        let status = status_to_str(migration_types::ProductStatus::from_visible(product.visible)).to_string();

        match self.store.get(product.source_id).await? {
            None => {
                let row = NewProduct {
                    id: product.source_id,
                    external_id: product.external_id.clone(),
                    name,
                    sale_price: product.sale_price,
                    suggested_price: product.suggested_price,
                    stock: product.stock,
                    variations_amount: product.variations_amount,
                    score: product.score,
                    sold_units_last_7_days: product.sold_units_last_7_days,
                    sold_units_last_30_days: product.sold_units_last_30_days,
                    total_sold_units: product.total_sold_units,
                    billing_last_7_days: product.billing_last_7_days,
                    billing_last_30_days: product.billing_last_30_days,
                    total_billing: product.total_billing,
                    status,
                    platform_country_id,
                    provider_id,
                    base_category_id,
                    created_at: product.created_at,
                    updated_at: Utc::now(),
                };
                let created = self.store.insert(row).await?;
                Ok(ProductUpsertOutcome { product_id: created.id, created: true })
            }
            Some(existing) => {
                // Q4 resolution: skip the write entirely when nothing
                // observable would change, so re-runs against an
                // unchanged source don't even bump `updatedAt` (a
                // documented strengthening of P1, see DESIGN.md).
                let unchanged = existing.name == name
                    && existing.sale_price == product.sale_price
                    && existing.suggested_price == product.suggested_price
                    && existing.stock == product.stock
                    && existing.variations_amount == product.variations_amount
                    && existing.score == product.score
                    && existing.sold_units_last_7_days == product.sold_units_last_7_days
                    && existing.sold_units_last_30_days == product.sold_units_last_30_days
                    && existing.total_sold_units == product.total_sold_units
                    && existing.billing_last_7_days == product.billing_last_7_days
                    && existing.billing_last_30_days == product.billing_last_30_days
                    && existing.total_billing == product.total_billing
                    && existing.status == migration_types::ProductStatus::from_visible(product.visible)
                    && existing.provider_id == provider_id
                    && existing.base_category_id == base_category_id;
                if unchanged {
                    return Ok(ProductUpsertOutcome { product_id: existing.id, created: false });
                }

                let row = NewProduct {
                    id: existing.id,
                    external_id: existing.external_id.clone(),
                    name,
                    sale_price: product.sale_price,
                    suggested_price: product.suggested_price,
                    stock: product.stock,
                    variations_amount: product.variations_amount,
                    score: product.score,
                    sold_units_last_7_days: product.sold_units_last_7_days,
                    sold_units_last_30_days: product.sold_units_last_30_days,
                    total_sold_units: product.total_sold_units,
                    billing_last_7_days: product.billing_last_7_days,
                    billing_last_30_days: product.billing_last_30_days,
                    total_billing: product.total_billing,
                    status,
                    platform_country_id: existing.platform_country_id,
                    provider_id,
                    base_category_id,
                    created_at: existing.created_at,
                    updated_at: Utc::now(),
                };
                let updated = self.store.update(row).await?;
                Ok(ProductUpsertOutcome { product_id: updated.id, created: false })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use migration_store::{NewProvider, ProviderStore as ProviderStoreTrait, ReferenceStore as ReferenceStoreTrait};
    use migration_types::{BaseCategory, Country, MigrationResult as Res, Platform, PlatformCountry, Product, Provider};
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeReference;
    #[async_trait]
    impl ReferenceStoreTrait for FakeReference {
        async fn all_countries(&self) -> Res<Vec<Country>> {
            Ok(vec![Country { id: 1, code: "CO".into() }])
        }
        async fn all_platforms(&self) -> Res<Vec<Platform>> {
            Ok(vec![Platform { id: 7, name: "dropi".into() }])
        }
        async fn all_platform_countries(&self) -> Res<Vec<PlatformCountry>> {
            Ok(vec![PlatformCountry { id: 10, platform_id: 7, country_id: 1 }])
        }
        async fn all_base_categories(&self) -> Res<Vec<BaseCategory>> {
            Ok(vec![BaseCategory { id: 1, name: "other".into() }])
        }
        async fn platform_categories_for(&self, _platform_id: i64) -> Res<Vec<migration_types::PlatformCategory>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeProductStore {
        products: AsyncMutex<Vec<Product>>,
    }

    #[async_trait]
    impl ProductStore for FakeProductStore {
        async fn get(&self, id: i64) -> Res<Option<Product>> {
            Ok(self.products.lock().await.iter().find(|p| p.id == id).cloned())
        }
        async fn insert(&self, new_product: NewProduct) -> Res<Product> {
            let product = Product {
                id: new_product.id,
                external_id: new_product.external_id,
                name: new_product.name,
                sale_price: new_product.sale_price,
                suggested_price: new_product.suggested_price,
                stock: new_product.stock,
                variations_amount: new_product.variations_amount,
                score: new_product.score,
                sold_units_last_7_days: new_product.sold_units_last_7_days,
                sold_units_last_30_days: new_product.sold_units_last_30_days,
                total_sold_units: new_product.total_sold_units,
                billing_last_7_days: new_product.billing_last_7_days,
                billing_last_30_days: new_product.billing_last_30_days,
                total_billing: new_product.total_billing,
                status: migration_store::status_from_str(&new_product.status),
                platform_country_id: new_product.platform_country_id,
                provider_id: new_product.provider_id,
                base_category_id: new_product.base_category_id,
                created_at: new_product.created_at,
                updated_at: new_product.updated_at,
            };
            self.products.lock().await.push(product.clone());
            Ok(product)
        }
        async fn update(&self, new_product: NewProduct) -> Res<Product> {
            let mut products = self.products.lock().await;
            let existing = products.iter_mut().find(|p| p.id == new_product.id).expect("exists");
            existing.name = new_product.name;
            existing.sale_price = new_product.sale_price;
            existing.suggested_price = new_product.suggested_price;
            existing.stock = new_product.stock;
            existing.variations_amount = new_product.variations_amount;
            existing.score = new_product.score;
            existing.sold_units_last_7_days = new_product.sold_units_last_7_days;
            existing.sold_units_last_30_days = new_product.sold_units_last_30_days;
            existing.total_sold_units = new_product.total_sold_units;
            existing.billing_last_7_days = new_product.billing_last_7_days;
            existing.billing_last_30_days = new_product.billing_last_30_days;
            existing.total_billing = new_product.total_billing;
            existing.status = migration_store::status_from_str(&new_product.status);
            existing.provider_id = new_product.provider_id;
            existing.base_category_id = new_product.base_category_id;
            existing.updated_at = new_product.updated_at;
            Ok(existing.clone())
        }
    }

    #[derive(Default)]
    struct FakeProviderStore;
    #[async_trait]
    impl ProviderStoreTrait for FakeProviderStore {
        async fn find_by_name_and_external_id(&self, _name: &str, _external_id: &str) -> Res<Option<Provider>> {
            Ok(None)
        }
        async fn find_by_external_id_and_platform_country(&self, _external_id: &str, _platform_country_id: i64) -> Res<Option<Provider>> {
            Ok(None)
        }
        async fn insert(&self, _new_provider: NewProvider) -> Res<Provider> {
            unreachable!()
        }
        async fn update_verified_only(&self, _id: i64, _verified: bool) -> Res<()> {
            Ok(())
        }
        async fn update_external_id_and_verified(&self, _id: i64, _external_id: &str, _verified: bool) -> Res<()> {
            Ok(())
        }
        async fn update_name_and_verified(&self, _id: i64, _name: &str, _verified: bool) -> Res<()> {
            Ok(())
        }
    }

    fn upserter() -> ProductUpserter<FakeProductStore, FakeProviderStore, FakeReference> {
        let store = Arc::new(FakeProductStore::default());
        let reference = Arc::new(ReferenceResolver::new(Arc::new(FakeReference)));
        ProductUpserter::new(store, reference)
    }

    #[tokio::test]
    async fn inserts_new_product_with_defaulted_name() {
        let upserter = upserter();
        let mut product = migration_types::test_support::sample_product();
        product.name = String::new();
        let outcome = upserter.upsert(&product, 99).await.unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.product_id, product.source_id);
    }

    #[tokio::test]
    async fn second_identical_run_is_a_no_op() {
        let upserter = upserter();
        let product = migration_types::test_support::sample_product();
        let first = upserter.upsert(&product, 99).await.unwrap();
        let second = upserter.upsert(&product, 99).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.product_id, second.product_id);
    }
}
