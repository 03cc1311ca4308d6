use std::sync::Arc;

use async_trait::async_trait;
use migration_source::LegacySourceHistoryStore;
use migration_store::{HistoryStore, MultimediaStore, ProductStore, ProviderStore, ReferenceStore};
use migration_types::{MigrationResult, SourceProduct};

use crate::history::HistoryGapFiller;
use crate::multimedia::MultimediaReconciler;
use crate::product::{ProductUpserter, ProductUpsertOutcome};
use crate::provider::ProviderReconciler;
use crate::reference::ReferenceResolver;

/// What happened to a single source record, for the Migration Driver's
/// per-chunk metric aggregation (spec §4.2).
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordOutcome {
    pub provider_created: bool,
    pub product_created: bool,
    pub product_updated: bool,
    pub histories_filled: u64,
    pub multimedia_written: u64,
}

/// The entrypoint the Migration Driver (C8) calls once per source
/// record. A trait (rather than exposing [`RecordPipeline`] directly) so
/// the driver's chunk-processing loop can be exercised in tests against
/// a fake that doesn't touch any store.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    async fn process(&self, product: &SourceProduct) -> MigrationResult<RecordOutcome>;
}

/// Bundles C2-C6 behind one entrypoint the Migration Driver (C8) calls
/// once per source record, enforcing the fixed intra-record ordering
/// from spec §5: provider -> product -> histories -> multimedia.
pub struct RecordPipeline {
    product_store: Arc<dyn ProductStore>,
    provider: ProviderReconciler<dyn ProviderStore, dyn ReferenceStore>,
    product: ProductUpserter<dyn ProductStore, dyn ProviderStore, dyn ReferenceStore>,
    history: HistoryGapFiller<dyn LegacySourceHistoryStore, dyn HistoryStore>,
    multimedia: MultimediaReconciler<dyn MultimediaStore>,
}

impl RecordPipeline {
    pub fn new(
        reference_store: Arc<dyn ReferenceStore>,
        provider_store: Arc<dyn ProviderStore>,
        product_store: Arc<dyn ProductStore>,
        legacy_history_store: Arc<dyn LegacySourceHistoryStore>,
        target_history_store: Arc<dyn HistoryStore>,
        multimedia_store: Arc<dyn MultimediaStore>,
    ) -> Self {
        let reference = Arc::new(ReferenceResolver::new(reference_store));
        Self {
            product_store: product_store.clone(),
            provider: ProviderReconciler::new(provider_store, reference.clone()),
            product: ProductUpserter::new(product_store, reference),
            history: HistoryGapFiller::new(legacy_history_store, target_history_store),
            multimedia: MultimediaReconciler::new(multimedia_store),
        }
    }
}

#[async_trait]
impl RecordProcessor for RecordPipeline {
    async fn process(&self, product: &SourceProduct) -> MigrationResult<RecordOutcome> {
        let (provider_id, provider_created) = self.provider.resolve(product).await?;
        let ProductUpsertOutcome { product_id, created: product_created } =
            self.product.upsert(product, provider_id).await?;

        let target_product = match self.product_store.get(product_id).await? {
            Some(p) => p,
            None => {
                return Err(migration_types::MigrationError::TargetWriteConflict(format!(
                    "product {product_id} missing immediately after upsert"
                )))
            }
        };

        let histories_filled = self.history.fill(product, &target_product).await?;
        let multimedia_written = self.multimedia.reconcile(product, product_id).await?;

        Ok(RecordOutcome {
            provider_created,
            product_created,
            product_updated: !product_created,
            histories_filled,
            multimedia_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration_store::{NewHistory, NewMultimedia, NewProduct, NewProvider};
    use migration_types::{
        BaseCategory, Country, History, MigrationResult as Res, Platform, PlatformCategory,
        PlatformCountry, Product, Provider, SourceCategoryRef, SourceHistory, SourceProviderBlob,
    };
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    struct FakeReference;
    #[async_trait]
    impl ReferenceStore for FakeReference {
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
            Ok(vec![
                BaseCategory { id: 1, name: "other".into() },
                BaseCategory { id: 2, name: "tecnologia".into() },
            ])
        }
        async fn platform_categories_for(&self, _platform_id: i64) -> Res<Vec<PlatformCategory>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeProviderStore {
        providers: Mutex<Vec<Provider>>,
    }
    #[async_trait]
    impl ProviderStore for FakeProviderStore {
        async fn find_by_name_and_external_id(&self, name: &str, external_id: &str) -> Res<Option<Provider>> {
            Ok(self.providers.lock().await.iter().find(|p| p.name.eq_ignore_ascii_case(name) && p.external_id == external_id).cloned())
        }
        async fn find_by_external_id_and_platform_country(&self, external_id: &str, platform_country_id: i64) -> Res<Option<Provider>> {
            Ok(self
                .providers
                .lock()
                .await
                .iter()
                .find(|p| p.external_id == external_id && p.platform_country_id == platform_country_id)
                .cloned())
        }
        async fn insert(&self, new_provider: NewProvider) -> Res<Provider> {
            let provider = Provider {
                id: new_provider.id,
                name: new_provider.name,
                external_id: new_provider.external_id,
                verified: new_provider.verified,
                platform_country_id: new_provider.platform_country_id,
                created_at: new_provider.created_at,
                updated_at: new_provider.updated_at,
            };
            self.providers.lock().await.push(provider.clone());
            Ok(provider)
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

    #[derive(Default)]
    struct FakeProductStore {
        products: Mutex<Vec<Product>>,
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
            existing.status = migration_store::status_from_str(&new_product.status);
            existing.provider_id = new_product.provider_id;
            existing.base_category_id = new_product.base_category_id;
            existing.updated_at = new_product.updated_at;
            Ok(existing.clone())
        }
    }

    struct FakeLegacyHistory {
        rows: Vec<SourceHistory>,
    }
    #[async_trait]
    impl LegacySourceHistoryStore for FakeLegacyHistory {
        async fn history_dates(&self, _external_product_id: &str, _platform_name: &str, _country_code: &str) -> Res<HashSet<String>> {
            Ok(self.rows.iter().map(|r| r.date.clone()).collect())
        }
        async fn history_rows_for_dates(
            &self,
            _external_product_id: &str,
            _platform_name: &str,
            _country_code: &str,
            dates: &[String],
        ) -> Res<Vec<SourceHistory>> {
            Ok(self.rows.iter().filter(|r| dates.contains(&r.date)).cloned().collect())
        }
    }

    #[derive(Default)]
    struct FakeTargetHistory {
        rows: Mutex<Vec<History>>,
    }
    #[async_trait]
    impl HistoryStore for FakeTargetHistory {
        async fn existing_dates(&self, product_id: i64) -> Res<HashSet<String>> {
            Ok(self.rows.lock().await.iter().filter(|r| r.product_id == product_id).map(|r| r.date.clone()).collect())
        }
        async fn insert_batch(&self, rows: Vec<NewHistory>) -> Res<u64> {
            let mut existing = self.rows.lock().await;
            let n = rows.len() as u64;
            for (i, row) in rows.into_iter().enumerate() {
                existing.push(History {
                    id: existing.len() as i64 + i as i64 + 1,
                    date: row.date,
                    product_id: row.product_id,
                    stock: row.stock,
                    sale_price: row.sale_price,
                    sold_units: row.sold_units,
                    sold_units_last_7_days: row.sold_units_last_7_days,
                    sold_units_last_30_days: row.sold_units_last_30_days,
                    total_sold_units: row.total_sold_units,
                    billing_last_7_days: row.billing_last_7_days,
                    billing_last_30_days: row.billing_last_30_days,
                    total_billing: row.total_billing,
                    suggested_price: row.suggested_price,
                });
            }
            Ok(n)
        }
    }

    #[derive(Default)]
    struct FakeMultimediaStore {
        rows: Mutex<Vec<migration_types::Multimedia>>,
    }
    #[async_trait]
    impl MultimediaStore for FakeMultimediaStore {
        async fn existing_for_product(&self, product_id: i64) -> Res<Vec<migration_types::Multimedia>> {
            Ok(self.rows.lock().await.iter().filter(|r| r.product_id == product_id).cloned().collect())
        }
        async fn update_url(&self, id: i64, original_url: &str) -> Res<()> {
            let mut rows = self.rows.lock().await;
            if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
                row.original_url = original_url.to_string();
            }
            Ok(())
        }
        async fn insert_batch(&self, new_rows: Vec<NewMultimedia>) -> Res<u64> {
            let mut rows = self.rows.lock().await;
            let n = new_rows.len() as u64;
            for row in new_rows {
                rows.push(migration_types::Multimedia {
                    id: rows.len() as i64 + 1,
                    product_id: row.product_id,
                    url: row.url,
                    original_url: row.original_url,
                    media_type: migration_store::media_type_from_str(&row.media_type),
                    extracted: row.extracted,
                });
            }
            Ok(n)
        }
    }

    fn happy_path_product() -> SourceProduct {
        let mut product = migration_types::test_support::sample_product();
        product.source_id = 1;
        product.external_id = "X1".into();
        product.platform_name = "dropi".into();
        product.country_code = "CO".into();
        product.categories = vec![SourceCategoryRef { name: "tecnologia".into(), external_id: None }];
        product.provider = Some(
            serde_json::to_value(SourceProviderBlob {
                name: Some("Acme".into()),
                external_id: Some("AC1".into()),
                verified: Some(true),
            })
            .unwrap(),
        );
        product.gallery = serde_json::json!([{"url": "products/a.jpg"}]);
        product
    }

    #[tokio::test]
    async fn happy_path_new_product_creates_everything() {
        let reference = Arc::new(FakeReference);
        let provider_store = Arc::new(FakeProviderStore::default());
        let product_store = Arc::new(FakeProductStore::default());
        let legacy_history = Arc::new(FakeLegacyHistory {
            rows: vec!["2024-01-01", "2024-01-02", "2024-01-03"]
                .into_iter()
                .map(|date| SourceHistory {
                    external_product_id: "X1".into(),
                    platform_name: "dropi".into(),
                    country_code: "CO".into(),
                    date: date.into(),
                    stock: 5,
                    sale_price: 9.99,
                    sold_units: 1,
                    sales_amount: 9.99,
                    stock_adjustment: false,
                    stock_adjustment_reason: None,
                })
                .collect(),
        });
        let target_history = Arc::new(FakeTargetHistory::default());
        let multimedia = Arc::new(FakeMultimediaStore::default());

        let pipeline = RecordPipeline::new(
            reference,
            provider_store.clone(),
            product_store.clone(),
            legacy_history,
            target_history.clone(),
            multimedia.clone(),
        );

        let outcome = pipeline.process(&happy_path_product()).await.unwrap();
        assert!(outcome.provider_created);
        assert!(outcome.product_created);
        assert_eq!(outcome.histories_filled, 3);
        assert_eq!(outcome.multimedia_written, 1);

        let providers = provider_store.providers.lock().await;
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].external_id, "AC1");

        let products = product_store.products.lock().await;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, 1);
        assert_eq!(products[0].base_category_id, 2);

        let histories = target_history.rows.lock().await;
        assert_eq!(histories.len(), 3);

        let media = multimedia.rows.lock().await;
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].url, "https://cdn.example.com/products/a.jpg");
    }

    #[tokio::test]
    async fn second_run_over_unchanged_source_is_idempotent() {
        let reference = Arc::new(FakeReference);
        let provider_store = Arc::new(FakeProviderStore::default());
        let product_store = Arc::new(FakeProductStore::default());
        let legacy_history = Arc::new(FakeLegacyHistory { rows: vec![] });
        let target_history = Arc::new(FakeTargetHistory::default());
        let multimedia = Arc::new(FakeMultimediaStore::default());

        let pipeline = RecordPipeline::new(
            reference,
            provider_store.clone(),
            product_store.clone(),
            legacy_history,
            target_history,
            multimedia,
        );

        let product = happy_path_product();
        let first = pipeline.process(&product).await.unwrap();
        let second = pipeline.process(&product).await.unwrap();

        assert!(first.product_created);
        assert!(!second.product_created);
        assert!(!second.provider_created);
        assert_eq!(provider_store.providers.lock().await.len(), 1);
        assert_eq!(product_store.products.lock().await.len(), 1);
    }
}
