use std::sync::Arc;

use chrono::Utc;
use migration_types::{MigrationResult, SourceProduct};
use migration_store::{NewProvider, ProviderStore};

use crate::reference::ReferenceResolver;

/// The default provider name when the source blob is present but omits
/// one (spec §4.5 step 2).
const DEFAULT_PROVIDER_NAME: &str = "null";

struct ParsedProvider {
    name: String,
    external_id: String,
    verified: bool,
}

/// The Provider Reconciler (spec §4.5): a small state machine that
/// always returns a valid provider id, handling natural-key collisions
/// and missing/invalid provider data via a deterministic fallback
/// (spec §9's "model it as a state machine" redesign note).
pub struct ProviderReconciler<S: ProviderStore + ?Sized, R: migration_store::ReferenceStore + ?Sized> {
    store: Arc<S>,
    reference: Arc<ReferenceResolver<R>>,
}

impl<S: ProviderStore + ?Sized, R: migration_store::ReferenceStore + ?Sized> ProviderReconciler<S, R> {
    pub fn new(store: Arc<S>, reference: Arc<ReferenceResolver<R>>) -> Self {
        Self { store, reference }
    }

    /// Returns `(providerId, created)`.
    pub async fn resolve(&self, product: &SourceProduct) -> MigrationResult<(i64, bool)> {
        let parsed = match self.parse_provider(product) {
            Some(parsed) => parsed,
            None => return self.create_fallback_provider(product).await,
        };

        let platform_country_id = match self
            .reference
            .resolve_platform_country(&product.platform_name, &product.country_code)
            .await
        {
            Ok(id) => id,
            Err(_) => return self.create_fallback_provider(product).await,
        };

        // Step 4: lookup by (name ILIKE, externalId).
        if let Some(existing) = self
            .store
            .find_by_name_and_external_id(&parsed.name, &parsed.external_id)
            .await?
        {
            let collides = self
                .store
                .find_by_external_id_and_platform_country(&parsed.external_id, platform_country_id)
                .await?
                .map(|other| other.id != existing.id)
                .unwrap_or(false);
            if collides {
                self.store.update_verified_only(existing.id, parsed.verified).await?;
            } else {
                self.store
                    .update_external_id_and_verified(existing.id, &parsed.external_id, parsed.verified)
                    .await?;
            }
            return Ok((existing.id, false));
        }

        // Step 5: lookup by (externalId, platformCountryId).
        if let Some(existing) = self
            .store
            .find_by_external_id_and_platform_country(&parsed.external_id, platform_country_id)
            .await?
        {
            self.store
                .update_name_and_verified(existing.id, &parsed.name, parsed.verified)
                .await?;
            return Ok((existing.id, false));
        }

        // Step 6: create new.
        let now = Utc::now();
        let created = self
            .store
            .insert(NewProvider {
                id: next_provider_id(),
                name: parsed.name,
                external_id: parsed.external_id,
                verified: parsed.verified,
                platform_country_id,
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok((created.id, true))
    }

    /// spec §4.5 `createFallbackProvider`: resolves `platformCountryId`
    /// fail-fast, then reuses an existing `(externalId, platformCountryId)`
    /// match if present, else creates a new synthetic provider named
    /// `"null"`. Returns `(providerId, created)`.
    async fn create_fallback_provider(&self, product: &SourceProduct) -> MigrationResult<(i64, bool)> {
        let platform_country_id = self
            .reference
            .resolve_platform_country(&product.platform_name, &product.country_code)
            .await?;

        if let Some(existing) = self
            .store
            .find_by_external_id_and_platform_country(&product.external_id, platform_country_id)
            .await?
        {
            return Ok((existing.id, false));
        }

        let now = Utc::now();
        let created = self
            .store
            .insert(NewProvider {
                id: next_provider_id(),
                name: DEFAULT_PROVIDER_NAME.to_string(),
                external_id: product.external_id.clone(),
                verified: false,
                platform_country_id,
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok((created.id, true))
    }

    fn parse_provider(&self, product: &SourceProduct) -> Option<ParsedProvider> {
        let blob = match product.parse_provider() {
            Ok(Some(blob)) => blob,
            _ => return None,
        };
        let external_id = blob.external_id?;
        if external_id.is_empty() {
            return None;
        }
        Some(ParsedProvider {
            name: blob.name.unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string()),
            external_id,
            verified: blob.verified.unwrap_or(false),
        })
    }
}

/// A process-unique, monotonically increasing provider id seed. The
/// target store's primary key is a plain bigint, not a UUID, so new
/// providers need a concrete i64; this uses a random high-order prefix
/// per process to keep concurrent workers' ids from colliding, which is
/// acceptable because `insert` still round-trips the row after writing
/// it (spec §4.5 step 6 "read back to verify insertion").
fn next_provider_id() -> i64 {
    use std::sync::atomic::{AtomicI64, Ordering};
    static COUNTER: AtomicI64 = AtomicI64::new(0);
    let worker_prefix = (uuid::Uuid::new_v4().as_u128() as i64) & 0x7FFF_FFFF_0000_0000u64 as i64;
    worker_prefix | COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use migration_store::ReferenceStore as ReferenceStoreTrait;
    use migration_types::{BaseCategory, Country, MigrationResult as Res, Platform, PlatformCountry, Provider, SourceProviderBlob};
    use std::sync::Mutex;
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
            Ok(vec![])
        }
        async fn platform_categories_for(&self, _platform_id: i64) -> Res<Vec<migration_types::PlatformCategory>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeProviderStore {
        providers: AsyncMutex<Vec<Provider>>,
        next_id: Mutex<i64>,
    }

    #[async_trait]
    impl ProviderStore for FakeProviderStore {
        async fn find_by_name_and_external_id(&self, name: &str, external_id: &str) -> Res<Option<Provider>> {
            Ok(self
                .providers
                .lock()
                .await
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name) && p.external_id == external_id)
                .cloned())
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
        async fn insert(&self, new_provider: migration_store::NewProvider) -> Res<Provider> {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let provider = Provider {
                id: *next_id,
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
        async fn update_verified_only(&self, id: i64, verified: bool) -> Res<()> {
            let mut providers = self.providers.lock().await;
            if let Some(p) = providers.iter_mut().find(|p| p.id == id) {
                p.verified = verified;
            }
            Ok(())
        }
        async fn update_external_id_and_verified(&self, id: i64, external_id: &str, verified: bool) -> Res<()> {
            let mut providers = self.providers.lock().await;
            if let Some(p) = providers.iter_mut().find(|p| p.id == id) {
                p.external_id = external_id.to_string();
                p.verified = verified;
            }
            Ok(())
        }
        async fn update_name_and_verified(&self, id: i64, name: &str, verified: bool) -> Res<()> {
            let mut providers = self.providers.lock().await;
            if let Some(p) = providers.iter_mut().find(|p| p.id == id) {
                p.name = name.to_string();
                p.verified = verified;
            }
            Ok(())
        }
    }

    fn sample(provider: Option<SourceProviderBlob>) -> SourceProduct {
        let mut p = migration_types::test_support::sample_product();
        p.provider = provider.map(|b| serde_json::to_value(b).unwrap());
        p
    }

    #[tokio::test]
    async fn missing_provider_creates_fallback() {
        let store = Arc::new(FakeProviderStore::default());
        let reference = Arc::new(ReferenceResolver::new(Arc::new(FakeReference)));
        let reconciler = ProviderReconciler::new(store.clone(), reference);

        let product = sample(None);
        let (id, created) = reconciler.resolve(&product).await.unwrap();
        assert!(created);
        let providers = store.providers.lock().await;
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id, id);
        assert_eq!(providers[0].name, "null");
        assert_eq!(providers[0].external_id, product.external_id);
    }

    #[tokio::test]
    async fn two_products_sharing_external_id_reuse_provider() {
        let store = Arc::new(FakeProviderStore::default());
        let reference = Arc::new(ReferenceResolver::new(Arc::new(FakeReference)));
        let reconciler = ProviderReconciler::new(store.clone(), reference);

        let mut p1 = sample(Some(SourceProviderBlob {
            name: Some("Acme".into()),
            external_id: Some("AC1".into()),
            verified: Some(true),
        }));
        p1.source_id = 1;
        let mut p2 = sample(Some(SourceProviderBlob {
            name: Some("Acme Corp".into()),
            external_id: Some("AC1".into()),
            verified: Some(true),
        }));
        p2.source_id = 2;

        let (id1, created1) = reconciler.resolve(&p1).await.unwrap();
        let (id2, created2) = reconciler.resolve(&p2).await.unwrap();
        assert_eq!(id1, id2);
        assert!(created1);
        assert!(!created2);
        assert_eq!(store.providers.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn reruns_do_not_duplicate_fallback_provider() {
        let store = Arc::new(FakeProviderStore::default());
        let reference = Arc::new(ReferenceResolver::new(Arc::new(FakeReference)));
        let reconciler = ProviderReconciler::new(store.clone(), reference);

        let product = sample(None);
        let (first, first_created) = reconciler.resolve(&product).await.unwrap();
        let (second, second_created) = reconciler.resolve(&product).await.unwrap();
        assert_eq!(first, second);
        assert!(first_created);
        assert!(!second_created);
        assert_eq!(store.providers.lock().await.len(), 1);
    }
}
