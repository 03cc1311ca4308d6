use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgTextExpressionMethods;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use migration_types::{MigrationError, MigrationResult, Provider};

use crate::models::{NewProvider, ProviderRow};
use crate::retry::retry_transient;
use crate::schema::providers;
use crate::PgTargetStore;

/// Persistence primitives backing the Provider Reconciler's state
/// machine (spec §4.5). The reconciliation logic itself — which lookup
/// to try first, when a collision means "safe fields only" — lives in
/// `migration-pipeline`; this trait only exposes the individual reads
/// and writes it's built from.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn find_by_name_and_external_id(&self, name: &str, external_id: &str) -> MigrationResult<Option<Provider>>;
    async fn find_by_external_id_and_platform_country(
        &self,
        external_id: &str,
        platform_country_id: i64,
    ) -> MigrationResult<Option<Provider>>;
    async fn insert(&self, new_provider: NewProvider) -> MigrationResult<Provider>;
    async fn update_verified_only(&self, id: i64, verified: bool) -> MigrationResult<()>;
    async fn update_external_id_and_verified(&self, id: i64, external_id: &str, verified: bool) -> MigrationResult<()>;
    async fn update_name_and_verified(&self, id: i64, name: &str, verified: bool) -> MigrationResult<()>;
}

#[async_trait]
impl ProviderStore for PgTargetStore {
    async fn find_by_name_and_external_id(&self, wanted_name: &str, wanted_external_id: &str) -> MigrationResult<Option<Provider>> {
        retry_transient(|| async {
            use providers::dsl::*;
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let row: Option<ProviderRow> = providers
                .filter(external_id.eq(wanted_external_id))
                .filter(name.ilike(wanted_name))
                .first(&mut conn)
                .await
                .optional()
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(row.map(Provider::from))
        })
        .await
    }

    async fn find_by_external_id_and_platform_country(
        &self,
        wanted_external_id: &str,
        wanted_platform_country_id: i64,
    ) -> MigrationResult<Option<Provider>> {
        retry_transient(|| async {
            use providers::dsl::*;
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let row: Option<ProviderRow> = providers
                .filter(external_id.eq(wanted_external_id))
                .filter(platform_country_id.eq(wanted_platform_country_id))
                .first(&mut conn)
                .await
                .optional()
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(row.map(Provider::from))
        })
        .await
    }

    async fn insert(&self, new_provider: NewProvider) -> MigrationResult<Provider> {
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        let row: ProviderRow = diesel::insert_into(providers::table)
            .values(&new_provider)
            .get_result(&mut conn)
            .await
            .map_err(|e| MigrationError::TargetWriteConflict(e.to_string()))?;
        Ok(Provider::from(row))
    }

    async fn update_verified_only(&self, target_id: i64, new_verified: bool) -> MigrationResult<()> {
        use providers::dsl::*;
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        diesel::update(providers.filter(id.eq(target_id)))
            .set((verified.eq(new_verified), updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(())
    }

    async fn update_external_id_and_verified(
        &self,
        target_id: i64,
        new_external_id: &str,
        new_verified: bool,
    ) -> MigrationResult<()> {
        use providers::dsl::*;
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        diesel::update(providers.filter(id.eq(target_id)))
            .set((
                external_id.eq(new_external_id),
                verified.eq(new_verified),
                updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(())
    }

    async fn update_name_and_verified(&self, target_id: i64, new_name: &str, new_verified: bool) -> MigrationResult<()> {
        use providers::dsl::*;
        let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        diesel::update(providers.filter(id.eq(target_id)))
            .set((name.eq(new_name), verified.eq(new_verified), updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .await
            .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
        Ok(())
    }
}
