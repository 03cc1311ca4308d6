use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use migration_types::{
    BaseCategory, Country, MigrationError, MigrationResult, Platform, PlatformCategory,
    PlatformCountry,
};

use crate::models::{BaseCategoryRow, CountryRow, PlatformCategoryRow, PlatformCountryRow, PlatformRow};
use crate::retry::retry_transient;
use crate::schema::{base_categories, countries, platform_categories, platform_countries, platforms};
use crate::PgTargetStore;

/// Read-only lookups the Reference Resolver (spec §4.4) needs: these
/// tables are never written by this system.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn all_countries(&self) -> MigrationResult<Vec<Country>>;
    /// The real `platforms(id, name)` table — `resolvePlatformCountry`
    /// (spec §4.4) joins this against `all_platform_countries` to map a
    /// normalized platform name to its actual `platform_id`, rather than
    /// assuming one.
    async fn all_platforms(&self) -> MigrationResult<Vec<Platform>>;
    async fn all_platform_countries(&self) -> MigrationResult<Vec<PlatformCountry>>;
    async fn all_base_categories(&self) -> MigrationResult<Vec<BaseCategory>>;
    async fn platform_categories_for(&self, platform_id: i64) -> MigrationResult<Vec<PlatformCategory>>;
}

#[async_trait]
impl ReferenceStore for PgTargetStore {
    async fn all_countries(&self) -> MigrationResult<Vec<Country>> {
        retry_transient(|| async {
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let rows: Vec<CountryRow> = countries::table
                .load(&mut conn)
                .await
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(rows.into_iter().map(Country::from).collect())
        })
        .await
    }

    async fn all_platforms(&self) -> MigrationResult<Vec<Platform>> {
        retry_transient(|| async {
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let rows: Vec<PlatformRow> = platforms::table
                .load(&mut conn)
                .await
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(rows.into_iter().map(Platform::from).collect())
        })
        .await
    }

    async fn all_platform_countries(&self) -> MigrationResult<Vec<PlatformCountry>> {
        retry_transient(|| async {
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let rows: Vec<PlatformCountryRow> = platform_countries::table
                .load(&mut conn)
                .await
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(rows.into_iter().map(PlatformCountry::from).collect())
        })
        .await
    }

    async fn all_base_categories(&self) -> MigrationResult<Vec<BaseCategory>> {
        retry_transient(|| async {
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let rows: Vec<BaseCategoryRow> = base_categories::table
                .load(&mut conn)
                .await
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(rows.into_iter().map(BaseCategory::from).collect())
        })
        .await
    }

    async fn platform_categories_for(&self, wanted_platform_id: i64) -> MigrationResult<Vec<PlatformCategory>> {
        retry_transient(|| async {
            use platform_categories::dsl::*;
            let mut conn = self.pool.get().await.map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            let rows: Vec<PlatformCategoryRow> = platform_categories
                .filter(platform_id.eq(wanted_platform_id))
                .load(&mut conn)
                .await
                .map_err(|e| MigrationError::TransientStore(e.to_string()))?;
            Ok(rows.into_iter().map(PlatformCategory::from).collect())
        })
        .await
    }
}
