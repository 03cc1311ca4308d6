use diesel_async::pooled_connection::bb8;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use migration_types::{MigrationError, MigrationResult};

pub type TargetPool = bb8::Pool<AsyncPgConnection>;
pub type TargetPoolError = diesel_async::pooled_connection::PoolError;

pub async fn build_target_pool(database_url: &str) -> MigrationResult<TargetPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    bb8::Pool::builder()
        .max_size(5)
        .build(manager)
        .await
        .map_err(|e| MigrationError::Configuration(format!("failed to build target pool: {e}")))
}
