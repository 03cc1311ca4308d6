//! The target store: schema, row models, and the per-component
//! persistence traits the Reference Resolver (C2), Provider Reconciler
//! (C3), Product Upserter (C4), History Gap Filler (C5), and Multimedia
//! Reconciler (C6) are built on.

mod history_store;
mod models;
mod multimedia_store;
mod pool;
mod product_store;
mod provider_store;
mod reference_store;
mod retry;
mod schema;

pub use history_store::HistoryStore;
pub use models::{
    media_type_from_str, media_type_to_str, status_from_str, status_to_str, NewHistory,
    NewMultimedia, NewProduct, NewProvider,
};
pub use multimedia_store::MultimediaStore;
pub use pool::{build_target_pool, TargetPool, TargetPoolError};
pub use product_store::ProductStore;
pub use provider_store::ProviderStore;
pub use reference_store::ReferenceStore;
pub use retry::retry_transient;

/// A single diesel-async connection pool shared by every per-component
/// store trait impl in this crate. Traits are implemented one-per-file
/// (`reference_store.rs`, `provider_store.rs`, ...) so each concern's
/// queries live with its own trait definition.
pub struct PgTargetStore {
    pub(crate) pool: TargetPool,
}

impl PgTargetStore {
    pub fn new(pool: TargetPool) -> Self {
        Self { pool }
    }
}
