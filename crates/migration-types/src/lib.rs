//! Shared domain types for the catalog migration engine: the source and
//! target record shapes, the chunk-scheduler's persisted state, and the
//! error taxonomy every other crate in the workspace builds on.

mod chunk;
mod error;
mod source;
mod target;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use chunk::{ChunkResult, ChunkState, ChunkStatus, Progress};
pub use error::{MigrationError, MigrationResult};
pub use source::{
    SourceCategoryRef, SourceGalleryEntry, SourceHistory, SourceProduct, SourceProviderBlob,
};
pub use target::{
    BaseCategory, Country, History, MediaType, Multimedia, Platform, PlatformCategory,
    PlatformCountry, Product, ProductStatus, Provider,
};
