//! The Per-Record Migration Pipeline (spec §4.4-§4.8, components C2-C6):
//! for each source product, resolve foreign-key context, reconcile the
//! provider, upsert the product, and fill in histories and multimedia,
//! in the fixed order spec §5 requires.

mod history;
mod multimedia;
mod pipeline;
mod product;
mod provider;
mod reference;

pub use history::HistoryGapFiller;
pub use multimedia::{classify_media_type, normalize_url, MultimediaReconciler};
pub use pipeline::{RecordOutcome, RecordPipeline, RecordProcessor};
pub use product::{ProductUpsertOutcome, ProductUpserter};
pub use provider::ProviderReconciler;
pub use reference::{normalize_country_code, normalize_platform_name, ReferenceResolver};
