//! The Migration Driver (spec §4.2, component C8): the main loop each
//! worker process runs — lease a chunk, process its records through the
//! pipeline, report the outcome back to the coordination service, repeat
//! until every chunk is completed or shutdown is requested.

mod config;
mod driver;

pub use config::DriverConfig;
pub use driver::{ChunkObserver, MigrationDriver};
