use thiserror::Error;

/// The error taxonomy for the migration engine (spec §7).
///
/// Variants map to the failure classes operators need to distinguish when
/// triaging a run: some are fatal to the whole worker, some are per-record
/// and simply increment a counter, and the rest fall somewhere in between
/// depending on which component raised them.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("coordination service unavailable: {0}")]
    CoordinationUnavailable(String),

    #[error("reference missing: {0}")]
    ReferenceMissing(String),

    #[error("source data malformed: {0}")]
    SourceDataMalformed(String),

    #[error("target write conflict: {0}")]
    TargetWriteConflict(String),

    #[error("transient store error: {0}")]
    TransientStore(String),
}

impl MigrationError {
    /// Errors that should cause the current chunk to be abandoned and
    /// reverted to `pending` rather than merely counted against the record
    /// that triggered them (spec §7's "escapes the record loop" class).
    pub fn is_chunk_fatal(&self) -> bool {
        matches!(
            self,
            MigrationError::CoordinationUnavailable(_) | MigrationError::TransientStore(_)
        )
    }
}

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;
