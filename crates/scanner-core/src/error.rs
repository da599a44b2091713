use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// Propagated immediately; no partial result is emitted.
    #[error("scan canceled")]
    Canceled,

    /// Per-region failure; the region is skipped and the scan continues.
    #[error("market feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal contradiction (unpriceable required items, blueprint-only
    /// contract). The affected row is dropped, not surfaced.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

impl ScanError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Canceled | ScanError::InvalidInput(_))
    }
}
