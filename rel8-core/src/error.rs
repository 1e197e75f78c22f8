//! Error types for the REL8 sync service.

use thiserror::Error;

/// Errors that can occur during a calendar sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Outreach task not found: {0}")]
    TaskNotFound(String),

    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
