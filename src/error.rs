//! Domain error taxonomy.
//!
//! Every expected business condition maps to a typed variant the calling
//! layer can act on; infrastructure faults are logged where they occur and
//! surfaced as `Database`. Empty query results are success, never errors.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Donor must wait {days_remaining} more day(s) before donating")]
    IneligibleDonor { days_remaining: i64 },

    #[error("A rejection reason is required")]
    MissingReason,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unreachable within {0} ms")]
    Timeout(u64),

    #[error("Storage error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for CoreError {
    fn from(e: DatabaseError) -> Self {
        // A lock held past the busy timeout is a deadline miss to the
        // caller, not a storage fault.
        if let DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) = &e {
            if code.code == rusqlite::ErrorCode::DatabaseBusy {
                return CoreError::Timeout(crate::config::BUSY_TIMEOUT_MS);
            }
        }
        CoreError::Database(e)
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::from(DatabaseError::Sqlite(e))
    }
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
