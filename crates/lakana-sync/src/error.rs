//! Error types.

use thiserror::Error;

use crate::lifecycle::Transition;
use crate::records::{ApplicationKey, ApplicationStatus, ChannelId, RoleId};
use crate::table::Table;

/// Failure reported by a [`RemoteTableClient`](crate::RemoteTableClient).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the call.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// A table is missing a column the caller addressed by name.
    #[error("table {table} has no column {column:?}")]
    MissingColumn { table: Table, column: String },

    /// A row index outside the table.
    #[error("row {row} out of range for table {table}")]
    RowOutOfRange { table: Table, row: usize },

    /// IO error from a file-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// What a lookup failed to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Role(RoleId),
    Application(ApplicationKey),
    Channel(ChannelId),
}

impl core::fmt::Display for Missing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Role(id) => write!(f, "role {id}"),
            Self::Application(key) => write!(f, "application {key}"),
            Self::Channel(id) => write!(f, "channel {id}"),
        }
    }
}

/// Error returned by [`SyncEngine`](crate::SyncEngine) operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Unknown role, application or channel.
    #[error("not found: {0}")]
    NotFound(Missing),

    /// An active application already exists for this role and applicant.
    #[error("application already exists: {0}")]
    DuplicateApplication(ApplicationKey),

    /// The lifecycle does not allow this transition from the current status.
    #[error("cannot {transition} an application that is {from}")]
    InvalidTransition {
        from: ApplicationStatus,
        transition: Transition,
    },

    /// Network or API failure talking to the store.
    #[error(transparent)]
    RemoteUnavailable(#[from] StoreError),
}

impl SyncError {
    /// Whether the error came from the store rather than from a domain rule.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
