//! CV store bootstrap: connections, busy handling and schema migrations.
//!
//! # Responsibility
//! - Open file-backed or in-memory CV stores with foreign keys on and a
//!   busy timeout long enough for intake writers to queue behind each other.
//! - Migrate the `cvs` table and the `cv_code_counter` singleton in order.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`; a store written by a
//!   newer build is refused, never downgraded.
//! - Repositories only see connections that finished migrating.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure opening, migrating or writing the CV store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The store carries CV migrations this build does not know.
    SchemaTooNew { found: u32, supported: u32 },
}

impl DbError {
    /// True when another intake transaction held the write lock for longer
    /// than the busy timeout. The submission can be retried as is.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "cv store schema version {found} is newer than supported {supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
