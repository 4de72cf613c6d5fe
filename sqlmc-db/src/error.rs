//! Database error types for the safe `SQLite` wrapper.

use std::fmt;

use thiserror::Error;

use super::ffi;

/// Result code returned by `SQLite` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbErrorCode(pub i32);

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by database operations.
///
/// `message` comes from `sqlite3_errmsg` (or the `sqlite3_exec` error
/// string). Statements carrying key material are executed through
/// [`Connection::execute_batch_zeroized`](crate::Connection::execute_batch_zeroized),
/// whose errors never include the SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sqlite error {code}: {message}")]
pub struct DbError {
    /// `SQLite` result code.
    pub code: DbErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl DbError {
    /// Creates a new database error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: DbErrorCode(code),
            message: message.into(),
        }
    }

    /// `SQLITE_NOTADB`: the file is not a database, or cannot be decrypted
    /// with the key material applied to the connection.
    #[must_use]
    pub const fn is_not_a_database(&self) -> bool {
        self.code.0 & 0xff == ffi::SQLITE_NOTADB
    }

    /// `SQLITE_BUSY`: another connection holds a conflicting lock.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.code.0 & 0xff == ffi::SQLITE_BUSY
    }

    /// `SQLITE_READONLY`: a write was attempted on a read-only handle.
    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.code.0 & 0xff == ffi::SQLITE_READONLY
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
