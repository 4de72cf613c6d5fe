//! Safe wrapper around a `SQLite` database connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawDb`] which encapsulates the raw pointers and C type conversions.

use std::path::Path;

use super::error::{DbError, DbResult};
use super::ffi::{self, RawDb};
use super::statement::{Statement, StepResult};
use super::transaction::Transaction;
use super::value::Value;

/// How the database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-only; the file must exist.
    ReadOnly,
    /// Read-write; the file must exist.
    ReadWrite,
    /// Read-write, creating the file if absent.
    #[default]
    ReadWriteCreate,
}

/// Flags passed to `sqlite3_open_v2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    /// Access mode for the main database file.
    pub access: AccessMode,
    /// Open in shared-cache mode instead of private-cache mode.
    pub shared_cache: bool,
}

impl OpenFlags {
    const fn bits(self) -> i32 {
        let access = match self.access {
            AccessMode::ReadOnly => ffi::SQLITE_OPEN_READONLY,
            AccessMode::ReadWrite => ffi::SQLITE_OPEN_READWRITE,
            AccessMode::ReadWriteCreate => ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE,
        };
        let cache = if self.shared_cache {
            ffi::SQLITE_OPEN_SHAREDCACHE
        } else {
            ffi::SQLITE_OPEN_PRIVATECACHE
        };
        access | cache | ffi::SQLITE_OPEN_FULLMUTEX
    }
}

/// A `SQLite` database connection.
///
/// Closed when dropped, or explicitly through [`close`](Self::close). Not
/// `Sync`: all access must happen from one thread at a time.
pub struct Connection {
    db: RawDb,
}

impl Connection {
    /// Opens (or creates) a database at `path` with default flags.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the file cannot be opened.
    pub fn open(path: &Path, read_only: bool) -> DbResult<Self> {
        let access = if read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWriteCreate
        };
        Self::open_with_flags(
            path,
            OpenFlags {
                access,
                shared_cache: false,
            },
        )
    }

    /// Opens a database at `path` with explicit flags.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the file cannot be opened (missing file
    /// without [`AccessMode::ReadWriteCreate`], permissions, invalid path).
    pub fn open_with_flags(path: &Path, flags: OpenFlags) -> DbResult<Self> {
        let path_str = path.to_string_lossy();
        let db = RawDb::open(&path_str, flags.bits())?;
        Ok(Self { db })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns the engine error if allocation fails.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(Path::new(":memory:"), false)
    }

    /// Executes one or more SQL statements separated by semicolons.
    ///
    /// No result rows are returned. Suitable for DDL, PRAGMAs, and
    /// multi-statement scripts.
    ///
    /// # Errors
    ///
    /// Returns the first engine error raised by the script.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.db.exec(sql)
    }

    /// Like [`execute_batch`](Self::execute_batch) but zeroizes the internal
    /// C string buffer after execution. Use for SQL containing sensitive
    /// material (e.g. `PRAGMA key`).
    ///
    /// # Errors
    ///
    /// Returns the first engine error raised by the script.
    pub fn execute_batch_zeroized(&self, sql: &str) -> DbResult<()> {
        self.db.exec_zeroized(sql)
    }

    /// Prepares a single SQL statement.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the SQL does not compile.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement<'_>> {
        let raw_stmt = self.db.prepare(sql)?;
        Ok(Statement::new(raw_stmt))
    }

    /// Prepares and executes a single SQL statement with the given parameters.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns the engine error from preparing, binding or stepping.
    pub fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        let stmt = self.prepare(sql)?;
        stmt.bind_values(params)?;
        stmt.step()?;
        Ok(self.changes())
    }

    /// Prepares and executes a statement, mapping exactly one result row.
    ///
    /// # Errors
    ///
    /// Returns an error if no row is returned, or the engine error.
    pub fn query_row<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
    ) -> DbResult<T> {
        self.query_row_optional(sql, params, mapper)?
            .ok_or_else(|| DbError::new(ffi::SQLITE_DONE, "query returned no rows"))
    }

    /// Like [`query_row`](Self::query_row) but returns `Ok(None)` when no row
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns the engine error from preparing, binding or stepping.
    pub fn query_row_optional<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
    ) -> DbResult<Option<T>> {
        let stmt = self.prepare(sql)?;
        stmt.bind_values(params)?;
        match stmt.step()? {
            StepResult::Row => mapper(&stmt).map(Some),
            StepResult::Done => Ok(None),
        }
    }

    /// Reads the current value of `PRAGMA <name>` as text.
    ///
    /// Returns an empty string when the pragma produces no row.
    ///
    /// # Errors
    ///
    /// Returns the engine error, e.g. `SQLITE_NOTADB` when the pragma has to
    /// read an undecryptable page.
    pub fn pragma_value(&self, name: &str) -> DbResult<String> {
        let value = self.query_row_optional(&format!("PRAGMA {name};"), &[], |stmt| {
            Ok(stmt.column_text(0))
        })?;
        Ok(value.unwrap_or_default())
    }

    /// Runs `PRAGMA integrity_check` and returns whether the database is healthy.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the check cannot run.
    pub fn integrity_check(&self) -> DbResult<bool> {
        let result = self.query_row("PRAGMA integrity_check;", &[], |stmt| {
            Ok(stmt.column_text(0))
        })?;
        Ok(result.trim() == "ok")
    }

    /// Begins a deferred transaction.
    ///
    /// # Errors
    ///
    /// Returns the engine error if `BEGIN` fails.
    pub fn transaction(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, false)
    }

    /// Begins an immediate transaction (acquires a RESERVED lock right away).
    ///
    /// # Errors
    ///
    /// Returns the engine error if `BEGIN IMMEDIATE` fails (e.g. busy).
    pub fn transaction_immediate(&self) -> DbResult<Transaction<'_>> {
        Transaction::begin(self, true)
    }

    /// Returns the number of rows changed by the most recent statement.
    #[must_use]
    pub fn changes(&self) -> usize {
        usize::try_from(self.db.changes()).unwrap_or(0)
    }

    /// Returns `true` if the main database was opened read-only.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.db.is_readonly()
    }

    /// Closes the connection, surfacing any error the engine reports.
    ///
    /// # Errors
    ///
    /// Returns the engine error from `sqlite3_close_v2`.
    pub fn close(self) -> DbResult<()> {
        self.db.close()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
