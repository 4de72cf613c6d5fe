//! Safe wrapper around a `SQLite` prepared statement.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawStmt`] which encapsulates the raw pointers and C type conversions.

use std::os::raw::c_int;

use super::error::{DbError, DbResult};
use super::ffi::{self, RawStmt};
use super::value::Value;

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// The statement has finished executing.
    Done,
}

/// A prepared `SQLite` statement.
///
/// Created via [`Connection::prepare`](super::Connection::prepare), tied to
/// the lifetime of the connection that created it and finalized when dropped.
pub struct Statement<'conn> {
    raw: RawStmt<'conn>,
}

impl<'conn> Statement<'conn> {
    pub(super) const fn new(raw: RawStmt<'conn>) -> Self {
        Self { raw }
    }

    /// Binds a slice of [`Value`]s to the statement parameters (1-indexed).
    ///
    /// # Errors
    ///
    /// Returns the engine error if a bind call fails (e.g. too many values).
    pub fn bind_values(&self, values: &[Value]) -> DbResult<()> {
        for (i, val) in values.iter().enumerate() {
            let idx = c_int::try_from(i + 1)
                .map_err(|_| DbError::new(ffi::SQLITE_MISUSE, "parameter index overflow"))?;
            match val {
                Value::Integer(v) => self.raw.bind_i64(idx, *v)?,
                Value::Blob(v) => self.raw.bind_blob(idx, v)?,
                Value::Text(v) => self.raw.bind_text(idx, v)?,
                Value::Null => self.raw.bind_null(idx)?,
            }
        }
        Ok(())
    }

    /// Executes a single step.
    ///
    /// # Errors
    ///
    /// Returns the engine error when the step fails (constraint violation,
    /// undecryptable page, busy database, ...).
    pub fn step(&self) -> DbResult<StepResult> {
        if self.raw.step()? == ffi::SQLITE_ROW {
            Ok(StepResult::Row)
        } else {
            Ok(StepResult::Done)
        }
    }

    /// Reads a column as `i64`.
    #[must_use]
    pub fn column_i64(&self, idx: usize) -> i64 {
        self.raw.column_i64(col(idx))
    }

    /// Reads a column as a blob. Returns an empty `Vec` for NULL.
    #[must_use]
    pub fn column_blob(&self, idx: usize) -> Vec<u8> {
        self.raw.column_blob(col(idx))
    }

    /// Reads a column as a UTF-8 string. Returns an empty string for NULL.
    #[must_use]
    pub fn column_text(&self, idx: usize) -> String {
        self.raw.column_text(col(idx))
    }

    /// Returns `true` if the column is SQL NULL.
    #[must_use]
    pub fn is_column_null(&self, idx: usize) -> bool {
        self.raw.column_type(col(idx)) == ffi::SQLITE_NULL
    }
}

// Out-of-range indexes read as NULL on the engine side.
fn col(idx: usize) -> c_int {
    c_int::try_from(idx).unwrap_or(c_int::MAX)
}
