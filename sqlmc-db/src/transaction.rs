//! Safe wrapper around a `SQLite` transaction.

use super::connection::Connection;
use super::error::DbResult;
use super::value::Value;

/// An open database transaction.
///
/// Rolls back on drop unless explicitly committed.
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    committed: bool,
}

impl<'conn> Transaction<'conn> {
    pub(super) fn begin(conn: &'conn Connection, immediate: bool) -> DbResult<Self> {
        conn.execute_batch(if immediate {
            "BEGIN IMMEDIATE"
        } else {
            "BEGIN DEFERRED"
        })?;
        Ok(Self {
            conn,
            committed: false,
        })
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns the engine error if `COMMIT` fails; the transaction is then
    /// rolled back on drop.
    pub fn commit(mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.committed = true;
        Ok(())
    }

    /// See [`Connection::execute_batch`].
    ///
    /// # Errors
    ///
    /// Returns the first engine error raised by the script.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.conn.execute_batch(sql)
    }

    /// See [`Connection::execute`].
    ///
    /// # Errors
    ///
    /// Returns the engine error from preparing, binding or stepping.
    pub fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        self.conn.execute(sql, params)
    }

    /// The connection this transaction runs on.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        self.conn
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            // Best-effort rollback.
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}
