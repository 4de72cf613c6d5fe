//! Raw FFI bindings to `SQLite`, resolved at compile time via `cfg`.
//!
//! On native targets the symbols come from the sqlite3mc static library
//! compiled by `build.rs`. On `wasm32` targets they come from
//! `sqlite-wasm-rs` which ships its own WASM-compiled sqlite3mc.
//!
//! This is the **only** file in the crate that contains `unsafe` code. The
//! rest of the crate talks to [`RawDb`] and [`RawStmt`], which own the raw
//! pointers and convert between Rust and C types.

#![allow(non_camel_case_types, dead_code)]

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int, c_void};

use zeroize::Zeroize;

use super::error::{DbError, DbResult};

// ── SQLite constants ────────────────────────────────────────────────────

pub const SQLITE_OK: c_int = 0;
pub const SQLITE_BUSY: c_int = 5;
pub const SQLITE_READONLY: c_int = 8;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_NOTADB: c_int = 26;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;

pub const SQLITE_NULL: c_int = 5;

// Open flags
pub const SQLITE_OPEN_READONLY: c_int = 0x0000_0001;
pub const SQLITE_OPEN_READWRITE: c_int = 0x0000_0002;
pub const SQLITE_OPEN_CREATE: c_int = 0x0000_0004;
pub const SQLITE_OPEN_FULLMUTEX: c_int = 0x0001_0000;
pub const SQLITE_OPEN_SHAREDCACHE: c_int = 0x0002_0000;
pub const SQLITE_OPEN_PRIVATECACHE: c_int = 0x0004_0000;

// Destructor sentinel: -1 means SQLite copies the data before returning.
const SQLITE_TRANSIENT: isize = -1;

// ── Native backend ──────────────────────────────────────────────────────

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use super::{c_char, c_int, c_void};

    type sqlite3 = c_void;
    type sqlite3_stmt = c_void;

    extern "C" {
        pub fn sqlite3_open_v2(
            filename: *const c_char,
            pp_db: *mut *mut sqlite3,
            flags: c_int,
            z_vfs: *const c_char,
        ) -> c_int;
        pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;

        pub fn sqlite3_exec(
            db: *mut sqlite3,
            sql: *const c_char,
            callback: *const c_void,
            arg: *mut c_void,
            errmsg: *mut *mut c_char,
        ) -> c_int;
        pub fn sqlite3_free(ptr: *mut c_void);

        pub fn sqlite3_prepare_v2(
            db: *mut sqlite3,
            z_sql: *const c_char,
            n_byte: c_int,
            pp_stmt: *mut *mut sqlite3_stmt,
            pz_tail: *mut *const c_char,
        ) -> c_int;
        pub fn sqlite3_step(stmt: *mut sqlite3_stmt) -> c_int;
        pub fn sqlite3_finalize(stmt: *mut sqlite3_stmt) -> c_int;

        pub fn sqlite3_bind_int64(stmt: *mut sqlite3_stmt, index: c_int, value: i64) -> c_int;
        pub fn sqlite3_bind_blob(
            stmt: *mut sqlite3_stmt,
            index: c_int,
            value: *const c_void,
            n: c_int,
            destructor: isize,
        ) -> c_int;
        pub fn sqlite3_bind_text(
            stmt: *mut sqlite3_stmt,
            index: c_int,
            value: *const c_char,
            n: c_int,
            destructor: isize,
        ) -> c_int;
        pub fn sqlite3_bind_null(stmt: *mut sqlite3_stmt, index: c_int) -> c_int;

        pub fn sqlite3_column_int64(stmt: *mut sqlite3_stmt, i_col: c_int) -> i64;
        pub fn sqlite3_column_blob(stmt: *mut sqlite3_stmt, i_col: c_int) -> *const c_void;
        pub fn sqlite3_column_bytes(stmt: *mut sqlite3_stmt, i_col: c_int) -> c_int;
        pub fn sqlite3_column_text(stmt: *mut sqlite3_stmt, i_col: c_int) -> *const c_char;
        pub fn sqlite3_column_type(stmt: *mut sqlite3_stmt, i_col: c_int) -> c_int;

        pub fn sqlite3_errmsg(db: *mut sqlite3) -> *const c_char;
        pub fn sqlite3_changes(db: *mut sqlite3) -> c_int;
        pub fn sqlite3_db_readonly(db: *mut sqlite3, z_db_name: *const c_char) -> c_int;
    }
}

// ── WASM backend ────────────────────────────────────────────────────────

#[cfg(target_arch = "wasm32")]
mod imp {
    //! Thin wrappers around `sqlite_wasm_rs` that normalise pointer types
    //! to `*mut c_void` so callers are backend-agnostic.

    use super::{c_char, c_int, c_void};
    use sqlite_wasm_rs as wasm;

    pub unsafe fn sqlite3_open_v2(
        filename: *const c_char,
        pp_db: *mut *mut c_void,
        flags: c_int,
        z_vfs: *const c_char,
    ) -> c_int {
        let pp = pp_db.cast::<*mut wasm::sqlite3>();
        wasm::sqlite3_open_v2(filename.cast(), pp, flags, z_vfs.cast())
    }

    pub unsafe fn sqlite3_close_v2(db: *mut c_void) -> c_int {
        wasm::sqlite3_close_v2(db.cast())
    }

    pub unsafe fn sqlite3_exec(
        db: *mut c_void,
        sql: *const c_char,
        _callback: *const c_void,
        arg: *mut c_void,
        errmsg: *mut *mut c_char,
    ) -> c_int {
        wasm::sqlite3_exec(db.cast(), sql.cast(), None, arg, errmsg.cast())
    }

    pub unsafe fn sqlite3_free(ptr: *mut c_void) {
        wasm::sqlite3_free(ptr);
    }

    pub unsafe fn sqlite3_prepare_v2(
        db: *mut c_void,
        z_sql: *const c_char,
        n_byte: c_int,
        pp_stmt: *mut *mut c_void,
        pz_tail: *mut *const c_char,
    ) -> c_int {
        let pp = pp_stmt.cast::<*mut wasm::sqlite3_stmt>();
        wasm::sqlite3_prepare_v2(db.cast(), z_sql.cast(), n_byte, pp, pz_tail.cast())
    }

    pub unsafe fn sqlite3_step(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_step(stmt.cast())
    }

    pub unsafe fn sqlite3_finalize(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_finalize(stmt.cast())
    }

    pub unsafe fn sqlite3_bind_int64(stmt: *mut c_void, index: c_int, value: i64) -> c_int {
        wasm::sqlite3_bind_int64(stmt.cast(), index, value)
    }

    pub unsafe fn sqlite3_bind_blob(
        stmt: *mut c_void,
        index: c_int,
        value: *const c_void,
        n: c_int,
        destructor: isize,
    ) -> c_int {
        wasm::sqlite3_bind_blob(stmt.cast(), index, value, n, destructor)
    }

    pub unsafe fn sqlite3_bind_text(
        stmt: *mut c_void,
        index: c_int,
        value: *const c_char,
        n: c_int,
        destructor: isize,
    ) -> c_int {
        wasm::sqlite3_bind_text(stmt.cast(), index, value.cast(), n, destructor)
    }

    pub unsafe fn sqlite3_bind_null(stmt: *mut c_void, index: c_int) -> c_int {
        wasm::sqlite3_bind_null(stmt.cast(), index)
    }

    pub unsafe fn sqlite3_column_int64(stmt: *mut c_void, i_col: c_int) -> i64 {
        wasm::sqlite3_column_int64(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_column_blob(stmt: *mut c_void, i_col: c_int) -> *const c_void {
        wasm::sqlite3_column_blob(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_column_bytes(stmt: *mut c_void, i_col: c_int) -> c_int {
        wasm::sqlite3_column_bytes(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_column_text(stmt: *mut c_void, i_col: c_int) -> *const c_char {
        wasm::sqlite3_column_text(stmt.cast(), i_col).cast()
    }

    pub unsafe fn sqlite3_column_type(stmt: *mut c_void, i_col: c_int) -> c_int {
        wasm::sqlite3_column_type(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_errmsg(db: *mut c_void) -> *const c_char {
        wasm::sqlite3_errmsg(db.cast()).cast()
    }

    pub unsafe fn sqlite3_changes(db: *mut c_void) -> c_int {
        wasm::sqlite3_changes(db.cast())
    }

    pub unsafe fn sqlite3_db_readonly(db: *mut c_void, z_db_name: *const c_char) -> c_int {
        wasm::sqlite3_db_readonly(db.cast(), z_db_name.cast())
    }
}

// ── RawDb ───────────────────────────────────────────────────────────────

/// Owned `sqlite3*` handle. Closed on drop.
pub struct RawDb {
    ptr: *mut c_void,
}

// The handle is opened with SQLITE_OPEN_FULLMUTEX, so moving it to another
// thread is sound. It is deliberately not `Sync`.
unsafe impl Send for RawDb {}

impl RawDb {
    /// Opens `filename` with the given `SQLITE_OPEN_*` flags.
    pub fn open(filename: &str, flags: c_int) -> DbResult<Self> {
        let c_path = CString::new(filename)
            .map_err(|e| DbError::new(SQLITE_MISUSE, format!("invalid path: {e}")))?;
        let mut db: *mut c_void = std::ptr::null_mut();
        let rc = unsafe { imp::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, std::ptr::null()) };
        if rc != SQLITE_OK {
            // If open failed but we got a handle, extract the error and close.
            let msg = if db.is_null() {
                format!("sqlite3_open_v2 returned {rc}")
            } else {
                let m = errmsg_raw(db);
                unsafe {
                    imp::sqlite3_close_v2(db);
                }
                m
            };
            return Err(DbError::new(rc, msg));
        }
        Ok(Self { ptr: db })
    }

    /// Runs one or more statements through `sqlite3_exec`.
    pub fn exec(&self, sql: &str) -> DbResult<()> {
        let c_sql = CString::new(sql)
            .map_err(|e| DbError::new(SQLITE_MISUSE, format!("nul in SQL: {e}")))?;
        self.exec_cstr(&c_sql)
    }

    /// Like [`exec`](Self::exec) but wipes the C string copy afterwards.
    ///
    /// The error for an interior NUL deliberately omits the SQL text.
    pub fn exec_zeroized(&self, sql: &str) -> DbResult<()> {
        let c_sql = match CString::new(sql.as_bytes().to_vec()) {
            Ok(c) => c,
            Err(e) => {
                let mut raw = e.into_vec();
                raw.zeroize();
                return Err(DbError::new(SQLITE_MISUSE, "nul in sensitive SQL"));
            }
        };
        let result = self.exec_cstr(&c_sql);
        let mut raw = c_sql.into_bytes_with_nul();
        raw.zeroize();
        result
    }

    fn exec_cstr(&self, c_sql: &CStr) -> DbResult<()> {
        let mut errmsg: *mut c_char = std::ptr::null_mut();
        let rc = unsafe {
            imp::sqlite3_exec(
                self.ptr,
                c_sql.as_ptr(),
                std::ptr::null(),
                std::ptr::null_mut(),
                &mut errmsg,
            )
        };
        if rc != SQLITE_OK {
            let msg = if errmsg.is_null() {
                errmsg_raw(self.ptr)
            } else {
                let s = unsafe { CStr::from_ptr(errmsg) }.to_string_lossy().into_owned();
                unsafe {
                    imp::sqlite3_free(errmsg.cast());
                }
                s
            };
            return Err(DbError::new(rc, msg));
        }
        Ok(())
    }

    /// Prepares a single statement bound to this handle's lifetime.
    pub fn prepare(&self, sql: &str) -> DbResult<RawStmt<'_>> {
        let c_sql = CString::new(sql)
            .map_err(|e| DbError::new(SQLITE_MISUSE, format!("nul in SQL: {e}")))?;
        let mut stmt: *mut c_void = std::ptr::null_mut();
        let rc = unsafe {
            imp::sqlite3_prepare_v2(self.ptr, c_sql.as_ptr(), -1, &mut stmt, std::ptr::null_mut())
        };
        if rc != SQLITE_OK {
            return Err(DbError::new(rc, errmsg_raw(self.ptr)));
        }
        if stmt.is_null() {
            // Whitespace or comment only.
            return Err(DbError::new(SQLITE_MISUSE, "empty statement"));
        }
        Ok(RawStmt {
            ptr: stmt,
            db: self.ptr,
            _conn: PhantomData,
        })
    }

    pub fn changes(&self) -> i32 {
        unsafe { imp::sqlite3_changes(self.ptr) }
    }

    /// Returns `true` if the `main` schema was opened read-only.
    pub fn is_readonly(&self) -> bool {
        unsafe { imp::sqlite3_db_readonly(self.ptr, c"main".as_ptr()) == 1 }
    }

    /// Closes the handle, reporting the engine's result code.
    pub fn close(mut self) -> DbResult<()> {
        let ptr = std::mem::replace(&mut self.ptr, std::ptr::null_mut());
        let rc = unsafe { imp::sqlite3_close_v2(ptr) };
        if rc != SQLITE_OK {
            return Err(DbError::new(rc, "sqlite3_close_v2 failed"));
        }
        Ok(())
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                imp::sqlite3_close_v2(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

// ── RawStmt ─────────────────────────────────────────────────────────────

/// Owned `sqlite3_stmt*` handle tied to the lifetime of its [`RawDb`].
/// Finalized on drop.
pub struct RawStmt<'conn> {
    ptr: *mut c_void,
    db: *mut c_void,
    _conn: PhantomData<&'conn RawDb>,
}

impl RawStmt<'_> {
    fn check(&self, rc: c_int) -> DbResult<()> {
        if rc == SQLITE_OK {
            Ok(())
        } else {
            Err(DbError::new(rc, errmsg_raw(self.db)))
        }
    }

    pub fn bind_i64(&self, idx: c_int, value: i64) -> DbResult<()> {
        self.check(unsafe { imp::sqlite3_bind_int64(self.ptr, idx, value) })
    }

    pub fn bind_blob(&self, idx: c_int, value: &[u8]) -> DbResult<()> {
        let len = c_int::try_from(value.len())
            .map_err(|_| DbError::new(SQLITE_MISUSE, "blob too large"))?;
        self.check(unsafe {
            imp::sqlite3_bind_blob(self.ptr, idx, value.as_ptr().cast(), len, SQLITE_TRANSIENT)
        })
    }

    pub fn bind_text(&self, idx: c_int, value: &str) -> DbResult<()> {
        let len = c_int::try_from(value.len())
            .map_err(|_| DbError::new(SQLITE_MISUSE, "text too large"))?;
        self.check(unsafe {
            imp::sqlite3_bind_text(self.ptr, idx, value.as_ptr().cast(), len, SQLITE_TRANSIENT)
        })
    }

    pub fn bind_null(&self, idx: c_int) -> DbResult<()> {
        self.check(unsafe { imp::sqlite3_bind_null(self.ptr, idx) })
    }

    /// Steps once. Returns `SQLITE_ROW` or `SQLITE_DONE`; anything else is an error.
    pub fn step(&self) -> DbResult<c_int> {
        let rc = unsafe { imp::sqlite3_step(self.ptr) };
        match rc {
            SQLITE_ROW | SQLITE_DONE => Ok(rc),
            _ => Err(DbError::new(rc, errmsg_raw(self.db))),
        }
    }

    pub fn column_i64(&self, idx: c_int) -> i64 {
        unsafe { imp::sqlite3_column_int64(self.ptr, idx) }
    }

    pub fn column_blob(&self, idx: c_int) -> Vec<u8> {
        unsafe {
            let ptr = imp::sqlite3_column_blob(self.ptr, idx);
            let len = imp::sqlite3_column_bytes(self.ptr, idx);
            match usize::try_from(len) {
                Ok(len) if !ptr.is_null() && len > 0 => {
                    std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec()
                }
                _ => Vec::new(),
            }
        }
    }

    pub fn column_text(&self, idx: c_int) -> String {
        unsafe {
            let ptr = imp::sqlite3_column_text(self.ptr, idx);
            if ptr.is_null() {
                return String::new();
            }
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    pub fn column_type(&self, idx: c_int) -> c_int {
        unsafe { imp::sqlite3_column_type(self.ptr, idx) }
    }
}

impl Drop for RawStmt<'_> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                imp::sqlite3_finalize(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

fn errmsg_raw(db: *mut c_void) -> String {
    unsafe {
        let ptr = imp::sqlite3_errmsg(db);
        if ptr.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}
