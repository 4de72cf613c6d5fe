#![allow(dead_code, missing_docs)]

//! Common test utilities shared across integration tests.

use std::path::{Path, PathBuf};

use sqlmc_core::{CipherFamily, ConnectionConfig, EngineHandle, KeyManager};
use tempfile::TempDir;

pub fn temp_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("test.sqlite");
    (dir, path)
}

pub fn keyed(family: CipherFamily, key: &str) -> ConnectionConfig {
    ConnectionConfig::builder()
        .cipher_family(family)
        .with_key(key)
        .expect("valid key")
        .build()
}

pub fn create_notes(path: &Path, config: &ConnectionConfig) -> EngineHandle {
    KeyManager::default()
        .create_encrypted(path, config, |tx| {
            tx.execute_batch(
                "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);
                 INSERT INTO notes (body) VALUES ('one'), ('two'), ('three');",
            )
        })
        .expect("create encrypted database")
}

pub fn try_open(path: &Path, config: &ConnectionConfig) -> Option<EngineHandle> {
    KeyManager::default()
        .try_open_with_key(path, config)
        .expect("open attempt")
}

pub fn row_count(handle: &EngineHandle) -> i64 {
    handle
        .connection()
        .query_row("SELECT count(*) FROM notes", &[], |stmt| Ok(stmt.column_i64(0)))
        .expect("count rows")
}
