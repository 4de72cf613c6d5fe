//! Integration tests for parameter handling.

mod common;

use std::path::Path;

use sqlmc_core::{
    AutoVacuum, CacheMode, CipherFamily, ConnectionConfig, ConnectionOpener, DriverRegistry,
    Encoding, EngineHandle, Error, JournalMode, OpenMode, OptionName, PendingLayout,
};
use test_case::test_case;

fn open(path: &Path, config: &ConnectionConfig) -> EngineHandle {
    ConnectionOpener::new().open(path, config).expect("open")
}

fn effective(handle: &EngineHandle, name: OptionName) -> String {
    handle.effective_value(name).expect("read effective value")
}

fn seed(handle: &EngineHandle) {
    handle
        .connection()
        .execute_batch(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);
             INSERT INTO notes (body) VALUES ('one'), ('two'), ('three');",
        )
        .expect("seed");
}

#[test]
fn test_plain_file_visible_to_second_handle() {
    let (_dir, path) = common::temp_db();
    let first = open(&path, &ConnectionConfig::default());
    seed(&first);

    let second = open(&path, &ConnectionConfig::default());
    assert_eq!(common::row_count(&first), 3);
    assert_eq!(common::row_count(&second), 3);
    assert_eq!(second.cipher_family(), None);
}

fn layout_config(family: Option<CipherFamily>) -> ConnectionConfig {
    let builder = ConnectionConfig::builder()
        .page_size(65536)
        .expect("page size")
        .option(AutoVacuum::Incremental)
        .option(Encoding::Utf16Le)
        .option(JournalMode::Wal);
    match family {
        Some(family) => builder
            .cipher_family(family)
            .with_key("layout key")
            .expect("key")
            .build(),
        None => builder.build(),
    }
}

#[test_case(None ; "plain")]
#[test_case(Some(CipherFamily::ChaCha20) ; "chacha20")]
fn test_page_layout_on_new_database(family: Option<CipherFamily>) {
    let (_dir, path) = common::temp_db();
    let config = layout_config(family);
    let handle = open(&path, &config);
    seed(&handle);

    assert_eq!(effective(&handle, OptionName::PageSize), "65536");
    assert_eq!(effective(&handle, OptionName::AutoVacuum), "2");
    assert_eq!(effective(&handle, OptionName::Encoding), "UTF-16le");
    assert_eq!(effective(&handle, OptionName::JournalMode), "wal");
    drop(handle);

    let reopened = open(&path, &config);
    assert_eq!(common::row_count(&reopened), 3);
    assert_eq!(effective(&reopened, OptionName::PageSize), "65536");
    assert_eq!(effective(&reopened, OptionName::Encoding), "UTF-16le");
}

#[test]
fn test_uri_options_through_registry() {
    let (_dir, path) = common::temp_db();
    let uri = format!(
        "sqlmc:file:{}?busy_timeout=1800000&auto_vacuum=2&journal_mode=truncate\
         &synchronous=full&cache_size=-65536",
        path.display()
    );
    let handle = DriverRegistry::with_defaults()
        .connect(&uri, None)
        .expect("connect");

    assert_eq!(effective(&handle, OptionName::BusyTimeout), "1800000");
    assert_eq!(effective(&handle, OptionName::AutoVacuum), "2");
    assert_eq!(effective(&handle, OptionName::JournalMode), "truncate");
    assert_eq!(effective(&handle, OptionName::Synchronous), "2");
    assert_eq!(effective(&handle, OptionName::CacheSize), "-65536");
    assert_eq!(effective(&handle, OptionName::Cache), "private");
    assert_eq!(effective(&handle, OptionName::Mode), "rwc");
}

#[test]
fn test_explicit_config_overrides_uri() {
    let (_dir, path) = common::temp_db();
    let uri = format!(
        "sqlmc:file:{}?journal_mode=truncate&busy_timeout=100",
        path.display()
    );
    let explicit = ConnectionConfig::builder()
        .option(JournalMode::Memory)
        .build();
    let handle = DriverRegistry::with_defaults()
        .connect(&uri, Some(&explicit))
        .expect("connect");

    assert_eq!(effective(&handle, OptionName::JournalMode), "memory");
    assert_eq!(effective(&handle, OptionName::BusyTimeout), "100");
}

#[test]
fn test_keyed_connection_through_registry() {
    let (_dir, path) = common::temp_db();
    let config = common::keyed(CipherFamily::Aes256Cbc, "Key1");
    drop(common::create_notes(&path, &config));

    let uri = format!("sqlmc:file:{}?foreign_keys=on", path.display());
    let registry = DriverRegistry::with_defaults();
    let handle = registry.connect(&uri, Some(&config)).expect("connect");
    assert_eq!(common::row_count(&handle), 3);
    assert_eq!(effective(&handle, OptionName::ForeignKeys), "1");
    drop(handle);

    let wrong = common::keyed(CipherFamily::Aes256Cbc, "Key2");
    let err = registry.connect(&uri, Some(&wrong)).expect_err("wrong key");
    assert!(err.is_authentication_failure(), "unexpected error: {err}");
}

#[test_case("100%25.db", "100%.db" ; "percent escape")]
#[test_case("a#b.db", "a" ; "hash")]
fn test_plain_uri_path_is_literal(name: &str, misread: &str) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    let uri = format!("sqlmc:{}", path.display());
    let handle = DriverRegistry::with_defaults()
        .connect(&uri, None)
        .expect("connect");
    seed(&handle);

    assert_eq!(handle.path(), path.as_path());
    assert!(path.exists());
    assert!(!dir.path().join(misread).exists());
}

#[test]
fn test_uri_rejects_key_material() {
    let registry = DriverRegistry::with_defaults();
    let err = registry
        .connect("sqlmc::memory:?key=hunter2", None)
        .expect_err("key in uri");
    assert!(matches!(err, Error::InvalidValue { ref option, .. } if option == "key"));
    assert!(!err.to_string().contains("hunter2"));
}

#[test_case("busy_timeout", "2500", "2500" ; "busy timeout")]
#[test_case("foreign_keys", "true", "1" ; "foreign keys")]
#[test_case("secure_delete", "on", "1" ; "secure delete")]
#[test_case("locking_mode", "EXCLUSIVE", "exclusive" ; "locking mode")]
#[test_case("temp_store", "memory", "2" ; "temp store")]
#[test_case("synchronous", "extra", "3" ; "synchronous")]
#[test_case("cache_size", "-4000", "-4000" ; "cache size")]
#[test_case("page_size", "8192", "8192" ; "page size")]
#[test_case("auto_vacuum", "full", "1" ; "auto vacuum")]
#[test_case("encoding", "UTF-16be", "UTF-16be" ; "encoding")]
#[test_case("journal_mode", "persist", "persist" ; "journal mode")]
#[test_case("cache", "shared", "shared" ; "cache")]
fn test_option_reads_back(name: &str, raw: &str, expected: &str) {
    let (_dir, path) = common::temp_db();
    let config = ConnectionConfig::builder()
        .with(name, raw)
        .expect("valid option")
        .build();
    let handle = open(&path, &config);
    let option: OptionName = name.parse().expect("registered option");
    assert_eq!(effective(&handle, option), expected);
}

#[test]
fn test_read_only_mode() {
    let (_dir, path) = common::temp_db();
    let read_only = ConnectionConfig::builder()
        .open_mode(OpenMode::ReadOnly)
        .build();

    let err = ConnectionOpener::new()
        .open(&path, &read_only)
        .expect_err("missing file");
    assert!(matches!(err, Error::EngineOpen(_)), "unexpected error: {err}");

    seed(&open(&path, &ConnectionConfig::default()));

    let handle = open(&path, &read_only);
    assert_eq!(common::row_count(&handle), 3);
    assert_eq!(effective(&handle, OptionName::Mode), "ro");
    let err = handle
        .connection()
        .execute_batch("INSERT INTO notes (body) VALUES ('four');")
        .expect_err("read-only write");
    assert!(err.is_readonly(), "unexpected error: {err}");
}

#[test]
fn test_shared_cache_mode() {
    let (_dir, path) = common::temp_db();
    let config = ConnectionConfig::builder()
        .cache_mode(CacheMode::Shared)
        .build();
    let first = open(&path, &config);
    seed(&first);
    let second = open(&path, &config);
    assert_eq!(common::row_count(&second), 3);
    assert_eq!(effective(&second, OptionName::Cache), "shared");
}

#[test]
fn test_layout_before_first_write_takes_effect() {
    let (_dir, path) = common::temp_db();
    let handle = open(&path, &ConnectionConfig::default());

    let mut layout = PendingLayout::new();
    layout
        .set_page_size(8192)
        .expect("page size")
        .set_encoding(Encoding::Utf16)
        .set_auto_vacuum(AutoVacuum::Full);
    let report = layout.apply(&handle).expect("apply");
    assert_eq!(report.entries().len(), 3);
    assert_eq!(report.mismatches().count(), 0);

    seed(&handle);
    assert_eq!(effective(&handle, OptionName::PageSize), "8192");
    assert!(effective(&handle, OptionName::Encoding).starts_with("UTF-16"));
}

#[test]
fn test_layout_after_first_write_is_reported() {
    let (_dir, path) = common::temp_db();
    let handle = open(&path, &ConnectionConfig::default());
    seed(&handle);

    let mut layout = PendingLayout::new();
    layout
        .set_page_size(65536)
        .expect("page size")
        .set_encoding(Encoding::Utf16Le);
    let report = layout.apply(&handle).expect("apply");

    let ignored: Vec<_> = report.mismatches().map(|entry| entry.option).collect();
    assert_eq!(ignored, [OptionName::PageSize, OptionName::Encoding]);
    assert_eq!(effective(&handle, OptionName::PageSize), "4096");
    assert_eq!(effective(&handle, OptionName::Encoding), "UTF-8");
    assert_eq!(common::row_count(&handle), 3);
}

#[test]
fn test_pending_layout_rejects_general_options() {
    let err = PendingLayout::new()
        .set("busy_timeout", "10")
        .map(|_| ())
        .expect_err("general option");
    assert!(matches!(err, Error::InvalidValue { option, .. } if option == "busy_timeout"));
}

#[test]
fn test_effective_settings_serialize() {
    let (_dir, path) = common::temp_db();
    let handle = common::create_notes(&path, &common::keyed(CipherFamily::SqlCipher, "Key1"));
    let settings = handle.effective_settings().expect("settings");

    let json = serde_json::to_value(&settings).expect("serialize");
    assert_eq!(json["cipher"], "sqlcipher");
    assert_eq!(json["options"]["journal_mode"], "delete");
    assert_eq!(json["options"]["mode"], "rwc");
    assert_eq!(json["options"]["foreign_keys"], "0");
    assert_eq!(
        json["options"].as_object().map(serde_json::Map::len),
        Some(13)
    );
}
