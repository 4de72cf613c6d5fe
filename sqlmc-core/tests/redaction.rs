//! Integration tests for secret redaction.

mod common;

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, Once};

use sqlmc_core::logger::{set_logger, LogLevel, Logger};
use sqlmc_core::{CipherFamily, CipherKey, CipherParams, ConnectionConfig, KeyManager};

struct Capture;

static RECORDS: Mutex<Vec<String>> = Mutex::new(Vec::new());
static INSTALL: Once = Once::new();

impl Logger for Capture {
    fn log(&self, level: LogLevel, message: String) {
        RECORDS
            .lock()
            .expect("records lock")
            .push(format!("{level:?} {message}"));
    }
}

fn install() {
    INSTALL.call_once(|| set_logger(Arc::new(Capture)));
}

fn records() -> Vec<String> {
    RECORDS.lock().expect("records lock").clone()
}

/// Display and Debug of an error and its whole source chain.
fn describe(err: &sqlmc_core::Error) -> String {
    let mut text = format!("{err} {err:?}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        write!(text, " {cause} {cause:?}").expect("write to string");
        source = cause.source();
    }
    text
}

fn assert_absent(secrets: &[&str], text: &str) {
    for secret in secrets {
        assert!(!text.contains(secret), "secret leaked into: {text}");
    }
}

#[test]
fn test_lifecycle_never_logs_keys() {
    install();
    let secrets = ["s3cr3t-first", "s3cr3t-second", "s3cr3t-wrong"];
    let (_dir, path) = common::temp_db();

    let first = common::keyed(CipherFamily::ChaCha20, secrets[0]);
    let wrong = common::keyed(CipherFamily::ChaCha20, secrets[2]);
    assert_absent(&secrets, &format!("{first:?}"));

    let mut handle = common::create_notes(&path, &first);
    assert_absent(&secrets, &format!("{handle:?}"));
    let new_key = CipherKey::new(secrets[1]).expect("key");
    KeyManager::rekey(&mut handle, &new_key).expect("rekey");
    drop(handle);

    let err = KeyManager::default()
        .open_with_key(&path, &wrong)
        .expect_err("wrong key");
    assert_absent(&secrets, &describe(&err));
    let err = KeyManager::default()
        .open_with_key(&path, &first)
        .expect_err("old key");
    assert_absent(&secrets, &describe(&err));

    let logged = records();
    assert!(
        logged.iter().any(|record| record.contains("rekeyed")),
        "expected a rekey record in {logged:?}"
    );
    assert!(logged.iter().any(|record| record.starts_with("Warn")));
    for record in &logged {
        assert_absent(&secrets, record);
    }
}

#[test]
fn test_key_values_are_redacted() {
    install();
    let secret = "s3cr3t-debug";
    let key = CipherKey::new(secret).expect("key");
    assert_eq!(format!("{key:?}"), "CipherKey([REDACTED])");
    assert_absent(&[secret], &format!("{:?}", key.fingerprint()));

    let directive = CipherParams::sqlcipher().key_directive(&key);
    assert_absent(&[secret], &format!("{directive:?}"));

    let config = ConnectionConfig::builder()
        .with("cipher", "aes128cbc")
        .expect("cipher")
        .with("key", secret)
        .expect("key")
        .build();
    assert_absent(&[secret], &format!("{config:?}"));
}

#[test]
fn test_rejected_keys_are_not_echoed() {
    install();
    let err = CipherKey::new("s3cr3t\0tail").expect_err("interior NUL");
    assert_absent(&["s3cr3t", "tail"], &describe(&err));

    let err = ConnectionConfig::from_uri("file:x.db?hexkey=0badc0ffee").expect_err("key in uri");
    assert_absent(&["0badc0ffee"], &describe(&err));

    let err = ConnectionConfig::builder()
        .with("kdf_iter", "s3cr3t")
        .map(|_| ())
        .expect_err("parameter without family");
    assert!(matches!(err, sqlmc_core::Error::MissingCipherFamily(_)));
}
