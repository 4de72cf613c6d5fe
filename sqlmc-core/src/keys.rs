//! Cipher key lifecycle: creating encrypted databases, authenticating with a
//! key, and rekeying.
//!
//! The public contract is boolean: a handle is either readable with the
//! supplied key or no handle is returned. Wrong key, wrong cipher family and
//! file corruption all surface as [`Error::AuthenticationFailed`]; the engine
//! error is kept as its source for diagnostics.
//!
//! Rekeying requires exclusive access to the file. Other handles to the same
//! file must be closed by the caller before [`KeyManager::rekey`] and reopened
//! with the new key afterwards.

use std::path::Path;

use sqlmc_db::{DbResult, Transaction};

use crate::cipher::{CipherFamily, CipherKey, KeyFingerprint};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::opener::{ConnectionOpener, EngineHandle};

/// Key state of an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// The handle was opened without a key, or with a key that has not been
    /// shown to read the database yet.
    Unkeyed,
    /// The handle reads the database with `family` and the key with
    /// `fingerprint`.
    Keyed {
        /// Cipher family.
        family: CipherFamily,
        /// Fingerprint of the current key.
        fingerprint: KeyFingerprint,
    },
}

/// Runs key lifecycle operations on top of a [`ConnectionOpener`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyManager {
    opener: ConnectionOpener,
}

impl KeyManager {
    /// A key manager opening handles through `opener`.
    #[must_use]
    pub const fn new(opener: ConnectionOpener) -> Self {
        Self { opener }
    }

    /// Opens `path` with the configured key and runs the schema-defining
    /// write `schema` in an immediate transaction.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidValue`] if `config` carries no key.
    /// - [`Error::AuthenticationFailed`] if `path` already exists and cannot
    ///   be read with the key.
    /// - Any error of [`ConnectionOpener::open`], or [`Error::Engine`] from
    ///   `schema` or the commit.
    pub fn create_encrypted<F>(
        &self,
        path: impl AsRef<Path>,
        config: &ConnectionConfig,
        schema: F,
    ) -> Result<EngineHandle>
    where
        F: FnOnce(&Transaction<'_>) -> DbResult<()>,
    {
        let family = require_key(config)?;
        let mut handle = self.opener.open(path, config).map_err(authentication)?;
        {
            let tx = handle
                .connection()
                .transaction_immediate()
                .map_err(|err| authentication(Error::Engine(err)))?;
            schema(&tx).map_err(|err| authentication(Error::Engine(err)))?;
            tx.commit()?;
        }
        authenticated(&mut handle, config);
        log::info!("created encrypted database {} ({family})", handle.path().display());
        Ok(handle)
    }

    /// Opens `path` with the configured key and proves the handle readable.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidValue`] if `config` carries no key.
    /// - [`Error::AuthenticationFailed`] if the database cannot be read with
    ///   the key and family. No handle is left open.
    /// - Any other error of [`ConnectionOpener::open`].
    pub fn open_with_key(
        &self,
        path: impl AsRef<Path>,
        config: &ConnectionConfig,
    ) -> Result<EngineHandle> {
        let family = require_key(config)?;
        let path = path.as_ref();
        // Read check runs here for both lazy and eager openers.
        let mut handle = self
            .opener
            .validate_on_open(false)
            .open(path, config)
            .map_err(authentication)?;
        if let Err(cause) = handle.probe() {
            drop(handle);
            log::warn!(
                "{} is not readable with the supplied {family} key: {cause}",
                path.display()
            );
            return Err(Error::AuthenticationFailed { cause });
        }
        authenticated(&mut handle, config);
        Ok(handle)
    }

    /// Like [`open_with_key`](Self::open_with_key) but returns `Ok(None)`
    /// when authentication fails.
    ///
    /// # Errors
    ///
    /// Any error of [`open_with_key`](Self::open_with_key) other than
    /// [`Error::AuthenticationFailed`].
    pub fn try_open_with_key(
        &self,
        path: impl AsRef<Path>,
        config: &ConnectionConfig,
    ) -> Result<Option<EngineHandle>> {
        match self.open_with_key(path, config) {
            Ok(handle) => Ok(Some(handle)),
            Err(Error::AuthenticationFailed { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Whether `handle` can read the system catalog.
    #[must_use]
    pub fn is_readable(handle: &EngineHandle) -> bool {
        handle.probe().is_ok()
    }

    /// Re-encrypts the database behind `handle` under `new_key`, keeping the
    /// handle's cipher family and parameters.
    ///
    /// On success the handle stays open and readable under the new key. If
    /// the engine rejects the rekey the file stays readable under the old
    /// key. Once the engine accepts it, the handle's key state reports the
    /// new key even if the read-back afterwards fails.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedRekey`] if the handle was opened without a key.
    /// - [`Error::RekeyFailed`] if the engine rejects the rekey.
    /// - [`Error::Engine`] if the database was rekeyed but could not be read
    ///   back afterwards. The file is under the new key.
    pub fn rekey(handle: &mut EngineHandle, new_key: &CipherKey) -> Result<()> {
        let family = handle.cipher_family().unwrap_or_default();
        Self::rekey_to(handle, family, new_key)
    }

    /// Like [`rekey`](Self::rekey), with the target family stated explicitly.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedRekey`] if `family` differs from the handle's
    ///   family, or the handle was opened without a key.
    /// - [`Error::RekeyFailed`] if the engine rejects the rekey.
    /// - [`Error::Engine`] if the read-back after the rekey fails.
    pub fn rekey_to(
        handle: &mut EngineHandle,
        family: CipherFamily,
        new_key: &CipherKey,
    ) -> Result<()> {
        let params = match handle.cipher_params() {
            Some(params) if params.family() == family => params,
            Some(params) => {
                return Err(Error::UnsupportedRekey {
                    from: params.family().as_str(),
                    to: family.as_str(),
                })
            }
            None => {
                return Err(Error::UnsupportedRekey {
                    from: "unencrypted",
                    to: family.as_str(),
                })
            }
        };
        let directive = params.rekey_directive(new_key);
        if let Err(err) = handle.connection().execute_batch_zeroized(directive.sql()) {
            if err.is_busy() {
                log::warn!(
                    "rekey of {} blocked by another connection",
                    handle.path().display()
                );
            }
            return Err(Error::RekeyFailed(err));
        }
        let read_back = handle.probe();
        Self::finish_rekey(handle, family, new_key, read_back)
    }

    /// Records `new_key` on a handle whose rekey the engine accepted, then
    /// reports the outcome of reading the database back.
    fn finish_rekey(
        handle: &mut EngineHandle,
        family: CipherFamily,
        new_key: &CipherKey,
        read_back: DbResult<()>,
    ) -> Result<()> {
        handle.set_fingerprint(new_key.fingerprint());
        if let Err(err) = read_back {
            log::error!(
                "rekeyed {} ({family}) but it could not be read back: {err}",
                handle.path().display()
            );
            return Err(Error::Engine(err));
        }
        log::info!("rekeyed {} ({family})", handle.path().display());
        Ok(())
    }
}

/// Marks `handle` as authenticated with the key in `config`.
fn authenticated(handle: &mut EngineHandle, config: &ConnectionConfig) {
    if let Some(fingerprint) = config.key_fingerprint() {
        handle.set_fingerprint(fingerprint);
    }
}

fn require_key(config: &ConnectionConfig) -> Result<CipherFamily> {
    config
        .cipher_family()
        .ok_or_else(|| Error::invalid("key", "a cipher key is required"))
}

/// Maps "not a database" engine failures to [`Error::AuthenticationFailed`].
fn authentication(err: Error) -> Error {
    match err {
        Error::Directive { source, .. } | Error::Engine(source)
            if source.is_not_a_database() =>
        {
            Error::AuthenticationFailed { cause: source }
        }
        other => other,
    }
}


#[cfg(test)]
mod tests {
    use sqlmc_db::DbError;

    use super::*;
    use crate::cipher::CipherParams;

    #[test]
    fn test_failed_read_back_still_records_new_key() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("vault.sqlite");
        let config = ConnectionConfig::builder()
            .cipher(CipherParams::chacha20())
            .with_key("old key")
            .expect("key")
            .build();
        let mut handle = KeyManager::default()
            .create_encrypted(&path, &config, |tx| tx.execute_batch("CREATE TABLE t (x);"))
            .expect("create");
        let new_key = CipherKey::new("new key").expect("key");

        let busy = DbError::new(5, "database is locked");
        let err = KeyManager::finish_rekey(&mut handle, CipherFamily::ChaCha20, &new_key, Err(busy))
            .expect_err("read-back failure is reported");

        assert!(matches!(err, Error::Engine(ref source) if source.is_busy()), "{err:?}");
        assert_eq!(
            handle.key_state(),
            KeyState::Keyed {
                family: CipherFamily::ChaCha20,
                fingerprint: new_key.fingerprint(),
            }
        );
    }
}
