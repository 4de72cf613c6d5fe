//! Opening configured engine handles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlmc_db::{AccessMode, Connection, DbError, DbResult, OpenFlags};

use crate::cipher::{CipherFamily, CipherParams, KeyFingerprint};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::keys::KeyState;
use crate::modes::{CacheMode, OpenMode};
use crate::options::{OptionName, OptionRegistry};

const PROBE_SQL: &str = "SELECT count(*) FROM sqlite_master;";

/// Opens engine handles and applies a [`ConnectionConfig`] to them.
///
/// Directives are applied in a fixed order: the key directive (cipher
/// parameters followed by `PRAGMA key`), then general options in
/// registration order, then page-layout options. The access mode and cache
/// mode are passed to the engine as open flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionOpener {
    validate_on_open: bool,
}

impl ConnectionOpener {
    /// An opener that defers failures to the first real statement.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            validate_on_open: false,
        }
    }

    /// Whether to run a readability probe before returning the handle.
    #[must_use]
    pub const fn validate_on_open(mut self, enabled: bool) -> Self {
        self.validate_on_open = enabled;
        self
    }

    /// Opens (creating if allowed by `mode`) the database at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::EngineOpen`] if the engine cannot open the file.
    /// - [`Error::Directive`] if the engine rejects a directive. For the key
    ///   directive the engine message is withheld.
    /// - [`Error::Engine`] if eager validation is enabled and the database
    ///   cannot be read.
    pub fn open(&self, path: impl AsRef<Path>, config: &ConnectionConfig) -> Result<EngineHandle> {
        let path = path.as_ref();
        let flags = config.open_flags();
        let conn = Connection::open_with_flags(path, flags).map_err(Error::EngineOpen)?;

        if let Some(directive) = config.key_directive() {
            conn.execute_batch_zeroized(directive.sql())
                .map_err(|err| Error::Directive {
                    name: "key".to_owned(),
                    source: DbError::new(err.code.0, "engine rejected the key directive"),
                })?;
        }

        let directives = config.directives();
        for directive in &directives {
            if let Some(sql) = directive.sql() {
                conn.execute_batch(&sql).map_err(|source| Error::Directive {
                    name: directive.name.to_string(),
                    source,
                })?;
            }
        }

        let cipher = config.cipher_params();
        log::debug!(
            "opened {} ({} directives, cipher: {})",
            path.display(),
            directives.len(),
            cipher.as_ref().map_or("none", |params| params.family().as_str()),
        );

        let mut handle = EngineHandle {
            conn,
            path: path.to_path_buf(),
            flags,
            cipher,
            fingerprint: None,
        };
        if self.validate_on_open {
            handle.probe()?;
            if let Some(fingerprint) = config.key_fingerprint() {
                handle.set_fingerprint(fingerprint);
            }
        }
        Ok(handle)
    }
}

/// An open, configured database connection.
///
/// Exclusively owned by the caller that opened it. Dropping the handle closes
/// the connection; [`close`](Self::close) reports close errors.
pub struct EngineHandle {
    conn: Connection,
    path: PathBuf,
    flags: OpenFlags,
    cipher: Option<CipherParams>,
    fingerprint: Option<KeyFingerprint>,
}

impl EngineHandle {
    /// The underlying connection, for running statements.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Path the handle was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cipher family the handle was keyed with, if any.
    #[must_use]
    pub fn cipher_family(&self) -> Option<CipherFamily> {
        self.cipher.as_ref().map(CipherParams::family)
    }

    pub(crate) const fn cipher_params(&self) -> Option<&CipherParams> {
        self.cipher.as_ref()
    }

    /// Key state of the handle.
    ///
    /// A keyed handle reports [`KeyState::Keyed`] only once the key has been
    /// shown to read the database: by eager validation, by
    /// [`KeyManager`](crate::KeyManager) opening or creating it, or by a
    /// rekey.
    #[must_use]
    pub fn key_state(&self) -> KeyState {
        match (self.cipher_family(), self.fingerprint) {
            (Some(family), Some(fingerprint)) => KeyState::Keyed {
                family,
                fingerprint,
            },
            _ => KeyState::Unkeyed,
        }
    }

    pub(crate) const fn set_fingerprint(&mut self, fingerprint: KeyFingerprint) {
        self.fingerprint = Some(fingerprint);
    }

    /// Reads a known-always-present system catalog.
    pub(crate) fn probe(&self) -> DbResult<()> {
        self.conn.query_row(PROBE_SQL, &[], |stmt| Ok(stmt.column_i64(0)))?;
        Ok(())
    }

    /// Currently effective value of `name`, as the engine reports it.
    ///
    /// `mode` and `cache` are answered from the open flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the engine cannot answer, e.g. when the
    /// handle cannot decrypt the database.
    pub fn effective_value(&self, name: OptionName) -> Result<String> {
        match name {
            OptionName::Mode => {
                let mode = match self.flags.access {
                    AccessMode::ReadOnly => OpenMode::ReadOnly,
                    AccessMode::ReadWrite => OpenMode::ReadWrite,
                    AccessMode::ReadWriteCreate => OpenMode::ReadWriteCreate,
                };
                Ok(mode.token().to_owned())
            }
            OptionName::Cache => {
                let mode = if self.flags.shared_cache {
                    CacheMode::Shared
                } else {
                    CacheMode::Private
                };
                Ok(mode.token().to_owned())
            }
            _ => Ok(self.conn.pragma_value(name.as_str())?),
        }
    }

    /// Every option's effective value.
    ///
    /// # Errors
    ///
    /// See [`effective_value`](Self::effective_value).
    pub fn effective_settings(&self) -> Result<EffectiveSettings> {
        let options: BTreeMap<_, _> = OptionRegistry::all_options()
            .iter()
            .map(|spec| Ok((spec.name, self.effective_value(spec.name)?)))
            .collect::<Result<_>>()?;
        Ok(EffectiveSettings {
            path: self.path.display().to_string(),
            cipher: self.cipher_family(),
            options,
        })
    }

    /// Closes the handle, reporting any engine error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the engine reports a close failure.
    pub fn close(self) -> Result<()> {
        self.conn.close()?;
        Ok(())
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("key_state", &self.key_state())
            .finish_non_exhaustive()
    }
}

/// Snapshot of a handle's effective settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveSettings {
    /// Path of the database.
    pub path: String,
    /// Cipher family, when keyed.
    pub cipher: Option<CipherFamily>,
    /// Effective value of every registered option.
    pub options: BTreeMap<OptionName, String>,
}
