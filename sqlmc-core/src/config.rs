//! Immutable connection configuration and its builder.
//!
//! A [`ConnectionConfig`] holds resolved general options plus, optionally,
//! cipher parameters and a key. It renders to the ordered directive list the
//! opener applies, and converts to and from a URI query string (general
//! options only; cipher settings never travel in URIs).

use std::collections::BTreeMap;
use std::time::Duration;

use sqlmc_db::{AccessMode, OpenFlags};

use crate::cipher::{
    CipherFamily, CipherKey, CipherParam, CipherParams, KeyDirective, KeyFingerprint,
};
use crate::error::{Error, Result};
use crate::modes::{CacheMode, OpenMode, OptionKind};
use crate::options::{Directive, OptionName, OptionRegistry, OptionValue, Phase};
use crate::uri::ConnectionUri;

/// URI query keys that would carry cipher settings.
const URI_CIPHER_KEYS: [&str; 7] = [
    "key", "hexkey", "rekey", "hexrekey", "textkey", "password", "cipher",
];

/// Resolved configuration for one connection attempt.
///
/// Built once through [`ConnectionConfig::builder`] or parsed from a URI and
/// never mutated afterwards. `Debug` output redacts the key.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    options: BTreeMap<OptionName, OptionValue>,
    cipher: Option<CipherParams>,
    key: Option<CipherKey>,
}

impl ConnectionConfig {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Parses the query options of a connection URI.
    ///
    /// Unrecognized query keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUri`] for a malformed URI and
    /// [`Error::InvalidValue`] for an invalid value of a recognized option or
    /// for any cipher setting (`key`, `cipher`, cipher parameters).
    pub fn from_uri(uri: &str) -> Result<Self> {
        Self::from_uri_params(&ConnectionUri::parse(uri)?.params)
    }

    /// Builds a configuration from already-decoded URI query parameters.
    ///
    /// # Errors
    ///
    /// See [`from_uri`](Self::from_uri).
    pub fn from_uri_params(params: &[(String, String)]) -> Result<Self> {
        let mut options = BTreeMap::new();
        for (key, value) in params {
            if URI_CIPHER_KEYS.contains(&key.as_str()) || key.parse::<CipherParam>().is_ok() {
                return Err(Error::invalid(
                    key.as_str(),
                    "cipher settings are not accepted in connection URIs",
                ));
            }
            let Ok(name) = key.parse::<OptionName>() else {
                log::debug!("ignoring unrecognized URI parameter {key}");
                continue;
            };
            options.insert(name, OptionRegistry::spec(name).parse(value)?);
        }
        Ok(Self {
            options,
            cipher: None,
            key: None,
        })
    }

    /// Returns a configuration where options set in `self` take precedence
    /// over those in `base`, and options only in `base` fill the gaps.
    #[must_use]
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut options = base.options.clone();
        options.extend(self.options.iter().map(|(name, value)| (*name, *value)));
        Self {
            options,
            cipher: self.cipher.clone().or_else(|| base.cipher.clone()),
            key: self.key.clone().or_else(|| base.key.clone()),
        }
    }

    /// Explicitly configured value of `name`.
    #[must_use]
    pub fn get(&self, name: OptionName) -> Option<OptionValue> {
        self.options.get(&name).copied()
    }

    /// Explicitly configured options, in registration order.
    pub fn options(&self) -> impl Iterator<Item = (OptionName, OptionValue)> + '_ {
        self.options.iter().map(|(name, value)| (*name, *value))
    }

    /// Whether a cipher key is configured.
    #[must_use]
    pub const fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Cipher family used when keying. `None` when no key is configured.
    #[must_use]
    pub fn cipher_family(&self) -> Option<CipherFamily> {
        self.cipher_params().map(|params| params.family())
    }

    /// Cipher parameters used when keying. `None` when no key is configured;
    /// a key without explicit parameters uses [`CipherFamily::Default`].
    #[must_use]
    pub fn cipher_params(&self) -> Option<CipherParams> {
        self.key.as_ref().map(|_| {
            self.cipher
                .clone()
                .unwrap_or_else(|| CipherParams::new(CipherFamily::Default))
        })
    }

    pub(crate) fn key_directive(&self) -> Option<KeyDirective> {
        let key = self.key.as_ref()?;
        self.cipher_params().map(|params| params.key_directive(key))
    }

    pub(crate) fn key_fingerprint(&self) -> Option<KeyFingerprint> {
        self.key.as_ref().map(CipherKey::fingerprint)
    }

    /// Directives applied after the key, general options first, then
    /// page-layout options, each group in registration order.
    ///
    /// Options consumed as open flags are not included.
    #[must_use]
    pub fn directives(&self) -> Vec<Directive> {
        let mut directives: Vec<_> = self
            .options()
            .map(|(name, value)| Directive { name, value })
            .filter(|directive| directive.phase() != Phase::OpenFlag)
            .collect();
        directives.sort_by_key(|directive| (directive.phase(), directive.name));
        directives
    }

    /// Engine open flags derived from the `mode` and `cache` options.
    #[must_use]
    pub fn open_flags(&self) -> OpenFlags {
        let access = match self.get(OptionName::Mode) {
            Some(OptionValue::Keyword("ro")) => AccessMode::ReadOnly,
            Some(OptionValue::Keyword("rw")) => AccessMode::ReadWrite,
            _ => AccessMode::ReadWriteCreate,
        };
        OpenFlags {
            access,
            shared_cache: self.get(OptionName::Cache) == Some(CacheMode::Shared.value()),
        }
    }

    /// Serializes the general options as a URI query string (without `?`).
    ///
    /// Cipher parameters and the key are never included. Canonical tokens
    /// need no percent-encoding.
    #[must_use]
    pub fn to_uri_query(&self) -> String {
        self.options()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Builder for [`ConnectionConfig`].
///
/// Values are validated as they are set; [`build`](Self::build) cannot fail.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    options: BTreeMap<OptionName, OptionValue>,
    cipher: Option<CipherParams>,
    key: Option<CipherKey>,
}

impl ConnectionConfigBuilder {
    /// Sets an option, cipher family or cipher parameter by name.
    ///
    /// `cipher` selects a family (with its default parameters) and `key`
    /// sets the key; every other name is a general option or a parameter of
    /// the selected cipher family.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] for an unregistered name,
    /// [`Error::InvalidValue`] for a value outside the domain and
    /// [`Error::MissingCipherFamily`] for a cipher parameter set before any
    /// family.
    pub fn with(self, name: &str, value: &str) -> Result<Self> {
        match name {
            "cipher" => {
                let family = value.trim().parse::<CipherFamily>().map_err(|_| {
                    Error::invalid("cipher", format!("unknown cipher family {value:?}"))
                })?;
                Ok(self.cipher_family(family))
            }
            "key" => self.with_key(value),
            _ if name.parse::<CipherParam>().is_ok() => self.with_cipher_param(name, value),
            _ => {
                let directive = OptionRegistry::resolve(name, value)?;
                Ok(self.set(directive.name, directive.value))
            }
        }
    }

    fn with_cipher_param(mut self, name: &str, value: &str) -> Result<Self> {
        let params = self
            .cipher
            .as_mut()
            .ok_or_else(|| Error::MissingCipherFamily(name.to_owned()))?;
        params.set_raw(name, value)?;
        Ok(self)
    }

    fn set(mut self, name: OptionName, value: OptionValue) -> Self {
        self.options.insert(name, value);
        self
    }

    /// Sets a typed option value.
    #[must_use]
    pub fn option<K: OptionKind>(self, value: K) -> Self {
        self.set(K::NAME, value.value())
    }

    /// Sets the access mode.
    #[must_use]
    pub fn open_mode(self, mode: OpenMode) -> Self {
        self.option(mode)
    }

    /// Sets the cache mode.
    #[must_use]
    pub fn cache_mode(self, mode: CacheMode) -> Self {
        self.option(mode)
    }

    /// Sets the busy timeout, saturating at `i32::MAX` milliseconds.
    #[must_use]
    pub fn busy_timeout(self, timeout: Duration) -> Self {
        let millis = i64::try_from(timeout.as_millis())
            .unwrap_or(i64::MAX)
            .min(i64::from(i32::MAX));
        self.set(OptionName::BusyTimeout, OptionValue::Integer(millis))
    }

    /// Sets the page cache size (negative = KiB, positive = pages).
    #[must_use]
    pub fn cache_size(self, size: i32) -> Self {
        self.set(OptionName::CacheSize, OptionValue::Integer(i64::from(size)))
    }

    /// Sets the page size of a new database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] unless `bytes` is a power of two
    /// between 512 and 65536.
    pub fn page_size(self, bytes: u32) -> Result<Self> {
        let value = OptionRegistry::spec(OptionName::PageSize).parse(&bytes.to_string())?;
        Ok(self.set(OptionName::PageSize, value))
    }

    /// Enables or disables foreign key enforcement.
    #[must_use]
    pub fn foreign_keys(self, enabled: bool) -> Self {
        self.set(OptionName::ForeignKeys, OptionValue::Boolean(enabled))
    }

    /// Enables or disables secure delete.
    #[must_use]
    pub fn secure_delete(self, enabled: bool) -> Self {
        self.set(OptionName::SecureDelete, OptionValue::Boolean(enabled))
    }

    /// Selects a cipher family with its default parameters.
    ///
    /// Keeps already-set parameters when the family does not change.
    #[must_use]
    pub fn cipher_family(mut self, family: CipherFamily) -> Self {
        if self.cipher.as_ref().map(CipherParams::family) != Some(family) {
            self.cipher = Some(CipherParams::new(family));
        }
        self
    }

    /// Selects a cipher family with explicit parameters.
    #[must_use]
    pub fn cipher(mut self, params: CipherParams) -> Self {
        self.cipher = Some(params);
        self
    }

    /// Sets the cipher key from a raw passphrase.
    ///
    /// Without a selected family the key uses [`CipherFamily::Default`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for an empty key or one containing NUL.
    pub fn with_key(self, secret: impl Into<String>) -> Result<Self> {
        Ok(self.with_cipher_key(CipherKey::new(secret)?))
    }

    /// Sets an already validated cipher key.
    #[must_use]
    pub fn with_cipher_key(mut self, key: CipherKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> ConnectionConfig {
        if self.key.is_none() {
            if let Some(params) = &self.cipher {
                log::debug!("cipher {} selected without a key; ignored", params.family());
            }
        }
        ConnectionConfig {
            options: self.options,
            cipher: self.cipher,
            key: self.key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{AutoVacuum, Encoding, JournalMode, Synchronous};

    #[test]
    fn test_builder_validates_eagerly() {
        let err = ConnectionConfig::builder()
            .with("journal_mode", "sideways")
            .expect_err("invalid");
        assert!(matches!(err, Error::InvalidValue { .. }));

        let err = ConnectionConfig::builder()
            .with("kdf_iter", "1000")
            .expect_err("no family");
        assert!(matches!(err, Error::MissingCipherFamily(name) if name == "kdf_iter"));

        let err = ConnectionConfig::builder()
            .with("journal_size", "1")
            .expect_err("unknown");
        assert!(matches!(err, Error::UnknownOption(_)));
    }

    #[test]
    fn test_key_without_family_uses_default() {
        let config = ConnectionConfig::builder()
            .with_key("Key1")
            .expect("key")
            .build();
        assert_eq!(config.cipher_family(), Some(CipherFamily::Default));
        assert!(config.has_key());
    }

    #[test]
    fn test_family_without_key_is_not_a_cipher() {
        let config = ConnectionConfig::builder()
            .cipher_family(CipherFamily::Rc4)
            .build();
        assert_eq!(config.cipher_family(), None);
        assert!(config.key_directive().is_none());
    }

    #[test]
    fn test_cipher_params_by_name() {
        let config = ConnectionConfig::builder()
            .with("cipher", "SQLCipher")
            .and_then(|b| b.with("legacy", "3"))
            .and_then(|b| b.with("kdf_iter", "64000"))
            .and_then(|b| b.with_key("Key1"))
            .expect("config")
            .build();
        let params = config.cipher_params().expect("cipher");
        assert_eq!(params.family(), CipherFamily::SqlCipher);
        assert_eq!(params.get(CipherParam::Legacy), Some(3));
        assert_eq!(params.get(CipherParam::KdfIter), Some(64000));

        let err = ConnectionConfig::builder()
            .with("cipher", "rc4")
            .and_then(|b| b.with("kdf_iter", "5"))
            .expect_err("rc4 has no kdf_iter");
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn test_directive_order() {
        let config = ConnectionConfig::builder()
            .option(JournalMode::Wal)
            .option(Encoding::Utf16Le)
            .option(Synchronous::Normal)
            .option(AutoVacuum::Incremental)
            .option(CacheMode::Shared)
            .busy_timeout(Duration::from_secs(2))
            .page_size(65536)
            .expect("page size")
            .build();
        let sql: Vec<_> = config.directives().iter().filter_map(Directive::sql).collect();
        assert_eq!(
            sql,
            [
                "PRAGMA busy_timeout = 2000;",
                "PRAGMA synchronous = 1;",
                "PRAGMA page_size = 65536;",
                "PRAGMA auto_vacuum = 2;",
                "PRAGMA encoding = 'UTF-16le';",
                "PRAGMA journal_mode = wal;",
            ]
        );
        assert!(config.open_flags().shared_cache);
    }

    #[test]
    fn test_uri_rejects_cipher_settings() {
        for uri in ["x.db?key=secret", "x.db?cipher=rc4", "x.db?kdf_iter=4000"] {
            let err = ConnectionConfig::from_uri(uri).expect_err(uri);
            assert!(matches!(err, Error::InvalidValue { .. }), "{uri}: {err}");
            assert!(!err.to_string().contains("secret"));
        }
    }

    #[test]
    fn test_uri_ignores_unknown_keys() {
        let config = ConnectionConfig::from_uri("x.db?vfs=unix&synchronous=full").expect("parse");
        assert_eq!(
            config.options().collect::<Vec<_>>(),
            [(OptionName::Synchronous, OptionValue::Keyword("2"))]
        );
    }

    #[test]
    fn test_uri_query_round_trip() {
        let original = ConnectionConfig::from_uri(
            "file:x.db?mode=rw&cache=shared&busy_timeout=1800000&auto_vacuum=INCREMENTAL\
             &journal_mode=TRUNCATE&synchronous=full&cache_size=-65536&encoding=utf-16le\
             &foreign_keys=on&temp_store=memory&locking_mode=EXCLUSIVE",
        )
        .expect("parse");
        let query = original.to_uri_query();
        assert_eq!(
            query,
            "mode=rw&cache=shared&busy_timeout=1800000&foreign_keys=1&locking_mode=exclusive\
             &temp_store=2&synchronous=2&cache_size=-65536&auto_vacuum=2&encoding=UTF-16le\
             &journal_mode=truncate"
        );
        let reparsed = ConnectionConfig::from_uri(&format!("x.db?{query}")).expect("reparse");
        assert_eq!(
            reparsed.options().collect::<Vec<_>>(),
            original.options().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_explicit_config_wins_over_uri() {
        let from_uri =
            ConnectionConfig::from_uri("x.db?journal_mode=truncate&busy_timeout=100").expect("uri");
        let explicit = ConnectionConfig::builder()
            .option(JournalMode::Wal)
            .with_key("Key1")
            .expect("key")
            .build();
        let merged = explicit.merged_over(&from_uri);
        assert_eq!(merged.get(OptionName::JournalMode), Some(OptionValue::Keyword("wal")));
        assert_eq!(merged.get(OptionName::BusyTimeout), Some(OptionValue::Integer(100)));
        assert!(merged.has_key());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ConnectionConfig::builder()
            .cipher_family(CipherFamily::ChaCha20)
            .with_key("Key1&az=uies%63")
            .expect("key")
            .build();
        let debug = format!("{config:?}");
        assert!(!debug.contains("Key1"), "{debug}");
        assert!(!debug.contains("uies"), "{debug}");
    }
}
