//! Cipher families, their parameter schemas and key directive rendering.
//!
//! A database is encrypted with one [`CipherFamily`]. Each family has a
//! fixed table of parameters ([`CipherProfile`]); a [`CipherParams`] value
//! holds one concrete parameterization and renders, together with a
//! [`CipherKey`], the [`KeyDirective`] that keys a connection.
//!
//! Rendered key directives hold the raw key and live in zeroizing buffers.
//! Their `Debug` output is redacted.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::{Digest, Sha256};
use strum::{EnumString, IntoStaticStr};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// A cipher scheme supported by the engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    EnumString,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CipherFamily {
    /// The engine's compiled default scheme. No cipher is selected explicitly.
    #[default]
    Default,
    /// ChaCha20-Poly1305 (sqlite3mc default).
    ChaCha20,
    /// AES-128 in CBC mode (wxSQLite3 compatible).
    Aes128Cbc,
    /// AES-256 in CBC mode (wxSQLite3 compatible).
    Aes256Cbc,
    /// `SQLCipher` compatible AES-256 with HMAC.
    SqlCipher,
    /// RC4 (System.Data.SQLite compatible).
    Rc4,
}

impl CipherFamily {
    /// Every family, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Default,
        Self::ChaCha20,
        Self::Aes128Cbc,
        Self::Aes256Cbc,
        Self::SqlCipher,
        Self::Rc4,
    ];

    /// Identifier passed to `PRAGMA cipher`, or `None` for [`CipherFamily::Default`].
    #[must_use]
    pub const fn engine_id(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::ChaCha20 => Some("chacha20"),
            Self::Aes128Cbc => Some("aes128cbc"),
            Self::Aes256Cbc => Some("aes256cbc"),
            Self::SqlCipher => Some("sqlcipher"),
            Self::Rc4 => Some("rc4"),
        }
    }

    /// Lowercase family name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for CipherFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cipher parameter, named after its engine pragma.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CipherParam {
    /// Key derivation iterations.
    KdfIter,
    /// Key derivation iterations for the HMAC key.
    FastKdfIter,
    /// Whether pages carry an HMAC.
    HmacUse,
    /// Page number encoding in the HMAC (native, little or big endian).
    HmacPgno,
    /// Salt mask for HMAC key derivation.
    HmacSaltMask,
    /// Legacy format version (0 = current).
    Legacy,
    /// Page size of a legacy database (0 = engine default).
    LegacyPageSize,
    /// Key derivation hash (0 = SHA1, 1 = SHA256, 2 = SHA512).
    KdfAlgorithm,
    /// HMAC hash (0 = SHA1, 1 = SHA256, 2 = SHA512).
    HmacAlgorithm,
    /// Bytes of the database header stored unencrypted.
    PlaintextHeaderSize,
}

impl CipherParam {
    /// Pragma name of the parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for CipherParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of one parameter within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// The parameter.
    pub param: CipherParam,
    /// Default value. Parameters without a default are optional and only
    /// rendered when set.
    pub default: Option<i64>,
    /// Smallest accepted value.
    pub min: i64,
    /// Largest accepted value.
    pub max: i64,
}

impl ParamSpec {
    const fn required(param: CipherParam, default: i64, min: i64, max: i64) -> Self {
        Self {
            param,
            default: Some(default),
            min,
            max,
        }
    }

    const fn optional(param: CipherParam, min: i64, max: i64) -> Self {
        Self {
            param,
            default: None,
            min,
            max,
        }
    }

    /// Whether the parameter is always rendered.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_some()
    }

    fn validate(&self, value: i64) -> Result<()> {
        if value < self.min || value > self.max {
            return Err(Error::invalid(
                self.param.as_str(),
                format!("{value} is outside {}..={}", self.min, self.max),
            ));
        }
        if self.param == CipherParam::LegacyPageSize
            && value != 0
            && (value < 512 || value.count_ones() != 1)
        {
            return Err(Error::invalid(
                self.param.as_str(),
                format!("expected 0 or a power of two from 512, got {value}"),
            ));
        }
        Ok(())
    }
}

// ── Family tables ───────────────────────────────────────────────────────────

const ITER_MAX: i64 = 2_147_483_647;

use CipherParam::{
    FastKdfIter, HmacAlgorithm, HmacPgno, HmacSaltMask, HmacUse, KdfAlgorithm, KdfIter, Legacy,
    LegacyPageSize, PlaintextHeaderSize,
};

static CHACHA20: [ParamSpec; 3] = [
    ParamSpec::required(KdfIter, 64007, 1, ITER_MAX),
    ParamSpec::required(Legacy, 0, 0, 1),
    ParamSpec::required(LegacyPageSize, 4096, 0, 65536),
];

static AES128CBC: [ParamSpec; 2] = [
    ParamSpec::required(Legacy, 0, 0, 1),
    ParamSpec::required(LegacyPageSize, 0, 0, 65536),
];

static AES256CBC: [ParamSpec; 3] = [
    ParamSpec::required(KdfIter, 4001, 1, ITER_MAX),
    ParamSpec::required(Legacy, 0, 0, 1),
    ParamSpec::required(LegacyPageSize, 0, 0, 65536),
];

static SQLCIPHER: [ParamSpec; 10] = [
    ParamSpec::required(KdfIter, 256_000, 1, ITER_MAX),
    ParamSpec::required(FastKdfIter, 2, 1, ITER_MAX),
    ParamSpec::required(HmacUse, 1, 0, 1),
    ParamSpec::required(HmacPgno, 1, 0, 2),
    ParamSpec::required(HmacSaltMask, 0x3a, 0, 255),
    ParamSpec::required(Legacy, 0, 0, 4),
    ParamSpec::required(LegacyPageSize, 4096, 0, 65536),
    ParamSpec::required(KdfAlgorithm, 2, 0, 2),
    ParamSpec::required(HmacAlgorithm, 2, 0, 2),
    ParamSpec::optional(PlaintextHeaderSize, 0, 100),
];

static RC4: [ParamSpec; 2] = [
    ParamSpec::required(Legacy, 1, 1, 1),
    ParamSpec::required(LegacyPageSize, 0, 0, 65536),
];

static PROFILES: [CipherProfile; 6] = [
    CipherProfile {
        family: CipherFamily::Default,
        params: &[],
    },
    CipherProfile {
        family: CipherFamily::ChaCha20,
        params: &CHACHA20,
    },
    CipherProfile {
        family: CipherFamily::Aes128Cbc,
        params: &AES128CBC,
    },
    CipherProfile {
        family: CipherFamily::Aes256Cbc,
        params: &AES256CBC,
    },
    CipherProfile {
        family: CipherFamily::SqlCipher,
        params: &SQLCIPHER,
    },
    CipherProfile {
        family: CipherFamily::Rc4,
        params: &RC4,
    },
];

/// Parameter schema of one cipher family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherProfile {
    family: CipherFamily,
    params: &'static [ParamSpec],
}

impl CipherProfile {
    /// Returns the profile of `family`.
    #[must_use]
    pub fn for_family(family: CipherFamily) -> &'static Self {
        // `PROFILES` is declared in `CipherFamily` order.
        &PROFILES[family as usize]
    }

    /// The family this profile describes.
    #[must_use]
    pub const fn family(&self) -> CipherFamily {
        self.family
    }

    /// Parameters always rendered, with their defaults.
    pub fn required_params(&self) -> impl Iterator<Item = &'static ParamSpec> {
        self.params.iter().filter(|spec| spec.is_required())
    }

    /// Parameters rendered only when set explicitly.
    pub fn optional_params(&self) -> impl Iterator<Item = &'static ParamSpec> {
        self.params.iter().filter(|spec| !spec.is_required())
    }

    /// Looks up a parameter of this family.
    #[must_use]
    pub fn param(&self, param: CipherParam) -> Option<&'static ParamSpec> {
        self.params.iter().find(|spec| spec.param == param)
    }

    /// The family's default parameterization.
    #[must_use]
    pub fn default_params(&self) -> CipherParams {
        CipherParams {
            family: self.family,
            values: self
                .params
                .iter()
                .filter_map(|spec| spec.default.map(|value| (spec.param, value)))
                .collect(),
        }
    }

    /// Renders the key directive for `key` with the default parameters.
    #[must_use]
    pub fn key_directive(&self, key: &CipherKey) -> KeyDirective {
        self.default_params().key_directive(key)
    }
}

// ── Parameters ──────────────────────────────────────────────────────────────

/// A concrete parameterization of one cipher family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherParams {
    family: CipherFamily,
    values: BTreeMap<CipherParam, i64>,
}

impl CipherParams {
    /// Default parameters of `family`.
    #[must_use]
    pub fn new(family: CipherFamily) -> Self {
        CipherProfile::for_family(family).default_params()
    }

    /// Default ChaCha20 parameters.
    #[must_use]
    pub fn chacha20() -> Self {
        Self::new(CipherFamily::ChaCha20)
    }

    /// Default AES-128-CBC parameters.
    #[must_use]
    pub fn aes128cbc() -> Self {
        Self::new(CipherFamily::Aes128Cbc)
    }

    /// Default AES-256-CBC parameters.
    #[must_use]
    pub fn aes256cbc() -> Self {
        Self::new(CipherFamily::Aes256Cbc)
    }

    /// Default `SQLCipher` parameters (current `SQLCipher` 4 layout).
    #[must_use]
    pub fn sqlcipher() -> Self {
        Self::new(CipherFamily::SqlCipher)
    }

    /// Default RC4 parameters.
    #[must_use]
    pub fn rc4() -> Self {
        Self::new(CipherFamily::Rc4)
    }

    /// `SQLCipher` version 1 compatible parameters.
    #[must_use]
    pub fn sqlcipher_v1() -> Self {
        Self::sqlcipher_legacy(1, 4000, 0, 1024, 0)
    }

    /// `SQLCipher` version 2 compatible parameters.
    #[must_use]
    pub fn sqlcipher_v2() -> Self {
        Self::sqlcipher_legacy(2, 4000, 1, 1024, 0)
    }

    /// `SQLCipher` version 3 compatible parameters.
    #[must_use]
    pub fn sqlcipher_v3() -> Self {
        Self::sqlcipher_legacy(3, 64000, 1, 1024, 0)
    }

    /// `SQLCipher` version 4 compatible parameters.
    #[must_use]
    pub fn sqlcipher_v4() -> Self {
        Self::sqlcipher_legacy(4, 256_000, 1, 4096, 2)
    }

    /// sqleet compatible ChaCha20 parameters.
    #[must_use]
    pub fn chacha20_sqleet() -> Self {
        let mut params = Self::chacha20();
        params.values.insert(KdfIter, 12345);
        params.values.insert(Legacy, 1);
        params.values.insert(LegacyPageSize, 4096);
        params
    }

    fn sqlcipher_legacy(
        legacy: i64,
        kdf_iter: i64,
        hmac_use: i64,
        page_size: i64,
        hash: i64,
    ) -> Self {
        let mut params = Self::sqlcipher();
        params.values.insert(KdfIter, kdf_iter);
        params.values.insert(HmacUse, hmac_use);
        params.values.insert(Legacy, legacy);
        params.values.insert(LegacyPageSize, page_size);
        params.values.insert(KdfAlgorithm, hash);
        params.values.insert(HmacAlgorithm, hash);
        params
    }

    /// The family these parameters belong to.
    #[must_use]
    pub const fn family(&self) -> CipherFamily {
        self.family
    }

    /// Current value of `param`, if it is set or has a default.
    #[must_use]
    pub fn get(&self, param: CipherParam) -> Option<i64> {
        self.values.get(&param).copied()
    }

    /// Rendered parameters, in pragma order.
    pub fn iter(&self) -> impl Iterator<Item = (CipherParam, i64)> + '_ {
        self.values.iter().map(|(param, value)| (*param, *value))
    }

    /// Sets `param` to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if `param` does not belong to this
    /// family or `value` is out of range.
    pub fn set(&mut self, param: CipherParam, value: i64) -> Result<&mut Self> {
        let spec = CipherProfile::for_family(self.family)
            .param(param)
            .ok_or_else(|| {
                Error::invalid(
                    param.as_str(),
                    format!("not a parameter of the {} cipher", self.family),
                )
            })?;
        spec.validate(value)?;
        self.values.insert(param, value);
        Ok(self)
    }

    /// Builder form of [`set`](Self::set).
    ///
    /// # Errors
    ///
    /// See [`set`](Self::set).
    pub fn with(mut self, param: CipherParam, value: i64) -> Result<Self> {
        self.set(param, value)?;
        Ok(self)
    }

    /// Sets a parameter from its textual name and value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for an unknown parameter name, a
    /// non-integer value, or any error of [`set`](Self::set).
    pub fn set_raw(&mut self, name: &str, raw: &str) -> Result<&mut Self> {
        let param = name
            .parse::<CipherParam>()
            .map_err(|_| Error::invalid(name, "unknown cipher parameter"))?;
        let raw = raw.trim();
        let value = if let Some(hex) = raw.strip_prefix("0x") {
            i64::from_str_radix(hex, 16)
        } else {
            raw.parse::<i64>()
        }
        .map_err(|_| Error::invalid(name, format!("expected an integer, got {raw:?}")))?;
        self.set(param, value)
    }

    /// Renders the directive that keys a freshly opened connection.
    #[must_use]
    pub fn key_directive(&self, key: &CipherKey) -> KeyDirective {
        self.render("key", key)
    }

    /// Renders the directive that re-encrypts an open database under `key`.
    #[must_use]
    pub fn rekey_directive(&self, key: &CipherKey) -> KeyDirective {
        self.render("rekey", key)
    }

    fn render(&self, pragma: &'static str, key: &CipherKey) -> KeyDirective {
        let secret = key.expose();
        let mut sql = Zeroizing::new(String::with_capacity(
            64 * (self.values.len() + 1) + 2 * secret.len(),
        ));
        // Writing into a `String` cannot fail.
        if let Some(id) = self.family.engine_id() {
            let _ = writeln!(sql, "PRAGMA cipher = '{id}';");
        }
        for (param, value) in &self.values {
            let _ = writeln!(sql, "PRAGMA {param} = {value};");
        }
        sql.push_str("PRAGMA ");
        sql.push_str(pragma);
        sql.push_str(" = '");
        for ch in secret.chars() {
            if ch == '\'' {
                sql.push('\'');
            }
            sql.push(ch);
        }
        sql.push_str("';");
        KeyDirective {
            family: self.family,
            pragma,
            sql,
        }
    }
}

// ── Key material ────────────────────────────────────────────────────────────

/// A raw passphrase used to key a database.
///
/// Held in a [`SecretString`]; `Debug` never shows the value.
pub struct CipherKey(SecretString);

impl CipherKey {
    /// Wraps a passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for an empty key or one containing a NUL
    /// character. The key itself is never included in the error.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = SecretString::from(secret.into());
        let exposed = secret.expose_secret();
        if exposed.is_empty() {
            return Err(Error::invalid("key", "key must not be empty"));
        }
        if exposed.contains('\0') {
            return Err(Error::invalid("key", "key must not contain NUL characters"));
        }
        Ok(Self(secret))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Non-reversible fingerprint used to tell keys apart without holding them.
    #[must_use]
    pub fn fingerprint(&self) -> KeyFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(b"sqlmc-key-fingerprint\0");
        hasher.update(self.expose().as_bytes());
        KeyFingerprint(hasher.finalize().into())
    }
}

impl Clone for CipherKey {
    fn clone(&self) -> Self {
        Self(SecretString::from(self.expose().to_owned()))
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey([REDACTED])")
    }
}

/// SHA-256 fingerprint of a [`CipherKey`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyFingerprint([u8; 32]);

impl KeyFingerprint {
    /// Whether `key` has this fingerprint.
    #[must_use]
    pub fn matches(&self, key: &CipherKey) -> bool {
        *self == key.fingerprint()
    }
}

impl fmt::Debug for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyFingerprint(..)")
    }
}

/// Rendered `PRAGMA key` / `PRAGMA rekey` script, preceded by the family's
/// cipher parameter pragmas.
pub struct KeyDirective {
    family: CipherFamily,
    pragma: &'static str,
    sql: Zeroizing<String>,
}

impl KeyDirective {
    /// Family the directive selects.
    #[must_use]
    pub const fn family(&self) -> CipherFamily {
        self.family
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }
}

impl PartialEq for KeyDirective {
    fn eq(&self, other: &Self) -> bool {
        *self.sql == *other.sql
    }
}

impl Eq for KeyDirective {}

impl fmt::Debug for KeyDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDirective")
            .field("family", &self.family)
            .field("pragma", &self.pragma)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn key(secret: &str) -> CipherKey {
        CipherKey::new(secret).expect("valid key")
    }

    #[test]
    fn test_default_family_renders_bare_key() {
        let directive = CipherProfile::for_family(CipherFamily::Default).key_directive(&key("k"));
        assert_eq!(directive.sql(), "PRAGMA key = 'k';");
    }

    #[test]
    fn test_chacha20_directive_order() {
        let directive = CipherParams::chacha20().key_directive(&key("Key1"));
        assert_eq!(
            directive.sql(),
            "PRAGMA cipher = 'chacha20';\n\
             PRAGMA kdf_iter = 64007;\n\
             PRAGMA legacy = 0;\n\
             PRAGMA legacy_page_size = 4096;\n\
             PRAGMA key = 'Key1';"
        );
    }

    #[test]
    fn test_sqlcipher_defaults() {
        let params = CipherParams::sqlcipher();
        assert_eq!(params.get(KdfIter), Some(256_000));
        assert_eq!(params.get(HmacSaltMask), Some(0x3a));
        assert_eq!(params.get(PlaintextHeaderSize), None);
        let profile = CipherProfile::for_family(CipherFamily::SqlCipher);
        assert_eq!(profile.required_params().count(), 9);
        assert_eq!(
            profile.optional_params().map(|spec| spec.param).collect::<Vec<_>>(),
            [PlaintextHeaderSize]
        );
    }

    #[test_case(CipherParams::sqlcipher_v1(), 1, 4000, 0, 1024)]
    #[test_case(CipherParams::sqlcipher_v2(), 2, 4000, 0, 1024)]
    #[test_case(CipherParams::sqlcipher_v3(), 3, 64000, 0, 1024)]
    #[test_case(CipherParams::sqlcipher_v4(), 4, 256_000, 2, 4096)]
    fn test_sqlcipher_legacy_factories(
        params: CipherParams,
        legacy: i64,
        kdf_iter: i64,
        hash: i64,
        page_size: i64,
    ) {
        assert_eq!(params.get(Legacy), Some(legacy));
        assert_eq!(params.get(KdfIter), Some(kdf_iter));
        assert_eq!(params.get(KdfAlgorithm), Some(hash));
        assert_eq!(params.get(HmacAlgorithm), Some(hash));
        assert_eq!(params.get(LegacyPageSize), Some(page_size));
    }

    #[test]
    fn test_sqleet_factory() {
        let params = CipherParams::chacha20_sqleet();
        assert_eq!(params.family(), CipherFamily::ChaCha20);
        assert_eq!(params.get(KdfIter), Some(12345));
        assert_eq!(params.get(Legacy), Some(1));
    }

    #[test]
    fn test_key_is_quoted_not_trusted() {
        let directive = CipherParams::new(CipherFamily::Default).key_directive(&key("it's&a=b%63"));
        assert_eq!(directive.sql(), "PRAGMA key = 'it''s&a=b%63';");
    }

    #[test]
    fn test_families_never_render_equal_directives() {
        let secret = key("same key");
        let directives: Vec<_> = CipherFamily::ALL
            .iter()
            .map(|family| CipherProfile::for_family(*family).key_directive(&secret))
            .collect();
        for (i, a) in directives.iter().enumerate() {
            for b in &directives[i + 1..] {
                assert_ne!(a, b, "{:?} and {:?} collide", a.family(), b.family());
            }
        }
    }

    #[test]
    fn test_set_validates_membership_and_range() {
        let mut params = CipherParams::aes128cbc();
        let err = params.set(KdfIter, 10).expect_err("aes128 has no kdf_iter");
        assert!(matches!(err, Error::InvalidValue { option, .. } if option == "kdf_iter"));

        let mut params = CipherParams::sqlcipher();
        params.set(Legacy, 4).expect("legacy 4");
        assert!(params.set(Legacy, 5).is_err());
        assert!(params.set(LegacyPageSize, 1000).is_err());
        params.set_raw("hmac_salt_mask", "0x3a").expect("hex value");
        params.set_raw("plaintext_header_size", "32").expect("optional param");
        assert_eq!(params.get(PlaintextHeaderSize), Some(32));
        assert!(CipherParams::rc4().with(Legacy, 0).is_err());
    }

    #[test]
    fn test_keys_are_redacted() {
        let secret = key("hunter2");
        let directive = CipherParams::chacha20().rekey_directive(&secret);
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert!(!format!("{directive:?}").contains("hunter2"));
        assert!(!format!("{:?}", secret.fingerprint()).contains("hunter2"));
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(CipherKey::new("").is_err());
        let err = CipherKey::new("abc\0def").expect_err("nul");
        assert!(!err.to_string().contains("abc"));
    }

    #[test]
    fn test_fingerprint_distinguishes_keys() {
        let a = key("Key1");
        assert!(a.fingerprint().matches(&a.clone()));
        assert!(!a.fingerprint().matches(&key("Key2")));
    }
}
