//! Registry of general connection options and their rendering into
//! engine directives.
//!
//! Every option has a name, a value domain, an informational default and a
//! [`Phase`] that fixes when it is applied while a connection opens. The
//! registry is a static table; resolving a raw value never performs I/O.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum::{EnumString, IntoStaticStr};

use crate::error::{Error, Result};
use crate::modes::{
    AutoVacuum, CacheMode, Encoding, JournalMode, LockingMode, OpenMode, Synchronous,
    TempStore,
};

/// Name of a registered general option.
///
/// Variants are declared in registration order, which is also the order in
/// which directives are applied within a phase.
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
pub enum OptionName {
    /// Access mode used when opening the file (`ro`, `rw`, `rwc`).
    Mode,
    /// Shared or private page cache.
    Cache,
    /// Busy-wait duration in milliseconds.
    BusyTimeout,
    /// Foreign key enforcement.
    ForeignKeys,
    /// Overwrite deleted content with zeros.
    SecureDelete,
    /// Normal or exclusive locking.
    LockingMode,
    /// Where temporary tables and indices live.
    TempStore,
    /// Durability level.
    Synchronous,
    /// Page cache size (negative = KiB, positive = pages).
    CacheSize,
    /// Page size of a new database.
    PageSize,
    /// Auto-vacuum mode of a new database.
    AutoVacuum,
    /// Text encoding of a new database.
    Encoding,
    /// Journal mode.
    JournalMode,
}

impl OptionName {
    /// Returns the option name as written in URIs and pragmas.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When an option takes effect while a connection is being opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Consumed as an engine open flag; never rendered as a directive.
    OpenFlag,
    /// Applied right after the key directive, in registration order.
    General,
    /// Page-layout directive; only effective before the first page is written.
    Deferred,
}

/// Value domain of an option.
#[derive(Debug, Clone, Copy)]
pub enum Domain {
    /// One of a fixed set of tokens, normalized to a canonical rendering.
    Keyword {
        /// Canonical tokens, for error messages.
        tokens: &'static [&'static str],
        /// Maps an accepted spelling to its canonical token.
        parse: fn(&str) -> Option<&'static str>,
        /// Whether the rendered directive quotes the value.
        quoted: bool,
    },
    /// An integer within `min..=max`.
    Integer {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// A power of two within `min..=max`.
    PowerOfTwo {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// `true`/`false`, `on`/`off`, `yes`/`no` or `1`/`0`.
    Boolean,
}

/// A normalized option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionValue {
    /// Canonical keyword token.
    Keyword(&'static str),
    /// Integer value.
    Integer(i64),
    /// Boolean value, rendered as `1`/`0`.
    Boolean(bool),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(token) => f.write_str(token),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Boolean(value) => f.write_str(if *value { "1" } else { "0" }),
        }
    }
}

/// Static description of one registered option.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Option name.
    pub name: OptionName,
    /// Accepted values.
    pub domain: Domain,
    /// Engine default. Informational only; defaults are never emitted.
    pub default: OptionValue,
    /// When the option is applied.
    pub phase: Phase,
    /// One-line description.
    pub summary: &'static str,
}

impl OptionSpec {
    /// Parses `raw` into a normalized value of this option's domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if `raw` is outside the domain.
    pub fn parse(&self, raw: &str) -> Result<OptionValue> {
        let raw = raw.trim();
        let name = self.name.as_str();
        match self.domain {
            Domain::Keyword { tokens, parse, .. } => {
                parse(raw).map(OptionValue::Keyword).ok_or_else(|| {
                    Error::invalid(
                        name,
                        format!("expected one of {}, got {raw:?}", tokens.join(", ")),
                    )
                })
            }
            Domain::Integer { min, max } => {
                let value = parse_integer(name, raw)?;
                if value < min || value > max {
                    return Err(Error::invalid(
                        name,
                        format!("{value} is outside {min}..={max}"),
                    ));
                }
                Ok(OptionValue::Integer(value))
            }
            Domain::PowerOfTwo { min, max } => {
                let value = parse_integer(name, raw)?;
                if value < min || value > max || value.count_ones() != 1 {
                    return Err(Error::invalid(
                        name,
                        format!("expected a power of two in {min}..={max}, got {value}"),
                    ));
                }
                Ok(OptionValue::Integer(value))
            }
            Domain::Boolean => parse_bool(raw)
                .map(OptionValue::Boolean)
                .ok_or_else(|| Error::invalid(name, format!("expected a boolean, got {raw:?}"))),
        }
    }

    const fn quoted(&self) -> bool {
        matches!(self.domain, Domain::Keyword { quoted: true, .. })
    }
}

fn parse_integer(name: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| Error::invalid(name, format!("expected an integer, got {raw:?}")))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn keyword<T>(raw: &str) -> Option<&'static str>
where
    T: FromStr + Keyword,
{
    raw.parse::<T>().ok().map(Keyword::token)
}

/// Typed values that render to a canonical keyword token.
pub(crate) trait Keyword: Copy {
    fn token(self) -> &'static str;
}

// ── Registry table ──────────────────────────────────────────────────────────

const PRAGMA_INT_MIN: i64 = -2_147_483_648;
const PRAGMA_INT_MAX: i64 = 2_147_483_647;

static OPTIONS: [OptionSpec; 13] = [
    OptionSpec {
        name: OptionName::Mode,
        domain: Domain::Keyword {
            tokens: &["ro", "rw", "rwc"],
            parse: keyword::<OpenMode>,
            quoted: false,
        },
        default: OptionValue::Keyword("rwc"),
        phase: Phase::OpenFlag,
        summary: "open the file read-only, read-write, or read-write-create",
    },
    OptionSpec {
        name: OptionName::Cache,
        domain: Domain::Keyword {
            tokens: &["shared", "private"],
            parse: keyword::<CacheMode>,
            quoted: false,
        },
        default: OptionValue::Keyword("private"),
        phase: Phase::OpenFlag,
        summary: "shared-cache or private-cache mode",
    },
    OptionSpec {
        name: OptionName::BusyTimeout,
        domain: Domain::Integer {
            min: 0,
            max: PRAGMA_INT_MAX,
        },
        default: OptionValue::Integer(3000),
        phase: Phase::General,
        summary: "milliseconds to wait on a locked database",
    },
    OptionSpec {
        name: OptionName::ForeignKeys,
        domain: Domain::Boolean,
        default: OptionValue::Boolean(false),
        phase: Phase::General,
        summary: "enforce foreign key constraints",
    },
    OptionSpec {
        name: OptionName::SecureDelete,
        domain: Domain::Boolean,
        default: OptionValue::Boolean(false),
        phase: Phase::General,
        summary: "overwrite deleted content",
    },
    OptionSpec {
        name: OptionName::LockingMode,
        domain: Domain::Keyword {
            tokens: &["normal", "exclusive"],
            parse: keyword::<LockingMode>,
            quoted: false,
        },
        default: OptionValue::Keyword("normal"),
        phase: Phase::General,
        summary: "release or hold file locks between transactions",
    },
    OptionSpec {
        name: OptionName::TempStore,
        domain: Domain::Keyword {
            tokens: &["default", "file", "memory"],
            parse: keyword::<TempStore>,
            quoted: false,
        },
        default: OptionValue::Keyword("0"),
        phase: Phase::General,
        summary: "storage for temporary tables",
    },
    OptionSpec {
        name: OptionName::Synchronous,
        domain: Domain::Keyword {
            tokens: &["off", "normal", "full", "extra"],
            parse: keyword::<Synchronous>,
            quoted: false,
        },
        default: OptionValue::Keyword("2"),
        phase: Phase::General,
        summary: "durability level",
    },
    OptionSpec {
        name: OptionName::CacheSize,
        domain: Domain::Integer {
            min: PRAGMA_INT_MIN,
            max: PRAGMA_INT_MAX,
        },
        default: OptionValue::Integer(-2000),
        phase: Phase::General,
        summary: "page cache size, negative for KiB",
    },
    OptionSpec {
        name: OptionName::PageSize,
        domain: Domain::PowerOfTwo {
            min: 512,
            max: 65536,
        },
        default: OptionValue::Integer(4096),
        phase: Phase::Deferred,
        summary: "page size of a new database",
    },
    OptionSpec {
        name: OptionName::AutoVacuum,
        domain: Domain::Keyword {
            tokens: &["none", "full", "incremental"],
            parse: keyword::<AutoVacuum>,
            quoted: false,
        },
        default: OptionValue::Keyword("0"),
        phase: Phase::Deferred,
        summary: "auto-vacuum mode of a new database",
    },
    OptionSpec {
        name: OptionName::Encoding,
        domain: Domain::Keyword {
            tokens: &["UTF-8", "UTF-16", "UTF-16le", "UTF-16be"],
            parse: keyword::<Encoding>,
            quoted: true,
        },
        default: OptionValue::Keyword("UTF-8"),
        phase: Phase::Deferred,
        summary: "text encoding of a new database",
    },
    OptionSpec {
        name: OptionName::JournalMode,
        domain: Domain::Keyword {
            tokens: &["delete", "truncate", "persist", "memory", "wal", "off"],
            parse: keyword::<JournalMode>,
            quoted: false,
        },
        default: OptionValue::Keyword("delete"),
        phase: Phase::Deferred,
        summary: "rollback journal or write-ahead log mode",
    },
];

/// Lookup and validation over the static option table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionRegistry;

impl OptionRegistry {
    /// Returns every registered option in registration order.
    #[must_use]
    pub fn all_options() -> &'static [OptionSpec] {
        &OPTIONS
    }

    /// Returns the specification of a registered option.
    #[must_use]
    pub fn spec(name: OptionName) -> &'static OptionSpec {
        // The table is declared in `OptionName` order.
        &OPTIONS[name as usize]
    }

    /// Looks up an option by its textual name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] if `name` is not registered.
    pub fn lookup(name: &str) -> Result<&'static OptionSpec> {
        name.parse::<OptionName>()
            .map(Self::spec)
            .map_err(|_| Error::UnknownOption(name.to_owned()))
    }

    /// Validates `raw` for option `name` and renders it as a directive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] for an unregistered name and
    /// [`Error::InvalidValue`] for a value outside the option's domain.
    pub fn resolve(name: &str, raw: &str) -> Result<Directive> {
        let spec = Self::lookup(name)?;
        let value = spec.parse(raw)?;
        Ok(Directive {
            name: spec.name,
            value,
        })
    }
}

/// A resolved `(option, value)` pair ready to be applied to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Directive {
    /// Option the directive configures.
    pub name: OptionName,
    /// Normalized value.
    pub value: OptionValue,
}

impl Directive {
    /// Phase in which the directive is applied.
    #[must_use]
    pub fn phase(&self) -> Phase {
        OptionRegistry::spec(self.name).phase
    }

    /// Renders the directive as a pragma statement.
    ///
    /// Returns `None` for options consumed as open flags.
    #[must_use]
    pub fn sql(&self) -> Option<String> {
        let spec = OptionRegistry::spec(self.name);
        match spec.phase {
            Phase::OpenFlag => None,
            _ if spec.quoted() => Some(format!("PRAGMA {} = '{}';", self.name, self.value)),
            _ => Some(format!("PRAGMA {} = {};", self.name, self.value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn accepts(spec: &OptionSpec, value: OptionValue) -> bool {
        match (spec.domain, value) {
            (Domain::Keyword { parse, .. }, OptionValue::Keyword(token)) => {
                parse(token) == Some(token)
            }
            (
                Domain::Integer { min, max } | Domain::PowerOfTwo { min, max },
                OptionValue::Integer(v),
            ) => (min..=max).contains(&v),
            (Domain::Boolean, OptionValue::Boolean(_)) => true,
            _ => false,
        }
    }

    #[test]
    fn test_table_is_in_name_order() {
        for (idx, spec) in OptionRegistry::all_options().iter().enumerate() {
            assert_eq!(spec.name as usize, idx, "{} out of order", spec.name);
            assert!(accepts(spec, spec.default), "{} default rejected", spec.name);
        }
    }

    #[test_case("auto_vacuum", "INCREMENTAL", "PRAGMA auto_vacuum = 2;")]
    #[test_case("auto_vacuum", "none", "PRAGMA auto_vacuum = 0;")]
    #[test_case("synchronous", "full", "PRAGMA synchronous = 2;")]
    #[test_case("synchronous", "3", "PRAGMA synchronous = 3;")]
    #[test_case("journal_mode", "WAL", "PRAGMA journal_mode = wal;")]
    #[test_case("encoding", "utf-16LE", "PRAGMA encoding = 'UTF-16le';")]
    #[test_case("temp_store", "memory", "PRAGMA temp_store = 2;")]
    #[test_case("foreign_keys", "on", "PRAGMA foreign_keys = 1;")]
    #[test_case("cache_size", "-65536", "PRAGMA cache_size = -65536;")]
    #[test_case("page_size", "65536", "PRAGMA page_size = 65536;")]
    fn test_resolve_normalizes(name: &str, raw: &str, expected: &str) {
        let directive = OptionRegistry::resolve(name, raw).expect("resolve");
        assert_eq!(directive.sql().as_deref(), Some(expected));
    }

    #[test]
    fn test_open_flag_options_render_no_sql() {
        let directive = OptionRegistry::resolve("cache", "SHARED").expect("resolve");
        assert_eq!(directive.value, OptionValue::Keyword("shared"));
        assert_eq!(directive.phase(), Phase::OpenFlag);
        assert!(directive.sql().is_none());
    }

    #[test]
    fn test_unknown_option() {
        let err = OptionRegistry::resolve("cipher_soup", "1").expect_err("unknown");
        assert!(matches!(err, Error::UnknownOption(name) if name == "cipher_soup"));
    }

    #[test_case("journal_mode", "sideways")]
    #[test_case("page_size", "1000")]
    #[test_case("page_size", "131072")]
    #[test_case("busy_timeout", "-1")]
    #[test_case("busy_timeout", "soon")]
    #[test_case("foreign_keys", "maybe")]
    #[test_case("encoding", "latin-1")]
    fn test_invalid_values(name: &str, raw: &str) {
        let err = OptionRegistry::resolve(name, raw).expect_err("invalid");
        assert!(
            matches!(&err, Error::InvalidValue { option, .. } if option == name),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_deferred_phase_membership() {
        let deferred: Vec<_> = OptionRegistry::all_options()
            .iter()
            .filter(|spec| spec.phase == Phase::Deferred)
            .map(|spec| spec.name)
            .collect();
        assert_eq!(
            deferred,
            [
                OptionName::PageSize,
                OptionName::AutoVacuum,
                OptionName::Encoding,
                OptionName::JournalMode,
            ]
        );
    }
}
