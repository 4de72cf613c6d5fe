//! Typed values for keyword-valued options.
//!
//! Each type parses case-insensitively from every spelling the engine
//! accepts (including numeric aliases) and renders to the canonical token
//! the engine echoes back when the option is queried.

use std::fmt;

use strum::EnumString;

use crate::options::{Keyword, OptionName, OptionValue};

/// A typed value for one registered option.
///
/// Lets builders take `JournalMode::Wal` instead of a `(name, raw)` pair.
pub trait OptionKind: Copy {
    /// Option this type configures.
    const NAME: OptionName;

    /// Normalized value.
    fn value(self) -> OptionValue;
}

macro_rules! keyword_option {
    ($ty:ident, $name:ident) => {
        impl Keyword for $ty {
            fn token(self) -> &'static str {
                $ty::token(self)
            }
        }

        impl OptionKind for $ty {
            const NAME: OptionName = OptionName::$name;

            fn value(self) -> OptionValue {
                OptionValue::Keyword(self.token())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.token())
            }
        }
    };
}

/// File access used when opening a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum OpenMode {
    /// Read-only; the file must exist.
    #[strum(serialize = "ro")]
    ReadOnly,
    /// Read-write; the file must exist.
    #[strum(serialize = "rw")]
    ReadWrite,
    /// Read-write, creating the file if absent.
    #[default]
    #[strum(serialize = "rwc")]
    ReadWriteCreate,
}

impl OpenMode {
    /// Canonical token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
            Self::ReadWriteCreate => "rwc",
        }
    }
}

keyword_option!(OpenMode, Mode);

/// Page cache sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CacheMode {
    /// Each connection has its own page cache.
    #[default]
    Private,
    /// Connections in the process share one page cache per file.
    Shared,
}

impl CacheMode {
    /// Canonical token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Shared => "shared",
        }
    }
}

keyword_option!(CacheMode, Cache);

/// Journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JournalMode {
    /// Delete the rollback journal at the end of each transaction.
    #[default]
    Delete,
    /// Truncate the rollback journal to zero length.
    Truncate,
    /// Zero the journal header instead of deleting the file.
    Persist,
    /// Keep the rollback journal in memory.
    Memory,
    /// Write-ahead log.
    Wal,
    /// No rollback journal.
    Off,
}

impl JournalMode {
    /// Canonical token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Truncate => "truncate",
            Self::Persist => "persist",
            Self::Memory => "memory",
            Self::Wal => "wal",
            Self::Off => "off",
        }
    }
}

keyword_option!(JournalMode, JournalMode);

/// Auto-vacuum mode. Renders numerically, as the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum AutoVacuum {
    /// Freed pages stay in the file.
    #[default]
    #[strum(serialize = "none", serialize = "0")]
    None,
    /// Freed pages are returned on every commit.
    #[strum(serialize = "full", serialize = "1")]
    Full,
    /// Freed pages are returned by `PRAGMA incremental_vacuum`.
    #[strum(serialize = "incremental", serialize = "2")]
    Incremental,
}

impl AutoVacuum {
    /// Canonical token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::None => "0",
            Self::Full => "1",
            Self::Incremental => "2",
        }
    }
}

keyword_option!(AutoVacuum, AutoVacuum);

/// Durability level. Renders numerically, as the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Synchronous {
    /// Hand writes to the OS without syncing.
    #[strum(serialize = "off", serialize = "0")]
    Off,
    /// Sync at critical moments only.
    #[strum(serialize = "normal", serialize = "1")]
    Normal,
    /// Sync on every commit.
    #[default]
    #[strum(serialize = "full", serialize = "2")]
    Full,
    /// Like `Full`, also syncing the journal directory.
    #[strum(serialize = "extra", serialize = "3")]
    Extra,
}

impl Synchronous {
    /// Canonical token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Off => "0",
            Self::Normal => "1",
            Self::Full => "2",
            Self::Extra => "3",
        }
    }
}

keyword_option!(Synchronous, Synchronous);

/// Text encoding of a new database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Encoding {
    /// UTF-8.
    #[default]
    #[strum(serialize = "UTF-8", serialize = "UTF8")]
    Utf8,
    /// UTF-16 in native byte order.
    #[strum(serialize = "UTF-16", serialize = "UTF16")]
    Utf16,
    /// UTF-16 little endian.
    #[strum(serialize = "UTF-16le", serialize = "UTF16le")]
    Utf16Le,
    /// UTF-16 big endian.
    #[strum(serialize = "UTF-16be", serialize = "UTF16be")]
    Utf16Be,
}

impl Encoding {
    /// Canonical token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16 => "UTF-16",
            Self::Utf16Le => "UTF-16le",
            Self::Utf16Be => "UTF-16be",
        }
    }

    /// Whether the engine reporting `effective` satisfies a request for `self`.
    ///
    /// A request for native-order UTF-16 is reported back with its byte order.
    #[must_use]
    pub fn is_satisfied_by(self, effective: &str) -> bool {
        match self {
            Self::Utf16 => effective.eq_ignore_ascii_case("UTF-16le")
                || effective.eq_ignore_ascii_case("UTF-16be"),
            _ => effective.eq_ignore_ascii_case(self.token()),
        }
    }
}

keyword_option!(Encoding, Encoding);

/// Storage for temporary tables and indices. Renders numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TempStore {
    /// Compile-time default.
    #[default]
    #[strum(serialize = "default", serialize = "0")]
    Default,
    /// Temporary files.
    #[strum(serialize = "file", serialize = "1")]
    File,
    /// Memory.
    #[strum(serialize = "memory", serialize = "2")]
    Memory,
}

impl TempStore {
    /// Canonical token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Default => "0",
            Self::File => "1",
            Self::Memory => "2",
        }
    }
}

keyword_option!(TempStore, TempStore);

/// File locking behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LockingMode {
    /// Release locks at the end of each transaction.
    #[default]
    Normal,
    /// Hold locks until the connection closes.
    Exclusive,
}

impl LockingMode {
    /// Canonical token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Exclusive => "exclusive",
        }
    }
}

keyword_option!(LockingMode, LockingMode);
