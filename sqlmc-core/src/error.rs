//! Error types for connection configuration and key lifecycle operations.

use sqlmc_db::DbError;
use thiserror::Error;

/// Result type for `sqlmc` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring, opening or keying a database.
///
/// No variant ever carries key material. Values rejected for secret-bearing
/// options are described, never echoed.
#[derive(Debug, Error)]
pub enum Error {
    /// The option name is not registered.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// The value is outside the option's domain.
    #[error("invalid value for {option}: {reason}")]
    InvalidValue {
        /// Option (or cipher parameter) the value was supplied for.
        option: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A cipher parameter was supplied before any cipher family was chosen.
    #[error("cipher parameter {0} requires a cipher family")]
    MissingCipherFamily(String),

    /// The engine could not open the database file.
    #[error("failed to open database: {0}")]
    EngineOpen(#[source] DbError),

    /// The engine rejected a configuration directive.
    #[error("failed to apply {name}: {source}")]
    Directive {
        /// Name of the directive that failed.
        name: String,
        /// Engine error.
        source: DbError,
    },

    /// The database cannot be read with the supplied key.
    ///
    /// Wrong key, wrong cipher family and a corrupt file are indistinguishable
    /// at the engine level; the underlying error is kept as the source.
    #[error("database cannot be read with the supplied key")]
    AuthenticationFailed {
        /// Engine error that caused the failure, for diagnostics.
        #[source]
        cause: DbError,
    },

    /// Rekeying is only supported within the handle's current cipher family.
    #[error("cannot rekey a {from} database to {to}")]
    UnsupportedRekey {
        /// Current state of the handle.
        from: &'static str,
        /// Requested target family.
        to: &'static str,
    },

    /// The engine rejected the rekey; the file stays readable with the old key.
    #[error("rekey failed: {0}")]
    RekeyFailed(#[source] DbError),

    /// The connection URI is malformed.
    #[error("invalid connection uri: {0}")]
    InvalidUri(String),

    /// No driver is registered for the URI scheme.
    #[error("no driver registered for {0}")]
    UnknownScheme(String),

    /// Any other engine error.
    #[error(transparent)]
    Engine(#[from] DbError),
}

impl Error {
    pub(crate) fn invalid(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`Error::AuthenticationFailed`].
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}
