//! Resolving connection URIs to drivers.
//!
//! A [`DriverRegistry`] maps URI scheme prefixes (such as `sqlmc:`) to
//! [`Driver`] implementations. It is assembled once at process start and is
//! read-only afterwards; pass it to whatever needs to open connections.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::keys::KeyManager;
use crate::opener::{ConnectionOpener, EngineHandle};
use crate::uri::ConnectionUri;

/// Scheme prefix of the built-in driver.
pub const SQLMC_SCHEME: &str = "sqlmc:";

/// Opens connections for the part of a URI after its scheme prefix.
pub trait Driver: Send + Sync {
    /// Short driver name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Opens `target` (a path or `file:` URI with optional query), applying
    /// `config` over the URI's query options.
    ///
    /// # Errors
    ///
    /// Driver-specific; see [`SqlmcDriver`].
    fn connect(&self, target: &str, config: Option<&ConnectionConfig>) -> Result<EngineHandle>;
}

/// The built-in driver.
///
/// Merges the explicit configuration over the URI's query options (explicit
/// values win) and, when the result carries a key, authenticates the handle
/// through [`KeyManager::open_with_key`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlmcDriver {
    opener: ConnectionOpener,
}

impl SqlmcDriver {
    /// A driver opening handles through `opener`.
    #[must_use]
    pub const fn new(opener: ConnectionOpener) -> Self {
        Self { opener }
    }
}

impl Driver for SqlmcDriver {
    fn name(&self) -> &'static str {
        "sqlmc"
    }

    /// # Errors
    ///
    /// - [`Error::InvalidUri`] or [`Error::InvalidValue`] for a malformed URI
    ///   or query option.
    /// - [`Error::AuthenticationFailed`] when a key is configured and the
    ///   database cannot be read with it.
    /// - Any error of [`ConnectionOpener::open`].
    fn connect(&self, target: &str, config: Option<&ConnectionConfig>) -> Result<EngineHandle> {
        let uri = ConnectionUri::parse(target)?;
        let from_uri = ConnectionConfig::from_uri_params(&uri.params)?;
        let config = match config {
            Some(explicit) => explicit.merged_over(&from_uri),
            None => from_uri,
        };
        if config.has_key() {
            KeyManager::new(self.opener).open_with_key(&uri.path, &config)
        } else {
            self.opener.open(&uri.path, &config)
        }
    }
}

/// Immutable map from URI scheme prefixes to drivers.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Starts an empty registry.
    #[must_use]
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::default()
    }

    /// A registry with [`SqlmcDriver`] under [`SQLMC_SCHEME`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::builder()
            .register(SQLMC_SCHEME, Arc::new(SqlmcDriver::default()))
            .build()
    }

    /// Registered scheme prefixes.
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    /// Opens `uri` with the driver registered for its scheme prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownScheme`] if no registered prefix matches,
    /// otherwise the driver's error.
    pub fn connect(&self, uri: &str, config: Option<&ConnectionConfig>) -> Result<EngineHandle> {
        // Longest matching prefix wins.
        let (scheme, driver) = self
            .drivers
            .iter()
            .filter(|(scheme, _)| uri.starts_with(scheme.as_str()))
            .max_by_key(|(scheme, _)| scheme.len())
            .ok_or_else(|| {
                let scheme = uri.split_once(':').map_or(uri, |(scheme, _)| scheme);
                Error::UnknownScheme(scheme.to_owned())
            })?;
        log::debug!("connecting through the {} driver", driver.name());
        driver.connect(&uri[scheme.len()..], config)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.drivers.iter().map(|(scheme, driver)| (scheme, driver.name())))
            .finish()
    }
}

/// Assembles a [`DriverRegistry`].
#[derive(Default)]
pub struct DriverRegistryBuilder {
    drivers: BTreeMap<String, Arc<dyn Driver>>,
}

impl DriverRegistryBuilder {
    /// Registers `driver` for URIs starting with `scheme` (e.g. `"sqlmc:"`).
    /// A later registration for the same prefix replaces the earlier one.
    #[must_use]
    pub fn register(mut self, scheme: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        self.drivers.insert(scheme.into(), driver);
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> DriverRegistry {
        DriverRegistry {
            drivers: self.drivers,
        }
    }
}
