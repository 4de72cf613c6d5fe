#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

//! Connection configuration and cipher key lifecycle for `SQLite3 Multiple
//! Ciphers` databases.
//!
//! A connection request (a URI plus optional explicit configuration) becomes
//! a [`ConnectionConfig`], which renders to an ordered list of directives.
//! [`ConnectionOpener`] applies them to a fresh [`EngineHandle`]: the key
//! directive first, then general options, then page-layout options.
//! [`KeyManager`] adds the encrypted-database protocol on top: creating a
//! database under a key, authenticating a handle with a readability probe,
//! and rekeying within a cipher family.
//!
//! ```no_run
//! use sqlmc_core::{CipherParams, ConnectionConfig, KeyManager, JournalMode};
//!
//! # fn main() -> sqlmc_core::Result<()> {
//! let config = ConnectionConfig::builder()
//!     .option(JournalMode::Wal)
//!     .cipher(CipherParams::chacha20())
//!     .with_key("correct horse battery staple")?
//!     .build();
//! let handle = KeyManager::default().open_with_key("vault.sqlite", &config)?;
//! assert!(KeyManager::is_readable(&handle));
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod config;
pub mod driver;
mod error;
pub mod keys;
pub mod layout;
pub mod logger;
pub mod modes;
pub mod opener;
pub mod options;
pub mod uri;

pub use cipher::{CipherFamily, CipherKey, CipherParam, CipherParams, CipherProfile};
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use driver::{Driver, DriverRegistry, SqlmcDriver};
pub use error::*;
pub use keys::{KeyManager, KeyState};
pub use layout::{LayoutReport, PendingLayout};
pub use modes::{
    AutoVacuum, CacheMode, Encoding, JournalMode, LockingMode, OpenMode, Synchronous, TempStore,
};
pub use opener::{ConnectionOpener, EffectiveSettings, EngineHandle};
pub use options::{Directive, OptionName, OptionRegistry, OptionValue};
pub use sqlmc_db::{Connection, DbError};
