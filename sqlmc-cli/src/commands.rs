use std::env::{self, VarError};

use eyre::{bail, eyre, WrapErr};
use sqlmc_core::{
    CipherFamily, CipherKey, ConnectionConfig, DriverRegistry, EngineHandle, KeyManager,
};

use crate::Cli;

/// Builds the explicit configuration from the global flags.
pub fn config_from_args(cli: &Cli) -> eyre::Result<ConnectionConfig> {
    let mut builder = ConnectionConfig::builder();
    if let Some(cipher) = &cli.cipher {
        builder = builder.with("cipher", cipher)?;
    }
    for param in &cli.cipher_params {
        let (name, value) = param
            .split_once('=')
            .ok_or_else(|| eyre!("cipher parameter {param:?} is not NAME=VALUE"))?;
        builder = builder.with(name.trim(), value.trim())?;
    }
    if let Some(key) = read_key(&cli.key_env)? {
        builder = builder.with_cipher_key(key);
    }
    Ok(builder.build())
}

/// Reads a key from the environment variable `var`, if set.
fn read_key(var: &str) -> eyre::Result<Option<CipherKey>> {
    match env::var(var) {
        Ok(secret) => Ok(Some(
            CipherKey::new(secret).wrap_err_with(|| format!("invalid key in ${var}"))?,
        )),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => bail!("${var} is not valid UTF-8"),
    }
}

fn connect(uri: &str, config: &ConnectionConfig) -> eyre::Result<EngineHandle> {
    DriverRegistry::with_defaults()
        .connect(uri, Some(config))
        .wrap_err("failed to open database")
}

pub fn settings(uri: &str, config: &ConnectionConfig, json: bool) -> eyre::Result<()> {
    let handle = connect(uri, config)?;
    let settings = handle.effective_settings()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }
    println!("path: {}", settings.path);
    println!("cipher: {}", settings.cipher.map_or("none", CipherFamily::as_str));
    for (name, value) in &settings.options {
        println!("{name} = {value}");
    }
    Ok(())
}

pub fn check(uri: &str, config: &ConnectionConfig, json: bool) -> eyre::Result<()> {
    let handle = connect(uri, config)?;
    let readable = KeyManager::is_readable(&handle);
    let intact = readable && handle.connection().integrity_check()?;
    tracing::debug!(readable, intact, "checked {}", handle.path().display());
    if json {
        let report = serde_json::json!({
            "path": handle.path().display().to_string(),
            "readable": readable,
            "integrity_ok": intact,
        });
        println!("{report}");
    } else if intact {
        println!("ok");
    }
    if !readable {
        bail!("database is not readable");
    }
    if !intact {
        bail!("integrity check failed");
    }
    Ok(())
}

pub fn rekey(
    uri: &str,
    config: &ConnectionConfig,
    new_key_env: &str,
    json: bool,
) -> eyre::Result<()> {
    if !config.has_key() {
        bail!("rekey requires the current key");
    }
    let new_key = read_key(new_key_env)?.ok_or_else(|| eyre!("${new_key_env} is not set"))?;
    let mut handle = connect(uri, config)?;
    KeyManager::rekey(&mut handle, &new_key).wrap_err("rekey failed")?;
    tracing::info!("rekeyed {}", handle.path().display());
    if json {
        let report = serde_json::json!({
            "path": handle.path().display().to_string(),
            "cipher": handle.cipher_family(),
        });
        println!("{report}");
    } else {
        println!("rekeyed {}", handle.path().display());
    }
    handle.close()?;
    Ok(())
}
