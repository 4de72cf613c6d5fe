//! `sqlmc` developer CLI.
//!
//! Opens a database through the `sqlmc:` driver and reports its effective
//! settings, checks that it is readable, or rekeys it. Keys are read from
//! environment variables so they never appear on the command line.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Inspect, check and rekey SQLite3 Multiple Ciphers databases.
#[derive(Debug, Parser)]
#[command(name = "sqlmc", version, about)]
struct Cli {
    /// Environment variable holding the database key.
    #[arg(long, global = true, default_value = "SQLMC_KEY")]
    key_env: String,

    /// Cipher family of the database (`default`, `chacha20`, `aes128cbc`,
    /// `aes256cbc`, `sqlcipher`, `rc4`).
    #[arg(long, global = true, env = "SQLMC_CIPHER")]
    cipher: Option<String>,

    /// Cipher parameter as `name=value`, e.g. `kdf_iter=256000`. Repeatable.
    #[arg(long = "cipher-param", global = true, value_name = "NAME=VALUE")]
    cipher_params: Vec<String>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every option's effective value.
    Settings {
        /// Connection URI, e.g. `sqlmc:file:app.db?journal_mode=wal`.
        uri: String,
    },
    /// Verify the database is readable with the key and passes an integrity check.
    Check {
        /// Connection URI.
        uri: String,
    },
    /// Re-encrypt the database under a new key in the same cipher family.
    Rekey {
        /// Connection URI.
        uri: String,
        /// Environment variable holding the new key.
        #[arg(long, default_value = "SQLMC_NEW_KEY")]
        new_key_env: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SQLMC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    // `log` records from sqlmc-core are bridged by the subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> eyre::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = commands::config_from_args(&cli)?;
    match &cli.command {
        Command::Settings { uri } => commands::settings(uri, &config, cli.json),
        Command::Check { uri } => commands::check(uri, &config, cli.json),
        Command::Rekey { uri, new_key_env } => {
            commands::rekey(uri, &config, new_key_env, cli.json)
        }
    }
}
