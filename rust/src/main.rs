//! Command line front end for the credential store. Each subcommand does one
//! thing so it is always clear which secret is being hashed or checked.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use credhash::auth::{AuthError, Authenticator};
use credhash::config::{
    load_config, Config, ConfigError, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH,
};
use credhash::store::{JsonFileStore, StoreError};
use credhash::{hash, verify, Credential, HashError, HashingAlgorithm};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "credhash=info";

#[derive(Debug, Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("hashing failed: {0}")]
    Hash(#[from] HashError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("salt must be hex: {0}")]
    SaltHex(#[from] hex::FromHexError),
}

#[derive(Parser, Debug)]
#[command(name = "credhash", version, about = "Hash, verify and store password credentials")]
struct Cli {
    /// Path to the JSON config file (also read from CREDHASH_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the selectable hashing algorithms
    Algorithms,
    /// Hash a password and print the digest and salt as hex
    Hash {
        /// Algorithm id (1-6) or name; defaults to the configured algorithm
        #[arg(short, long, value_parser = parse_algorithm)]
        algorithm: Option<HashingAlgorithm>,
        /// Hex salt to reuse instead of generating one
        #[arg(long)]
        salt: Option<String>,
        password: String,
    },
    /// Check a password against a stored digest and salt
    Verify {
        #[arg(short, long)]
        algorithm: String,
        #[arg(long)]
        digest: String,
        #[arg(long)]
        salt: String,
        password: String,
    },
    /// Create a user in the credential store
    Register {
        username: String,
        password: String,
        #[arg(short, long, value_parser = parse_algorithm)]
        algorithm: Option<HashingAlgorithm>,
    },
    /// Log in as a stored user
    Login { username: String, password: String },
    /// Set a new password for a stored user
    Passwd {
        username: String,
        new_password: String,
        #[arg(short, long, value_parser = parse_algorithm)]
        algorithm: Option<HashingAlgorithm>,
    },
    /// Re-hash a user's current password with another algorithm
    Rehash {
        username: String,
        password: String,
        #[arg(short, long, value_parser = parse_algorithm)]
        algorithm: HashingAlgorithm,
    },
}

fn parse_algorithm(selector: &str) -> Result<HashingAlgorithm, HashError> {
    HashingAlgorithm::from_selector(selector)
}

fn resolve_config(explicit: Option<PathBuf>) -> Result<Config, ConfigError> {
    match explicit.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from)) {
        Some(path) => load_config(path),
        None => Config::load_or_default(DEFAULT_CONFIG_PATH),
    }
}

fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_authenticator(config: &Config) -> Result<Authenticator<JsonFileStore>, CliError> {
    debug!(path = %config.store_path.display(), "opening credential store");
    let store = JsonFileStore::open(&config.store_path)?;
    Ok(Authenticator::new(store).with_dummy_algorithm(config.default_algorithm))
}

/// Returns whether the command succeeded from the user's point of view.
fn run(command: Command, config: &Config) -> Result<bool, CliError> {
    match command {
        Command::Algorithms => {
            println!("{}", HashingAlgorithm::menu());
        }
        Command::Hash {
            algorithm,
            salt,
            password,
        } => {
            let algorithm = algorithm.unwrap_or(config.default_algorithm);
            let salt = salt.map(hex::decode).transpose()?;
            let (digest, salt) = hash(&password, salt.as_deref(), algorithm)?;
            println!("algorithm: {algorithm}");
            println!("digest: {digest}");
            println!("salt: {salt}");
        }
        Command::Verify {
            algorithm,
            digest,
            salt,
            password,
        } => {
            let stored = Credential::from_columns(&algorithm, &digest, &salt)?;
            let matches = verify(&stored, &password);
            println!("{}", if matches { "match" } else { "no-match" });
            return Ok(matches);
        }
        Command::Register {
            username,
            password,
            algorithm,
        } => {
            let algorithm = algorithm.unwrap_or(config.default_algorithm);
            let user = open_authenticator(config)?.register(&username, &password, algorithm)?;
            println!(
                "user {} stored with {}",
                user.username,
                user.credential.algorithm.label()
            );
        }
        Command::Login { username, password } => {
            let outcome = open_authenticator(config)?.login(&username, &password);
            println!("{}", outcome.message());
            return Ok(outcome.is_success());
        }
        Command::Passwd {
            username,
            new_password,
            algorithm,
        } => {
            let algorithm = algorithm.unwrap_or(config.default_algorithm);
            open_authenticator(config)?.change_password(&username, &new_password, algorithm)?;
            println!("password updated");
        }
        Command::Rehash {
            username,
            password,
            algorithm,
        } => match open_authenticator(config)?.rehash(&username, &password, algorithm) {
            Ok(user) => println!("password re-hashed with {}", user.credential.algorithm.label()),
            Err(AuthError::InvalidCredentials) => {
                println!("incorrect password");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        },
    }
    Ok(true)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    init_tracing(config.log_filter.as_deref());

    match run(cli.command, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}
