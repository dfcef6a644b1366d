// src/cli.rs
use crate::config::Config;
use crate::error::{AppError, AppResult, CryptoError, StoreError};
use crate::gateway::FileGateway;
use crate::models::{BreachRecord, CredentialRecord, CredentialStore};
use crate::store;
use crate::tui;
use crate::validation;
use chrono::Utc;
use clap::{Parser, Subcommand};
use log;
use rpassword;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// View and edit stored website logins.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new, empty login store
    Init {
        #[clap(short, long, value_parser, default_value = "logins.enc")]
        file: PathBuf,
    },
    /// Add a login to the store
    Add {
        #[clap(short, long, value_parser, default_value = "logins.enc")]
        file: PathBuf,
        /// Site origin, e.g. https://example.com or example.com
        hostname: String,
        username: String,
        #[clap(long)]
        form_submit_url: Option<String>,
        #[clap(long)]
        http_realm: Option<String>,
    },
    /// List all logins in the store
    List {
        #[clap(short, long, value_parser, default_value = "logins.enc")]
        file: PathBuf,
    },
    /// Open the detail view for one login
    Show {
        #[clap(short, long, value_parser, default_value = "logins.enc")]
        file: PathBuf,
        id: String,
        /// TOML file describing a known breach for this login's site
        #[clap(long, value_parser)]
        breach: Option<PathBuf>,
    },
    /// Record that the store has been synced with another device
    MarkSynced {
        #[clap(short, long, value_parser, default_value = "logins.enc")]
        file: PathBuf,
    },
}

fn prompt_master_password(prompt: &str) -> AppResult<String> {
    rpassword::prompt_password(prompt).map_err(|e| {
        log::error!("Failed to read master password: {}", e);
        AppError::Cli(format!("Failed to read password: {}", e))
    })
}

fn require_store_file(file: &Path) -> AppResult<()> {
    if !file.exists() {
        let msg = format!(
            "Login store not found at: {:?}\nPlease initialize the store first using the 'init' command.",
            file
        );
        log::error!("{}", msg);
        return Err(AppError::Cli(msg));
    }
    Ok(())
}

fn open_store(file: &Path, config: &Config) -> AppResult<(String, CredentialStore)> {
    require_store_file(file)?;
    let password = prompt_master_password("Enter master password: ")?;
    match store::load_store(&password, file, &config.argon2_params) {
        Ok(credentials) => Ok((password, credentials)),
        Err(StoreError::Crypto(CryptoError::ChaCha(_))) => {
            log::warn!("Failed to decrypt store {:?}: incorrect master password or corrupted data.", file);
            Err(AppError::Cli("Failed to decrypt store. Incorrect master password or corrupted data.".to_string()))
        }
        Err(e) => {
            log::error!("Failed to load store {:?}: {}", file, e);
            Err(e.into())
        }
    }
}

fn load_breach(path: &Path) -> AppResult<BreachRecord> {
    let content = fs::read_to_string(path).map_err(|e| {
        log::error!("Failed to read breach file {:?}: {}", path, e);
        AppError::Cli(format!("Failed to read breach file {:?}: {}", path, e))
    })?;
    toml::from_str(&content).map_err(|e| {
        log::error!("Failed to parse breach file {:?}: {}", path, e);
        AppError::Cli(format!("Invalid breach file {:?}: {}", path, e))
    })
}

pub fn handle_cli_command(cli: Cli, config: &Config) -> AppResult<()> {
    log::debug!("Handling CLI command: {:?}", cli.command);
    match cli.command {
        Commands::Init { file } => {
            log::info!("Executing 'init' command for file: {:?}", file);
            if file.exists() {
                print!("Store file {:?} already exists. Overwrite? (y/N): ", file);
                io::stdout().flush().map_err(|e| AppError::Cli(format!("Failed to flush stdout: {}", e)))?;
                let mut confirmation = String::new();
                io::stdin()
                    .read_line(&mut confirmation)
                    .map_err(|e| AppError::Cli(format!("Failed to read confirmation: {}", e)))?;
                if confirmation.trim().to_lowercase() != "y" {
                    println!("Initialization cancelled.");
                    log::info!("Store initialization cancelled by user.");
                    return Ok(());
                }
            }

            let password = prompt_master_password("Enter master password: ")?;
            let password_confirm = prompt_master_password("Confirm master password: ")?;
            if password != password_confirm {
                log::warn!("Master password confirmation failed: passwords do not match.");
                return Err(AppError::Cli("Passwords do not match.".to_string()));
            }
            if password.is_empty() {
                log::warn!("Master password cannot be empty.");
                return Err(AppError::Cli("Master password cannot be empty.".to_string()));
            }

            store::save_store(&CredentialStore::new(), &password, &file, &config.argon2_params)?;
            println!("Initialized empty login store at {:?}.", file);
            Ok(())
        }
        Commands::Add { file, hostname, username, form_submit_url, http_realm } => {
            log::info!("Executing 'add' command for file: {:?}", file);
            let (master, mut credentials) = open_store(&file, config)?;
            let password = rpassword::prompt_password(format!("Password for {} at {}: ", username, hostname))
                .map_err(|e| AppError::Cli(format!("Failed to read password: {}", e)))?;

            let record = CredentialRecord {
                form_submit_url,
                http_realm,
                ..CredentialRecord::new(hostname, username, password)
            };
            if let Err(reason) = validation::validate_record(&record) {
                log::warn!("Refusing to add invalid login: {}", reason);
                return Err(AppError::Cli(format!("Invalid login: {}", reason)));
            }

            let id = record.id.clone();
            credentials.add_record(record);
            store::save_store(&credentials, &master, &file, &config.argon2_params)?;
            println!("Added login {}", id);
            Ok(())
        }
        Commands::List { file } => {
            log::info!("Executing 'list' command for file: {:?}", file);
            let (_, credentials) = open_store(&file, config)?;
            if credentials.records.is_empty() {
                println!("No logins found in the store.");
            } else {
                println!("Logins:");
                for record in &credentials.records {
                    println!("  {}  {}  {}", record.id, record.hostname, record.username);
                }
            }
            log::info!("Listed {} logins from {:?}.", credentials.records.len(), file);
            Ok(())
        }
        Commands::Show { file, id, breach } => {
            log::info!("Executing 'show' command for login {} in {:?}", id, file);
            require_store_file(&file)?;
            let breach = breach.as_deref().map(load_breach).transpose()?;
            let master = prompt_master_password("Enter master password: ")?;
            let gateway = FileGateway::new(file, master, config.argon2_params.clone());
            tui::run_tui(gateway, &id, breach, config.breach_info_url.clone())
        }
        Commands::MarkSynced { file } => {
            log::info!("Executing 'mark-synced' command for file: {:?}", file);
            let (master, mut credentials) = open_store(&file, config)?;
            credentials.last_synced = Some(Utc::now().timestamp_millis());
            store::save_store(&credentials, &master, &file, &config.argon2_params)?;
            println!("Marked {:?} as synced.", file);
            Ok(())
        }
    }
}
