// src/config.rs
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use toml;

pub const DEFAULT_BREACH_INFO_URL: &str = "https://monitor.firefox.com/about";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Argon2Params {
    pub m_cost: u32, // KiB
    pub t_cost: u32, // iterations
    pub p_cost: u32, // parallelism
}

impl Default for Argon2Params {
    fn default() -> Self {
        Argon2Params {
            m_cost: 19456, // 19 MiB
            t_cost: 2,
            p_cost: 1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub argon2_params: Argon2Params,
    /// Page opened by the breach row's "learn more" affordance.
    #[serde(default = "default_breach_info_url")]
    pub breach_info_url: String,
}

fn default_breach_info_url() -> String {
    DEFAULT_BREACH_INFO_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            argon2_params: Argon2Params::default(),
            breach_info_url: default_breach_info_url(),
        }
    }
}

fn get_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "LoginDetailRS", "LoginDetailRS")
        .map(|proj_dirs| proj_dirs.config_dir().join("login_detail_config.toml"))
}

fn save_default_config(config_path: &Path, config: &Config) -> Result<(), String> {
    info!("Attempting to save default config to {:?}", config_path);
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)
                .map_err(|e| format!("Failed to create config directory {:?}: {}", parent_dir, e))?;
            info!("Created config directory: {:?}", parent_dir);
        }
    }

    let toml_string = toml::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize default config to TOML: {}", e))?;

    let mut file = fs::File::create(config_path)
        .map_err(|e| format!("Failed to create default config file {:?}: {}", config_path, e))?;

    file.write_all(toml_string.as_bytes())
        .map_err(|e| format!("Failed to write default config to {:?}: {}", config_path, e))?;

    info!("Saved default configuration to {:?}", config_path);
    Ok(())
}

/// Reads the config at `config_path`, writing the defaults there first if the file is
/// missing. Unreadable or malformed files fall back to the defaults.
fn load_config_from(config_path: &Path) -> Config {
    if !config_path.exists() {
        info!(
            "Config file not found at {:?}. Creating and using default configuration.",
            config_path
        );
        let default_config = Config::default();
        if let Err(e) = save_default_config(config_path, &default_config) {
            warn!("Failed to save default configuration: {}", e);
        }
        return default_config;
    }

    info!("Loading configuration from {:?}", config_path);
    match fs::read_to_string(config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(loaded_config) => {
                info!("Configuration loaded successfully.");
                loaded_config
            }
            Err(e) => {
                warn!(
                    "Failed to parse config file at {:?}: {}. Using default configuration.",
                    config_path, e
                );
                Config::default()
            }
        },
        Err(e) => {
            warn!(
                "Failed to read config file at {:?}: {}. Using default configuration.",
                config_path, e
            );
            Config::default()
        }
    }
}

pub fn load_config() -> Config {
    match get_config_path() {
        Some(config_path) => load_config_from(&config_path),
        None => {
            warn!("Could not determine config directory. Using default configuration.");
            Config::default()
        }
    }
}
