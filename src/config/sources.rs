use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "NOTEGEN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/notegen.toml";
const ENV_PREFIX: &str = "NOTEGEN";
const ENV_SEPARATOR: &str = "__";
const API_KEY_VARS: &[&str] = &["NOTEGEN_API_KEY", "DOUBAO_API_KEY"];

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never stored in TOML files, only in environment
fn load_secrets(config: &mut Config) {
    config.generation.api_key = API_KEY_VARS
        .iter()
        .find_map(|name| env::var(name).ok().filter(|value| !value.trim().is_empty()));

    if config.generation.api_key.is_none() {
        tracing::warn!("No generation API key set; remote generation calls will fail");
    }
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // NOTEGEN__ENGINE__INTER_ITEM_DELAY -> engine.inter_item_delay
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
